/*!
 * Orbit S3 Router - multi-region S3 access without knowing bucket locations
 *
 * - Bucket regions discovered lazily, with a HeadBucket fallback when
 *   GetBucketLocation is denied
 * - One shared client per region, built on first use
 * - Ambient, anonymous, static, and session credentials with optional
 *   cross-account role assumption
 * - Works without the ListAllMyBuckets permission
 * - Uniform server-side encryption on writes
 * - Structured logging via tracing
 */

pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;

// Re-export commonly used types
pub use config::{LogConfig, LogLevel, RouterConfig};
pub use error::{ConfigError, Result};
pub use protocol::s3::{
    BucketRegion, ConnectionConfig, MultiRegionClient, PlaintextSecrets, S3Error, S3Result,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
