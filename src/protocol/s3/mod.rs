//! Multi-region S3 access
//!
//! [`MultiRegionClient`] lets a caller address any bucket without knowing
//! which region hosts it. Bucket regions are discovered on first use and
//! cached; one client per region is built lazily and shared by every caller.
//!
//! # Features
//!
//! - Region discovery through `GetBucketLocation`, falling back to the
//!   `x-amz-bucket-region` header of a `HeadBucket` probe when the location
//!   permission is missing
//! - Single-flight caches: concurrent first calls for a bucket or region
//!   share one lookup
//! - Ambient, anonymous, static and session credentials, with optional
//!   cross-account role assumption that refreshes before expiry
//! - Accounts without `s3:ListAllMyBuckets` are supported
//! - Uniform server-side encryption on put and copy
//!
//! # Examples
//!
//! ## Reading from a bucket in an unknown region
//!
//! ```ignore
//! use orbit_s3_router::protocol::s3::{ConnectionConfig, MultiRegionClient, PlaintextSecrets};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = MultiRegionClient::connect(
//!         ConnectionConfig::new("us-east-1"),
//!         Arc::new(PlaintextSecrets),
//!     )
//!     .await?;
//!
//!     let body = client.get_object("eu-bucket", "data.csv").await?;
//!     let bytes = body.into_bytes().await?;
//!     println!("{} bytes", bytes.len());
//!
//!     client.close();
//!     Ok(())
//! }
//! ```
//!
//! ## Cross-account access with encrypted writes
//!
//! ```ignore
//! use orbit_s3_router::protocol::s3::{
//!     AssumeRoleConfig, ConnectionConfig, EncryptionSettings, MultiRegionClient,
//!     PlaintextSecrets, PutObjectRequest,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = ConnectionConfig::new("eu-west-1");
//!     config.assume_role = Some(AssumeRoleConfig::new("111111111111", "data-role"));
//!     config.encryption = EncryptionSettings::kms(None);
//!
//!     let client = MultiRegionClient::connect(config, Arc::new(PlaintextSecrets)).await?;
//!     client
//!         .put_object(PutObjectRequest::new("shared-bucket", "out/report.json", "{}"))
//!         .await?;
//!     Ok(())
//! }
//! ```

use std::time::Duration;

mod client;
mod client_pool;
mod config;
mod credentials;
mod encryption;
mod error;
mod multi_region;
mod permission;
mod presign;
mod region_cache;
mod single_flight;
mod transport;
mod types;

#[cfg(test)]
mod tests;

pub use client::{AwsClientFactory, AwsS3Transport};
pub use client_pool::ClientPool;
pub use config::{AssumeRoleConfig, AuthMode, ConnectionConfig, EncryptionSettings, SseMode};
pub use credentials::{
    partition_for_region, role_arn, CredentialHandle, CredentialResolver, DecryptError,
    PlaintextSecrets, SecretDecryptor,
};
pub use encryption::{apply_server_side_encryption, server_side_encryption_for};
pub use error::{S3Error, S3Result};
pub use multi_region::MultiRegionClient;
pub use permission::probe_list_permission;
pub use presign::{Presigner, MAX_PRESIGN_EXPIRY};
pub use region_cache::{region_from_location_constraint, BucketRegion, RegionCache};
pub use single_flight::SingleFlight;
pub use transport::{Addressing, ClientFactory, ClientSpec, S3Transport};
pub use types::{
    BucketInfo, CopyObjectRequest, DeleteFailure, EncryptableRequest, HeadBucketOutcome,
    ListObjectsRequest, ObjectBody, PresignMethod, PresignRequest, PresignedUrl,
    PutObjectRequest, S3ListResult, S3Object, S3ObjectMetadata, S3ServerSideEncryption,
    WriteOutcome,
};

pub use aws_sdk_s3::config::Region;

/// Region S3 implies when a bucket has no location constraint
pub const LEGACY_DEFAULT_REGION: &str = "us-east-1";

/// Response header carrying a bucket's region
pub const BUCKET_REGION_HEADER: &str = "x-amz-bucket-region";

/// Session name used for assumed roles
pub const ROLE_SESSION_NAME: &str = "orbit-s3-router";

/// Default assumed-role session length (1 hour)
pub const DEFAULT_ROLE_SESSION_DURATION: Duration = Duration::from_secs(60 * 60);

/// Credentials are refreshed this long before they expire
pub const CREDENTIAL_REFRESH_BUFFER: Duration = Duration::from_secs(5 * 60);

/// Maximum keys per DeleteObjects call
pub const MAX_DELETE_BATCH: usize = 1000;

/// Default TCP connect timeout
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default socket read timeout
pub const DEFAULT_SOCKET_TIMEOUT_SECS: u64 = 50;

/// Default expiry for presigned URLs
pub const DEFAULT_PRESIGN_EXPIRY: Duration = Duration::from_secs(15 * 60);
