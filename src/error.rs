/*!
 * Error types for configuration loading and process setup
 */

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::protocol::s3::S3Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Configuration file is not valid TOML for this schema
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration parsed but failed validation
    #[error(transparent)]
    Invalid(#[from] S3Error),

    /// Logging could not be initialized
    #[error("Logging setup failed: {0}")]
    Logging(String),
}
