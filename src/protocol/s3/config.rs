//! Connection configuration for the multi-region client

use super::error::{S3Error, S3Result};
use super::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_SOCKET_TIMEOUT_SECS, LEGACY_DEFAULT_REGION};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shortest session STS will issue
const MIN_ROLE_SESSION_SECS: u64 = 900;

/// Longest session STS will issue
const MAX_ROLE_SESSION_SECS: u64 = 43_200;

/// Connection configuration, supplied by the caller and never modified here
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Default region; bucket-less calls and region lookups go here
    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint URL (for S3-compatible services)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// How requests are authenticated
    #[serde(default)]
    pub auth: AuthMode,

    /// Cross-account role to assume on top of `auth`
    #[serde(default)]
    pub assume_role: Option<AssumeRoleConfig>,

    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Socket read timeout in seconds
    #[serde(default = "default_socket_timeout")]
    pub socket_timeout_secs: u64,

    /// Use path-style addressing for the regional clients as well
    #[serde(default)]
    pub force_path_style: bool,

    /// Server-side encryption applied to writes
    #[serde(default)]
    pub encryption: EncryptionSettings,
}

/// Authentication mode.
///
/// Secrets are opaque blobs handed to a [`SecretDecryptor`](super::SecretDecryptor).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthMode {
    /// Default credential chain (environment, profile, IMDS, ...)
    #[default]
    Ambient,

    /// Unsigned requests
    Anonymous,

    /// Access key and encrypted secret key
    Static {
        access_key_id: String,
        secret: String,
    },

    /// Temporary credentials with an encrypted session token
    Session {
        access_key_id: String,
        secret: String,
        session_token: String,
    },
}

impl AuthMode {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, AuthMode::Anonymous)
    }
}

/// Cross-account role assumption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssumeRoleConfig {
    /// 12-digit AWS account id
    pub account_id: String,

    /// Role name within that account
    pub role_name: String,

    /// Session duration in seconds (defaults to one hour)
    #[serde(default)]
    pub session_duration_secs: Option<u64>,
}

impl AssumeRoleConfig {
    pub fn new(account_id: impl Into<String>, role_name: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            role_name: role_name.into(),
            session_duration_secs: None,
        }
    }

    /// Session length requested from STS
    pub fn session_duration(&self) -> Duration {
        self.session_duration_secs
            .map(Duration::from_secs)
            .unwrap_or(super::DEFAULT_ROLE_SESSION_DURATION)
    }
}

/// Server-side encryption mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SseMode {
    #[default]
    None,
    /// Provider-managed keys (AES256)
    Sse,
    /// KMS-managed keys
    Kms,
}

/// Server-side encryption settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub mode: SseMode,

    /// Customer KMS key id; empty means the account default key
    #[serde(default)]
    pub kms_key_id: Option<String>,
}

impl EncryptionSettings {
    pub fn sse() -> Self {
        Self {
            enabled: true,
            mode: SseMode::Sse,
            kms_key_id: None,
        }
    }

    pub fn kms(key_id: Option<String>) -> Self {
        Self {
            enabled: true,
            mode: SseMode::Kms,
            kms_key_id: key_id,
        }
    }
}

fn default_region() -> String {
    LEGACY_DEFAULT_REGION.to_string()
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_socket_timeout() -> u64 {
    DEFAULT_SOCKET_TIMEOUT_SECS
}

impl ConnectionConfig {
    /// Configuration for the given default region using ambient credentials
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            endpoint: None,
            auth: AuthMode::Ambient,
            assume_role: None,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            socket_timeout_secs: DEFAULT_SOCKET_TIMEOUT_SECS,
            force_path_style: false,
            encryption: EncryptionSettings::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> S3Result<()> {
        if self.region.trim().is_empty() {
            return Err(S3Error::InvalidConfig("Region cannot be empty".to_string()));
        }

        if self.connect_timeout_secs == 0 || self.socket_timeout_secs == 0 {
            return Err(S3Error::InvalidConfig(
                "Timeouts must be greater than zero".to_string(),
            ));
        }

        match &self.auth {
            AuthMode::Static { access_key_id, .. } | AuthMode::Session { access_key_id, .. }
                if access_key_id.trim().is_empty() =>
            {
                return Err(S3Error::InvalidConfig(
                    "Access key id cannot be empty".to_string(),
                ));
            }
            _ => {}
        }

        if let Some(role) = &self.assume_role {
            if self.auth.is_anonymous() {
                return Err(S3Error::InvalidConfig(
                    "Anonymous connections cannot assume a role".to_string(),
                ));
            }
            if role.account_id.len() != 12 || !role.account_id.chars().all(|c| c.is_ascii_digit())
            {
                return Err(S3Error::InvalidConfig(format!(
                    "Invalid account id: {}",
                    role.account_id
                )));
            }
            if role.role_name.trim().is_empty() {
                return Err(S3Error::InvalidConfig(
                    "Role name cannot be empty".to_string(),
                ));
            }
            let secs = role.session_duration().as_secs();
            if !(MIN_ROLE_SESSION_SECS..=MAX_ROLE_SESSION_SECS).contains(&secs) {
                return Err(S3Error::InvalidConfig(format!(
                    "Role session duration must be between {} and {} seconds",
                    MIN_ROLE_SESSION_SECS, MAX_ROLE_SESSION_SECS
                )));
            }
        }

        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_secs(self.socket_timeout_secs)
    }

    /// Check if using a custom endpoint
    pub fn is_custom_endpoint(&self) -> bool {
        self.endpoint.is_some()
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new(LEGACY_DEFAULT_REGION)
    }
}
