//! Credential resolution
//!
//! Turns the authentication part of a [`ConnectionConfig`] into a
//! [`CredentialHandle`]. Secrets are decrypted through a caller-supplied
//! [`SecretDecryptor`]; decryption failures are fatal and never retried.
//! When a cross-account role is configured the base handle is wrapped in a
//! [`CredentialHandle::Delegated`] that the client factory turns into an
//! auto-refreshing STS provider.

use secrecy::SecretString;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::config::{AuthMode, ConnectionConfig};
use super::error::{S3Error, S3Result};
use super::ROLE_SESSION_NAME;

/// Failure reported by a [`SecretDecryptor`]
#[derive(Error, Debug)]
pub enum DecryptError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Decrypts secrets stored in the connection configuration
pub trait SecretDecryptor: Send + Sync {
    fn decrypt(&self, blob: &str) -> Result<SecretString, DecryptError>;
}

/// Decryptor for configurations that store secrets unencrypted
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaintextSecrets;

impl SecretDecryptor for PlaintextSecrets {
    fn decrypt(&self, blob: &str) -> Result<SecretString, DecryptError> {
        Ok(SecretString::from(blob.to_string()))
    }
}

/// Opaque credential handle a per-region client is bound to
#[derive(Clone)]
pub enum CredentialHandle {
    /// Platform default credential discovery
    Ambient,

    /// Unsigned requests
    Anonymous,

    /// Static key pair, optionally with a session token
    Static {
        access_key_id: String,
        secret_access_key: SecretString,
        session_token: Option<SecretString>,
    },

    /// Temporary credentials obtained by assuming `role_arn` with `base`
    Delegated {
        base: Box<CredentialHandle>,
        role_arn: String,
        session_name: String,
        session_length: Duration,
        /// Region the STS call is made in
        sts_region: String,
    },
}

impl CredentialHandle {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, CredentialHandle::Anonymous)
    }

    /// Short label for logs; never includes secrets
    pub fn kind(&self) -> &'static str {
        match self {
            CredentialHandle::Ambient => "ambient",
            CredentialHandle::Anonymous => "anonymous",
            CredentialHandle::Static { .. } => "static",
            CredentialHandle::Delegated { .. } => "delegated",
        }
    }
}

impl fmt::Debug for CredentialHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialHandle::Ambient => f.write_str("Ambient"),
            CredentialHandle::Anonymous => f.write_str("Anonymous"),
            CredentialHandle::Static { access_key_id, .. } => f
                .debug_struct("Static")
                .field("access_key_id", access_key_id)
                .finish_non_exhaustive(),
            CredentialHandle::Delegated {
                base,
                role_arn,
                session_name,
                session_length,
                sts_region,
            } => f
                .debug_struct("Delegated")
                .field("base", base)
                .field("role_arn", role_arn)
                .field("session_name", session_name)
                .field("session_length", session_length)
                .field("sts_region", sts_region)
                .finish(),
        }
    }
}

/// AWS partition a region belongs to
pub fn partition_for_region(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "aws-cn"
    } else if region.starts_with("us-gov-") {
        "aws-us-gov"
    } else {
        "aws"
    }
}

/// Build `arn:<partition>:iam::<account>:role/<role>`
pub fn role_arn(partition: &str, account_id: &str, role_name: &str) -> String {
    format!("arn:{}:iam::{}:role/{}", partition, account_id, role_name)
}

/// Builds credential handles from a connection configuration
#[derive(Clone)]
pub struct CredentialResolver {
    config: ConnectionConfig,
    decryptor: Arc<dyn SecretDecryptor>,
}

impl CredentialResolver {
    pub fn new(config: ConnectionConfig, decryptor: Arc<dyn SecretDecryptor>) -> Self {
        Self { config, decryptor }
    }

    /// Resolve a fresh credential handle
    pub fn resolve(&self) -> S3Result<CredentialHandle> {
        let base = match &self.config.auth {
            AuthMode::Ambient => CredentialHandle::Ambient,
            AuthMode::Anonymous => return Ok(CredentialHandle::Anonymous),
            AuthMode::Static {
                access_key_id,
                secret,
            } => CredentialHandle::Static {
                access_key_id: access_key_id.clone(),
                secret_access_key: self.decrypt(secret)?,
                session_token: None,
            },
            AuthMode::Session {
                access_key_id,
                secret,
                session_token,
            } => CredentialHandle::Static {
                access_key_id: access_key_id.clone(),
                secret_access_key: self.decrypt(secret)?,
                session_token: Some(self.decrypt(session_token)?),
            },
        };

        let Some(role) = &self.config.assume_role else {
            return Ok(base);
        };

        let arn = role_arn(
            partition_for_region(&self.config.region),
            &role.account_id,
            &role.role_name,
        );
        debug!(role_arn = %arn, base = base.kind(), "Wrapping credentials in role assumption");

        Ok(CredentialHandle::Delegated {
            base: Box::new(base),
            role_arn: arn,
            session_name: ROLE_SESSION_NAME.to_string(),
            session_length: role.session_duration(),
            sts_region: self.config.region.clone(),
        })
    }

    fn decrypt(&self, blob: &str) -> S3Result<SecretString> {
        self.decryptor
            .decrypt(blob)
            .map_err(|e| S3Error::Credential(format!("Failed to decrypt secret: {}", e)))
    }
}

impl fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("region", &self.config.region)
            .field("assume_role", &self.config.assume_role)
            .finish_non_exhaustive()
    }
}
