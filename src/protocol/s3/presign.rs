//! Presigned URLs bound to a bucket's region

use aws_sdk_s3::config::Region;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::config::EncryptionSettings;
use super::encryption::apply_server_side_encryption;
use super::error::{S3Error, S3Result};
use super::transport::S3Transport;
use super::types::{PresignMethod, PresignRequest, PresignedUrl};

/// Longest expiry SigV4 allows
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Presigning capability for one bucket, signed with the connection's credentials
#[derive(Clone)]
pub struct Presigner {
    bucket: String,
    client: Arc<dyn S3Transport>,
    encryption: EncryptionSettings,
}

impl Presigner {
    pub(crate) fn new(
        bucket: impl Into<String>,
        client: Arc<dyn S3Transport>,
        encryption: EncryptionSettings,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            client,
            encryption,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Region the URLs are signed for
    pub fn region(&self) -> &Region {
        self.client.region()
    }

    /// Presign a GET of `key`
    pub async fn presign_get(&self, key: &str, expires_in: Duration) -> S3Result<PresignedUrl> {
        let request = self.request(PresignMethod::Get, key, expires_in)?;
        self.client.presign(&request).await
    }

    /// Presign a PUT of `key`; the configured server-side encryption is signed in
    pub async fn presign_put(&self, key: &str, expires_in: Duration) -> S3Result<PresignedUrl> {
        let mut request = self.request(PresignMethod::Put, key, expires_in)?;
        apply_server_side_encryption(&mut request, &self.encryption);
        self.client.presign(&request).await
    }

    fn request(
        &self,
        method: PresignMethod,
        key: &str,
        expires_in: Duration,
    ) -> S3Result<PresignRequest> {
        if expires_in.is_zero() || expires_in > MAX_PRESIGN_EXPIRY {
            return Err(S3Error::Presign(format!(
                "Expiry must be between 1 second and {} seconds",
                MAX_PRESIGN_EXPIRY.as_secs()
            )));
        }

        Ok(PresignRequest {
            method,
            bucket: self.bucket.clone(),
            key: key.to_string(),
            expires_in,
            server_side_encryption: None,
        })
    }
}

impl fmt::Debug for Presigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Presigner")
            .field("bucket", &self.bucket)
            .field("region", self.client.region())
            .finish()
    }
}
