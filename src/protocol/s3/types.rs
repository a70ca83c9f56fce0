//! Type definitions for S3 operations

use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use super::error::{S3Error, S3Result};

/// Characters escaped in a copy source key; `/` separates path segments
const COPY_SOURCE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Bucket descriptor.
///
/// Without the `s3:ListAllMyBuckets` permission only the name is known, so
/// `creation_date` is `None` for stub descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    /// Bucket name
    pub name: String,

    /// Creation timestamp
    pub creation_date: Option<SystemTime>,
}

impl BucketInfo {
    /// Descriptor carrying only the bucket name
    pub fn stub(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            creation_date: None,
        }
    }
}

/// S3 object entry returned by a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Object {
    /// Object key (path within bucket)
    pub key: String,

    /// Object size in bytes
    pub size: u64,

    /// Last modified timestamp
    pub last_modified: Option<SystemTime>,

    /// ETag (entity tag) - often MD5 hash
    pub etag: Option<String>,

    /// Storage class as reported by the service
    pub storage_class: Option<String>,
}

/// Detailed S3 object metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3ObjectMetadata {
    /// Object key
    pub key: String,

    /// Object size in bytes
    pub size: u64,

    /// Last modified timestamp
    pub last_modified: Option<SystemTime>,

    /// ETag
    pub etag: Option<String>,

    /// Content type
    pub content_type: Option<String>,

    /// User-defined metadata
    pub metadata: HashMap<String, String>,

    /// Server-side encryption applied to the object
    pub server_side_encryption: Option<S3ServerSideEncryption>,

    /// Version ID (if versioning is enabled)
    pub version_id: Option<String>,
}

/// Parameters of a ListObjectsV2 call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectsRequest {
    pub bucket: String,
    pub prefix: Option<String>,
    pub continuation_token: Option<String>,
    pub delimiter: Option<String>,
    pub max_keys: Option<i32>,
}

impl ListObjectsRequest {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Default::default()
        }
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn continuation_token(mut self, token: impl Into<String>) -> Self {
        self.continuation_token = Some(token.into());
        self
    }
}

/// Result of listing objects
#[derive(Debug, Clone, Default)]
pub struct S3ListResult {
    /// List of objects
    pub objects: Vec<S3Object>,

    /// Common prefixes (directories)
    pub common_prefixes: Vec<String>,

    /// Continuation token for the next page
    pub continuation_token: Option<String>,

    /// Whether the result is truncated
    pub is_truncated: bool,
}

/// S3 server-side encryption parameters attached to a write request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum S3ServerSideEncryption {
    /// SSE-S3 (AES256, provider-managed keys)
    Aes256,

    /// SSE-KMS; `None` uses the account's default KMS key
    AwsKms { key_id: Option<String> },
}

impl S3ServerSideEncryption {
    /// Convert to AWS SDK server-side encryption
    pub fn to_aws(&self) -> aws_sdk_s3::types::ServerSideEncryption {
        match self {
            S3ServerSideEncryption::Aes256 => aws_sdk_s3::types::ServerSideEncryption::Aes256,
            S3ServerSideEncryption::AwsKms { .. } => {
                aws_sdk_s3::types::ServerSideEncryption::AwsKms
            }
        }
    }

    /// KMS key id, if one is attached
    pub fn kms_key_id(&self) -> Option<&str> {
        match self {
            S3ServerSideEncryption::AwsKms { key_id } => key_id.as_deref(),
            S3ServerSideEncryption::Aes256 => None,
        }
    }

    /// Convert from the SDK representation returned by HEAD/GET
    pub fn from_aws(
        sse: &aws_sdk_s3::types::ServerSideEncryption,
        key_id: Option<&str>,
    ) -> Option<Self> {
        match sse {
            aws_sdk_s3::types::ServerSideEncryption::Aes256 => Some(Self::Aes256),
            aws_sdk_s3::types::ServerSideEncryption::AwsKms => Some(Self::AwsKms {
                key_id: key_id.map(str::to_string),
            }),
            _ => None,
        }
    }
}

/// Write requests that can carry server-side-encryption parameters
pub trait EncryptableRequest {
    fn set_server_side_encryption(&mut self, sse: S3ServerSideEncryption);
    fn server_side_encryption(&self) -> Option<&S3ServerSideEncryption>;
}

/// PutObject parameters
#[derive(Debug, Clone)]
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub body: Bytes,
    pub content_type: Option<String>,
    pub metadata: HashMap<String, String>,
    pub server_side_encryption: Option<S3ServerSideEncryption>,
}

impl PutObjectRequest {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            body: body.into(),
            content_type: None,
            metadata: HashMap::new(),
            server_side_encryption: None,
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

impl EncryptableRequest for PutObjectRequest {
    fn set_server_side_encryption(&mut self, sse: S3ServerSideEncryption) {
        self.server_side_encryption = Some(sse);
    }

    fn server_side_encryption(&self) -> Option<&S3ServerSideEncryption> {
        self.server_side_encryption.as_ref()
    }
}

/// CopyObject parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyObjectRequest {
    pub source_bucket: String,
    pub source_key: String,
    pub bucket: String,
    pub key: String,
    pub server_side_encryption: Option<S3ServerSideEncryption>,
}

impl CopyObjectRequest {
    pub fn new(
        source_bucket: impl Into<String>,
        source_key: impl Into<String>,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            source_bucket: source_bucket.into(),
            source_key: source_key.into(),
            bucket: bucket.into(),
            key: key.into(),
            server_side_encryption: None,
        }
    }

    /// Value of the `x-amz-copy-source` header, with the key URL-encoded
    pub fn copy_source(&self) -> String {
        format!(
            "{}/{}",
            self.source_bucket,
            utf8_percent_encode(&self.source_key, COPY_SOURCE_ENCODE_SET)
        )
    }
}

impl EncryptableRequest for CopyObjectRequest {
    fn set_server_side_encryption(&mut self, sse: S3ServerSideEncryption) {
        self.server_side_encryption = Some(sse);
    }

    fn server_side_encryption(&self) -> Option<&S3ServerSideEncryption> {
        self.server_side_encryption.as_ref()
    }
}

/// Outcome of a successful write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub etag: Option<String>,
    pub version_id: Option<String>,
}

/// Outcome of a successful HeadBucket call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadBucketOutcome {
    /// Value of the `x-amz-bucket-region` header
    pub bucket_region: Option<String>,
}

/// A key that could not be removed by a batch delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    pub key: String,
    pub code: Option<String>,
    pub message: Option<String>,
}

/// Object content bound to the client of the bucket's region
#[derive(Debug)]
pub struct ObjectBody {
    pub metadata: S3ObjectMetadata,
    pub body: ByteStream,
}

impl ObjectBody {
    /// Buffer the whole body in memory
    pub async fn into_bytes(self) -> S3Result<Bytes> {
        let data = self
            .body
            .collect()
            .await
            .map_err(|e| S3Error::Network(format!("Failed to collect response body: {}", e)))?;
        Ok(data.into_bytes())
    }

    /// Stream the body through tokio's `AsyncRead`
    pub fn into_async_read(self) -> impl tokio::io::AsyncRead + Send + Unpin {
        self.body.into_async_read()
    }
}

/// HTTP method of a presigned request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresignMethod {
    Get,
    Put,
}

/// Input for presigning a single object request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignRequest {
    pub method: PresignMethod,
    pub bucket: String,
    pub key: String,
    pub expires_in: Duration,
    pub server_side_encryption: Option<S3ServerSideEncryption>,
}

impl EncryptableRequest for PresignRequest {
    fn set_server_side_encryption(&mut self, sse: S3ServerSideEncryption) {
        self.server_side_encryption = Some(sse);
    }

    fn server_side_encryption(&self) -> Option<&S3ServerSideEncryption> {
        self.server_side_encryption.as_ref()
    }
}

/// A presigned URL plus the headers the caller must send with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedUrl {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
}
