//! Per-region client seam.
//!
//! [`S3Transport`] is one region-bound client handle. [`ClientFactory`]
//! builds handles for a region and credential; the production factory is
//! [`AwsClientFactory`](super::AwsClientFactory).

use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use std::time::Duration;

use super::credentials::CredentialHandle;
use super::error::S3Result;
use super::types::{
    BucketInfo, CopyObjectRequest, DeleteFailure, HeadBucketOutcome, ListObjectsRequest,
    ObjectBody, PresignRequest, PresignedUrl, PutObjectRequest, S3ListResult, S3ObjectMetadata,
    WriteOutcome,
};

/// How the bucket name is encoded in request URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Addressing {
    /// `https://<bucket>.s3.<region>.amazonaws.com/<key>`
    VirtualHosted,
    /// `https://s3.<region>.amazonaws.com/<bucket>/<key>`
    PathStyle,
}

/// Everything needed to build one per-region client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSpec {
    pub region: Region,
    pub addressing: Addressing,
    pub endpoint: Option<String>,
    pub connect_timeout: Duration,
    pub socket_timeout: Duration,
}

/// A client bound to one region and one credential provider.
///
/// Implementations must be safe for concurrent use; a single handle serves
/// every caller routed to its region.
#[async_trait]
pub trait S3Transport: Send + Sync {
    /// Region this client signs for
    fn region(&self) -> &Region;

    async fn list_buckets(&self) -> S3Result<Vec<BucketInfo>>;

    /// Raw location constraint; `None` when the service returned none
    async fn get_bucket_location(&self, bucket: &str) -> S3Result<Option<String>>;

    async fn head_bucket(&self, bucket: &str) -> S3Result<HeadBucketOutcome>;

    async fn create_bucket(&self, bucket: &str) -> S3Result<()>;

    async fn delete_bucket(&self, bucket: &str) -> S3Result<()>;

    async fn list_objects(&self, request: &ListObjectsRequest) -> S3Result<S3ListResult>;

    async fn head_object(&self, bucket: &str, key: &str) -> S3Result<S3ObjectMetadata>;

    async fn get_object(&self, bucket: &str, key: &str) -> S3Result<ObjectBody>;

    async fn put_object(&self, request: PutObjectRequest) -> S3Result<WriteOutcome>;

    async fn copy_object(&self, request: &CopyObjectRequest) -> S3Result<WriteOutcome>;

    async fn delete_object(&self, bucket: &str, key: &str) -> S3Result<()>;

    /// Delete up to [`MAX_DELETE_BATCH`](super::MAX_DELETE_BATCH) keys in one call
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> S3Result<Vec<DeleteFailure>>;

    async fn presign(&self, request: &PresignRequest) -> S3Result<PresignedUrl>;

    /// Release the handle. Called exactly once, when the owning router closes.
    ///
    /// The pool drops its reference right after this call; handles that
    /// hold nothing beyond their own memory can rely on that drop alone.
    fn shutdown(&self) {}
}

/// Builds per-region clients
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn build(
        &self,
        spec: ClientSpec,
        credentials: CredentialHandle,
    ) -> S3Result<Arc<dyn S3Transport>>;
}
