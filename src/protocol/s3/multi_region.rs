//! Multi-region S3 client
//!
//! Routes every bucket-addressed call to a client for the bucket's region.
//! Regions are discovered on first use and cached for the lifetime of the
//! client, as are the per-region clients themselves.

use aws_sdk_s3::config::Region;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::client::AwsClientFactory;
use super::client_pool::ClientPool;
use super::config::ConnectionConfig;
use super::credentials::{CredentialResolver, SecretDecryptor};
use super::encryption::apply_server_side_encryption;
use super::error::{S3Error, S3Result};
use super::permission::probe_list_permission;
use super::presign::Presigner;
use super::region_cache::{probe_bucket, BucketRegion, ExistenceProbe, RegionCache};
use super::transport::{ClientFactory, S3Transport};
use super::types::{
    BucketInfo, CopyObjectRequest, DeleteFailure, ListObjectsRequest, ObjectBody,
    PutObjectRequest, S3ListResult, S3ObjectMetadata, WriteOutcome,
};
use super::MAX_DELETE_BATCH;

/// S3 client that works across regions without knowing bucket locations up front.
///
/// Safe to share between tasks behind an `Arc`. Call [`close`](Self::close)
/// once no operation is in flight to release every underlying client.
pub struct MultiRegionClient {
    config: ConnectionConfig,
    pool: ClientPool,
    regions: RegionCache,
    can_list_buckets: bool,
}

impl MultiRegionClient {
    /// Connect using `aws-sdk-s3` clients
    ///
    /// # Example
    ///
    /// ```no_run
    /// use orbit_s3_router::protocol::s3::{ConnectionConfig, MultiRegionClient, PlaintextSecrets};
    /// use std::sync::Arc;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = MultiRegionClient::connect(
    ///         ConnectionConfig::new("us-east-1"),
    ///         Arc::new(PlaintextSecrets),
    ///     )
    ///     .await?;
    ///
    ///     if client.object_exists("my-bucket", "path/to/file.txt").await? {
    ///         println!("found it");
    ///     }
    ///     client.close();
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(
        config: ConnectionConfig,
        decryptor: Arc<dyn SecretDecryptor>,
    ) -> S3Result<Self> {
        Self::with_factory(config, decryptor, Arc::new(AwsClientFactory::new())).await
    }

    /// Connect using clients built by `factory`
    pub async fn with_factory(
        config: ConnectionConfig,
        decryptor: Arc<dyn SecretDecryptor>,
        factory: Arc<dyn ClientFactory>,
    ) -> S3Result<Self> {
        config.validate()?;

        let resolver = CredentialResolver::new(config.clone(), decryptor);
        let pool = ClientPool::new(config.clone(), resolver, factory).await?;

        let can_list_buckets = if config.auth.is_anonymous() {
            false
        } else {
            let probe = match pool.default_client().await {
                Ok(client) => probe_list_permission(client.as_ref()).await,
                Err(e) => Err(e),
            };
            match probe {
                Ok(allowed) => allowed,
                Err(e) => {
                    pool.close();
                    return Err(e);
                }
            }
        };

        info!(
            region = %config.region,
            can_list_buckets,
            "Connected multi-region S3 client"
        );

        Ok(Self {
            config,
            pool,
            regions: RegionCache::new(),
            can_list_buckets,
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn default_region(&self) -> &Region {
        self.pool.default_region()
    }

    /// Whether the credentials may call `ListBuckets`
    pub fn has_list_buckets_permission(&self) -> bool {
        self.can_list_buckets
    }

    /// Number of buckets whose region has been resolved
    pub fn cached_bucket_regions(&self) -> usize {
        self.regions.len()
    }

    /// Number of regional clients built so far
    pub fn cached_clients(&self) -> usize {
        self.pool.len()
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    fn ensure_open(&self) -> S3Result<()> {
        if self.pool.is_closed() {
            Err(S3Error::Closed)
        } else {
            Ok(())
        }
    }

    /// Region of `bucket`, resolved once and cached
    pub async fn region_for(&self, bucket: &str) -> S3Result<BucketRegion> {
        self.ensure_open()?;
        self.regions.resolve(bucket, &self.pool).await
    }

    /// Client for the bucket's region; missing buckets use the default region
    async fn client_for(&self, bucket: &str) -> S3Result<Arc<dyn S3Transport>> {
        match self.region_for(bucket).await? {
            BucketRegion::Located(region) => self.pool.get(&region).await,
            BucketRegion::Missing => self.pool.default_client().await,
        }
    }

    /// List every bucket owned by the caller
    pub async fn list_buckets(&self) -> S3Result<Vec<BucketInfo>> {
        self.ensure_open()?;
        self.pool.default_client().await?.list_buckets().await
    }

    /// List one page of objects
    #[tracing::instrument(
        skip(self, request),
        fields(otel.kind = "client", backend = "s3", bucket = %request.bucket)
    )]
    pub async fn list_objects(&self, request: &ListObjectsRequest) -> S3Result<S3ListResult> {
        self.client_for(&request.bucket)
            .await?
            .list_objects(request)
            .await
    }

    /// List all objects under `prefix`, following continuation tokens
    pub async fn list_all_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        delimiter: Option<&str>,
    ) -> S3Result<S3ListResult> {
        let client = self.client_for(bucket).await?;
        let mut request = ListObjectsRequest {
            bucket: bucket.to_string(),
            prefix: prefix.map(str::to_string),
            delimiter: delimiter.map(str::to_string),
            ..Default::default()
        };

        let mut all = S3ListResult::default();
        loop {
            let page = client.list_objects(&request).await?;
            all.objects.extend(page.objects);
            all.common_prefixes.extend(page.common_prefixes);

            match page.continuation_token {
                Some(token) if page.is_truncated => request.continuation_token = Some(token),
                _ => break,
            }
        }

        Ok(all)
    }

    /// Look up a bucket by name.
    ///
    /// With the listing permission this returns the full descriptor from
    /// `ListBuckets`. Without it only existence can be checked, so the
    /// descriptor carries just the name, and a failed probe reads as absent.
    #[tracing::instrument(skip(self), fields(otel.kind = "client", backend = "s3"))]
    pub async fn get_bucket(&self, name: &str) -> S3Result<Option<BucketInfo>> {
        self.ensure_open()?;

        if self.can_list_buckets {
            let buckets = self.list_buckets().await?;
            return Ok(buckets.into_iter().find(|b| b.name == name));
        }

        let client = self.pool.default_client().await?;
        match probe_bucket(client.as_ref(), name).await {
            ExistenceProbe::Exists(_) => Ok(Some(BucketInfo::stub(name))),
            ExistenceProbe::Missing => Ok(None),
            ExistenceProbe::Failed(e) if e.is_access_denied() => {
                debug!(bucket = name, "Existence probe denied, treating bucket as absent");
                Ok(None)
            }
            ExistenceProbe::Failed(e) => {
                warn!(bucket = name, error = %e, "Existence probe failed, treating bucket as absent");
                Ok(None)
            }
        }
    }

    /// Create a bucket in the default region
    pub async fn create_bucket(&self, bucket: &str) -> S3Result<()> {
        self.ensure_open()?;
        self.pool.default_client().await?.create_bucket(bucket).await
    }

    pub async fn delete_bucket(&self, bucket: &str) -> S3Result<()> {
        self.client_for(bucket).await?.delete_bucket(bucket).await
    }

    /// Object metadata, or `None` if the object (or its bucket) does not exist
    #[tracing::instrument(skip(self), fields(otel.kind = "client", backend = "s3"))]
    pub async fn head_object(&self, bucket: &str, key: &str) -> S3Result<Option<S3ObjectMetadata>> {
        match self.client_for(bucket).await?.head_object(bucket, key).await {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn object_exists(&self, bucket: &str, key: &str) -> S3Result<bool> {
        Ok(self.head_object(bucket, key).await?.is_some())
    }

    /// Open an object for reading
    #[tracing::instrument(skip(self), fields(otel.kind = "client", backend = "s3"))]
    pub async fn get_object(&self, bucket: &str, key: &str) -> S3Result<ObjectBody> {
        self.client_for(bucket).await?.get_object(bucket, key).await
    }

    /// Upload an object, applying the configured server-side encryption
    #[tracing::instrument(
        skip(self, request),
        fields(otel.kind = "client", backend = "s3", bucket = %request.bucket, key = %request.key)
    )]
    pub async fn put_object(&self, mut request: PutObjectRequest) -> S3Result<WriteOutcome> {
        apply_server_side_encryption(&mut request, &self.config.encryption);
        let client = self.client_for(&request.bucket).await?;
        client.put_object(request).await
    }

    /// Copy an object, routed to the destination bucket's region
    #[tracing::instrument(
        skip(self, request),
        fields(otel.kind = "client", backend = "s3", bucket = %request.bucket, key = %request.key)
    )]
    pub async fn copy_object(&self, mut request: CopyObjectRequest) -> S3Result<WriteOutcome> {
        apply_server_side_encryption(&mut request, &self.config.encryption);
        let client = self.client_for(&request.bucket).await?;
        client.copy_object(&request).await
    }

    pub async fn delete_object(&self, bucket: &str, key: &str) -> S3Result<()> {
        self.client_for(bucket).await?.delete_object(bucket, key).await
    }

    /// Delete many keys, in batches of at most [`MAX_DELETE_BATCH`].
    /// Returns the keys the service refused to delete.
    pub async fn delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> S3Result<Vec<DeleteFailure>> {
        if keys.is_empty() {
            self.ensure_open()?;
            return Ok(Vec::new());
        }

        let client = self.client_for(bucket).await?;
        let mut failures = Vec::new();
        for batch in keys.chunks(MAX_DELETE_BATCH) {
            failures.extend(client.delete_objects(bucket, batch).await?);
        }
        Ok(failures)
    }

    /// Presigning capability for `bucket`.
    ///
    /// Unlike other calls this fails with [`S3Error::BucketNotFound`] when the
    /// bucket does not exist.
    pub async fn presigner(&self, bucket: &str) -> S3Result<Presigner> {
        let region = match self.region_for(bucket).await? {
            BucketRegion::Located(region) => region,
            BucketRegion::Missing => return Err(S3Error::BucketNotFound(bucket.to_string())),
        };
        let client = self.pool.get(&region).await?;
        Ok(Presigner::new(bucket, client, self.config.encryption.clone()))
    }

    /// Release every underlying client.
    ///
    /// Must not be called while operations are in flight. Later calls are
    /// no-ops and later operations fail with [`S3Error::Closed`].
    pub fn close(&self) {
        self.pool.close();
    }
}

impl fmt::Debug for MultiRegionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiRegionClient")
            .field("default_region", self.pool.default_region())
            .field("can_list_buckets", &self.can_list_buckets)
            .field("pool", &self.pool)
            .field("regions", &self.regions)
            .finish()
    }
}
