//! AWS SDK backed per-region clients

use async_trait::async_trait;
use aws_config::default_provider::credentials::DefaultCredentialsChain;
use aws_config::sts::AssumeRoleProvider;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{Credentials, IdentityCache, Region, SharedCredentialsProvider};
use aws_sdk_s3::operation::copy_object::builders::CopyObjectFluentBuilder;
use aws_sdk_s3::operation::get_object::GetObjectOutput;
use aws_sdk_s3::operation::head_object::HeadObjectOutput;
use aws_sdk_s3::operation::put_object::builders::PutObjectFluentBuilder;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::{ByteStream, DateTime};
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, Delete, ObjectIdentifier,
    ServerSideEncryption,
};
use aws_sdk_s3::Client as AwsS3Client;
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

use super::credentials::CredentialHandle;
use super::error::{from_sdk_error, ErrorTarget, S3Error, S3Result};
use super::transport::{Addressing, ClientFactory, ClientSpec, S3Transport};
use super::types::{
    BucketInfo, CopyObjectRequest, DeleteFailure, HeadBucketOutcome, ListObjectsRequest,
    ObjectBody, PresignMethod, PresignRequest, PresignedUrl, PutObjectRequest, S3ListResult,
    S3Object, S3ObjectMetadata, S3ServerSideEncryption, WriteOutcome,
};
use super::{CREDENTIAL_REFRESH_BUFFER, LEGACY_DEFAULT_REGION};

/// Name reported by static credential providers
const STATIC_PROVIDER_NAME: &str = "orbit-s3-static";

/// Builds `aws-sdk-s3` clients
#[derive(Debug, Default, Clone, Copy)]
pub struct AwsClientFactory;

impl AwsClientFactory {
    pub fn new() -> Self {
        Self
    }
}

type ProviderFuture<'a> = Pin<Box<dyn Future<Output = Option<SharedCredentialsProvider>> + Send + 'a>>;

/// Turn a credential handle into an SDK provider; `None` means unsigned
fn credentials_provider<'a>(handle: &'a CredentialHandle, region: &'a Region) -> ProviderFuture<'a> {
    Box::pin(async move {
        match handle {
            CredentialHandle::Anonymous => None,
            CredentialHandle::Ambient => Some(SharedCredentialsProvider::new(
                DefaultCredentialsChain::builder()
                    .region(region.clone())
                    .build()
                    .await,
            )),
            CredentialHandle::Static {
                access_key_id,
                secret_access_key,
                session_token,
            } => Some(SharedCredentialsProvider::new(Credentials::new(
                access_key_id,
                secret_access_key.expose_secret(),
                session_token.as_ref().map(|t| t.expose_secret().to_string()),
                None,
                STATIC_PROVIDER_NAME,
            ))),
            CredentialHandle::Delegated {
                base,
                role_arn,
                session_name,
                session_length,
                sts_region,
            } => {
                let sts_region = Region::new(sts_region.clone());
                // Anonymous connections cannot assume roles; validation rejects the combination
                let base = credentials_provider(base, &sts_region).await?;
                let provider = AssumeRoleProvider::builder(role_arn.clone())
                    .session_name(session_name.clone())
                    .session_length(*session_length)
                    .region(sts_region.clone())
                    .build_from_provider(base)
                    .await;
                Some(SharedCredentialsProvider::new(provider))
            }
        }
    })
}

#[async_trait]
impl ClientFactory for AwsClientFactory {
    async fn build(
        &self,
        spec: ClientSpec,
        credentials: CredentialHandle,
    ) -> S3Result<Arc<dyn S3Transport>> {
        debug!(
            region = %spec.region,
            addressing = ?spec.addressing,
            credentials = credentials.kind(),
            "Building S3 client"
        );

        let timeout_config = TimeoutConfig::builder()
            .connect_timeout(spec.connect_timeout)
            .read_timeout(spec.socket_timeout)
            .build();

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(spec.region.clone())
            .timeout_config(timeout_config)
            // Refresh delegated credentials well before they expire
            .identity_cache(
                IdentityCache::lazy()
                    .buffer_time(CREDENTIAL_REFRESH_BUFFER)
                    .build(),
            );

        loader = match credentials_provider(&credentials, &spec.region).await {
            Some(provider) => loader.credentials_provider(provider),
            None if credentials.is_anonymous() => loader.no_credentials(),
            None => {
                return Err(S3Error::Credential(
                    "Role assumption requires signed base credentials".to_string(),
                ))
            }
        };

        let sdk_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);

        if let Some(endpoint) = &spec.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        if spec.addressing == Addressing::PathStyle {
            builder = builder.force_path_style(true);
        }

        Ok(Arc::new(AwsS3Transport {
            client: AwsS3Client::from_conf(builder.build()),
            region: spec.region,
        }))
    }
}

/// One region-bound `aws-sdk-s3` client.
///
/// Uses the default no-op `shutdown`: the SDK client's connection pool is
/// released when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct AwsS3Transport {
    client: AwsS3Client,
    region: Region,
}

impl AwsS3Transport {
    /// Get a reference to the underlying AWS S3 client
    pub fn aws_client(&self) -> &AwsS3Client {
        &self.client
    }
}

fn to_system_time(dt: Option<&DateTime>) -> Option<SystemTime> {
    dt.and_then(|dt| SystemTime::try_from(*dt).ok())
}

/// Request builders that accept server-side encryption headers
trait EncryptionHeaders: Sized {
    fn sse(self, algorithm: ServerSideEncryption) -> Self;
    fn sse_kms_key_id(self, key_id: Option<String>) -> Self;
}

impl EncryptionHeaders for PutObjectFluentBuilder {
    fn sse(self, algorithm: ServerSideEncryption) -> Self {
        self.server_side_encryption(algorithm)
    }

    fn sse_kms_key_id(self, key_id: Option<String>) -> Self {
        self.set_ssekms_key_id(key_id)
    }
}

impl EncryptionHeaders for CopyObjectFluentBuilder {
    fn sse(self, algorithm: ServerSideEncryption) -> Self {
        self.server_side_encryption(algorithm)
    }

    fn sse_kms_key_id(self, key_id: Option<String>) -> Self {
        self.set_ssekms_key_id(key_id)
    }
}

/// Add the encryption headers of `sse` to a write request
fn with_encryption<B: EncryptionHeaders>(builder: B, sse: Option<&S3ServerSideEncryption>) -> B {
    match sse {
        Some(sse) => builder
            .sse(sse.to_aws())
            .sse_kms_key_id(sse.kms_key_id().map(str::to_string)),
        None => builder,
    }
}

/// Object responses that carry metadata headers
trait ObjectHeaders {
    fn content_length(&self) -> Option<i64>;
    fn last_modified(&self) -> Option<&DateTime>;
    fn e_tag(&self) -> Option<&str>;
    fn content_type(&self) -> Option<&str>;
    fn user_metadata(&self) -> Option<&HashMap<String, String>>;
    fn sse(&self) -> Option<&ServerSideEncryption>;
    fn sse_kms_key_id(&self) -> Option<&str>;
    fn version_id(&self) -> Option<&str>;
}

impl ObjectHeaders for HeadObjectOutput {
    fn content_length(&self) -> Option<i64> {
        HeadObjectOutput::content_length(self)
    }
    fn last_modified(&self) -> Option<&DateTime> {
        HeadObjectOutput::last_modified(self)
    }
    fn e_tag(&self) -> Option<&str> {
        HeadObjectOutput::e_tag(self)
    }
    fn content_type(&self) -> Option<&str> {
        HeadObjectOutput::content_type(self)
    }
    fn user_metadata(&self) -> Option<&HashMap<String, String>> {
        self.metadata()
    }
    fn sse(&self) -> Option<&ServerSideEncryption> {
        self.server_side_encryption()
    }
    fn sse_kms_key_id(&self) -> Option<&str> {
        self.ssekms_key_id()
    }
    fn version_id(&self) -> Option<&str> {
        HeadObjectOutput::version_id(self)
    }
}

impl ObjectHeaders for GetObjectOutput {
    fn content_length(&self) -> Option<i64> {
        GetObjectOutput::content_length(self)
    }
    fn last_modified(&self) -> Option<&DateTime> {
        GetObjectOutput::last_modified(self)
    }
    fn e_tag(&self) -> Option<&str> {
        GetObjectOutput::e_tag(self)
    }
    fn content_type(&self) -> Option<&str> {
        GetObjectOutput::content_type(self)
    }
    fn user_metadata(&self) -> Option<&HashMap<String, String>> {
        self.metadata()
    }
    fn sse(&self) -> Option<&ServerSideEncryption> {
        self.server_side_encryption()
    }
    fn sse_kms_key_id(&self) -> Option<&str> {
        self.ssekms_key_id()
    }
    fn version_id(&self) -> Option<&str> {
        GetObjectOutput::version_id(self)
    }
}

fn object_metadata(key: &str, response: &impl ObjectHeaders) -> S3ObjectMetadata {
    S3ObjectMetadata {
        key: key.to_string(),
        size: response.content_length().unwrap_or(0).max(0) as u64,
        last_modified: to_system_time(response.last_modified()),
        etag: response.e_tag().map(str::to_string),
        content_type: response.content_type().map(str::to_string),
        metadata: response.user_metadata().cloned().unwrap_or_default(),
        server_side_encryption: response
            .sse()
            .and_then(|sse| S3ServerSideEncryption::from_aws(sse, response.sse_kms_key_id())),
        version_id: response.version_id().map(str::to_string),
    }
}

#[async_trait]
impl S3Transport for AwsS3Transport {
    fn region(&self) -> &Region {
        &self.region
    }

    async fn list_buckets(&self) -> S3Result<Vec<BucketInfo>> {
        let response = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| from_sdk_error(ErrorTarget::none(), e))?;

        Ok(response
            .buckets()
            .iter()
            .filter_map(|b| {
                Some(BucketInfo {
                    name: b.name()?.to_string(),
                    creation_date: to_system_time(b.creation_date()),
                })
            })
            .collect())
    }

    async fn get_bucket_location(&self, bucket: &str) -> S3Result<Option<String>> {
        let response = self
            .client
            .get_bucket_location()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| from_sdk_error(ErrorTarget::bucket(bucket), e))?;

        Ok(response
            .location_constraint()
            .map(|c| c.as_str().to_string()))
    }

    async fn head_bucket(&self, bucket: &str) -> S3Result<HeadBucketOutcome> {
        let response = self
            .client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| from_sdk_error(ErrorTarget::bucket(bucket), e))?;

        Ok(HeadBucketOutcome {
            bucket_region: response.bucket_region().map(str::to_string),
        })
    }

    async fn create_bucket(&self, bucket: &str) -> S3Result<()> {
        let mut request = self.client.create_bucket().bucket(bucket);

        // us-east-1 rejects an explicit location constraint
        if self.region.as_ref() != LEGACY_DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_ref()))
                    .build(),
            );
        }

        request
            .send()
            .await
            .map_err(|e| from_sdk_error(ErrorTarget::bucket(bucket), e))?;
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> S3Result<()> {
        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| from_sdk_error(ErrorTarget::bucket(bucket), e))?;
        Ok(())
    }

    async fn list_objects(&self, request: &ListObjectsRequest) -> S3Result<S3ListResult> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(&request.bucket)
            .set_prefix(request.prefix.clone())
            .set_delimiter(request.delimiter.clone())
            .set_continuation_token(request.continuation_token.clone())
            .set_max_keys(request.max_keys)
            .send()
            .await
            .map_err(|e| from_sdk_error(ErrorTarget::bucket(&request.bucket), e))?;

        let objects = response
            .contents()
            .iter()
            .filter_map(|obj| {
                Some(S3Object {
                    key: obj.key()?.to_string(),
                    size: obj.size().unwrap_or(0).max(0) as u64,
                    last_modified: to_system_time(obj.last_modified()),
                    etag: obj.e_tag().map(|s| s.to_string()),
                    storage_class: obj.storage_class().map(|sc| sc.as_str().to_string()),
                })
            })
            .collect();

        let common_prefixes = response
            .common_prefixes()
            .iter()
            .filter_map(|cp| cp.prefix().map(|s| s.to_string()))
            .collect();

        Ok(S3ListResult {
            objects,
            common_prefixes,
            continuation_token: response.next_continuation_token().map(|s| s.to_string()),
            is_truncated: response.is_truncated().unwrap_or(false),
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> S3Result<S3ObjectMetadata> {
        let response = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| from_sdk_error(ErrorTarget::object(bucket, key), e))?;

        Ok(object_metadata(key, &response))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> S3Result<ObjectBody> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| from_sdk_error(ErrorTarget::object(bucket, key), e))?;

        Ok(ObjectBody {
            metadata: object_metadata(key, &response),
            body: response.body,
        })
    }

    async fn put_object(&self, request: PutObjectRequest) -> S3Result<WriteOutcome> {
        let PutObjectRequest {
            bucket,
            key,
            body,
            content_type,
            metadata,
            server_side_encryption,
        } = request;

        let mut builder = self
            .client
            .put_object()
            .bucket(&bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .set_content_type(content_type);

        if !metadata.is_empty() {
            builder = builder.set_metadata(Some(metadata));
        }

        let response = with_encryption(builder, server_side_encryption.as_ref())
            .send()
            .await
            .map_err(|e| from_sdk_error(ErrorTarget::object(&bucket, &key), e))?;

        Ok(WriteOutcome {
            etag: response.e_tag().map(|s| s.to_string()),
            version_id: response.version_id().map(|s| s.to_string()),
        })
    }

    async fn copy_object(&self, request: &CopyObjectRequest) -> S3Result<WriteOutcome> {
        let builder = self
            .client
            .copy_object()
            .bucket(&request.bucket)
            .key(&request.key)
            .copy_source(request.copy_source());

        let response = with_encryption(builder, request.server_side_encryption.as_ref())
            .send()
            .await
            .map_err(|e| from_sdk_error(ErrorTarget::object(&request.bucket, &request.key), e))?;

        Ok(WriteOutcome {
            etag: response
                .copy_object_result()
                .and_then(|r| r.e_tag())
                .map(|s| s.to_string()),
            version_id: response.version_id().map(|s| s.to_string()),
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> S3Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| from_sdk_error(ErrorTarget::object(bucket, key), e))?;
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> S3Result<Vec<DeleteFailure>> {
        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(S3Error::from_sdk)?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(S3Error::from_sdk)?;

        let response = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| from_sdk_error(ErrorTarget::bucket(bucket), e))?;

        Ok(response
            .errors()
            .iter()
            .map(|e| DeleteFailure {
                key: e.key().unwrap_or_default().to_string(),
                code: e.code().map(|s| s.to_string()),
                message: e.message().map(|s| s.to_string()),
            })
            .collect())
    }

    async fn presign(&self, request: &PresignRequest) -> S3Result<PresignedUrl> {
        let config = PresigningConfig::expires_in(request.expires_in)
            .map_err(|e| S3Error::Presign(e.to_string()))?;
        let target = ErrorTarget::object(&request.bucket, &request.key);

        let presigned = match request.method {
            PresignMethod::Get => self
                .client
                .get_object()
                .bucket(&request.bucket)
                .key(&request.key)
                .presigned(config)
                .await
                .map_err(|e| from_sdk_error(target, e))?,
            PresignMethod::Put => {
                let builder = self
                    .client
                    .put_object()
                    .bucket(&request.bucket)
                    .key(&request.key);
                with_encryption(builder, request.server_side_encryption.as_ref())
                    .presigned(config)
                    .await
                    .map_err(|e| from_sdk_error(target, e))?
            }
        };

        Ok(PresignedUrl {
            url: presigned.uri().to_string(),
            method: presigned.method().to_string(),
            headers: presigned
                .headers()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        })
    }
}
