/*!
 * In-memory S3 fake shared by the router integration tests
 *
 * `FakeS3` holds buckets, objects, behaviour switches and call counters.
 * `FakeFactory` hands out `FakeClient` handles bound to it, one per build.
 */

#![allow(dead_code)]

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use orbit_s3_router::protocol::s3::{
    BucketInfo, ClientFactory, ClientSpec, CopyObjectRequest, CredentialHandle, DeleteFailure,
    HeadBucketOutcome, ListObjectsRequest, MultiRegionClient, ObjectBody, PlaintextSecrets,
    PresignMethod, PresignRequest, PresignedUrl, PutObjectRequest, Region, S3Error, S3ListResult,
    S3Object, S3ObjectMetadata, S3Result, S3ServerSideEncryption, S3Transport, WriteOutcome,
};
use orbit_s3_router::ConnectionConfig;
use percent_encoding::percent_decode_str;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How `HeadBucket` answers for an existing bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadMode {
    /// 200 with the region header
    Ok,
    /// 200 without the region header
    OkWithoutRegion,
    /// 301 carrying the region header
    Redirect,
    /// 403 carrying the region header
    DeniedWithRegion,
    /// 403 without any region information
    Denied,
}

#[derive(Debug, Clone)]
struct FakeBucket {
    region: String,
    /// Raw `GetBucketLocation` answer
    constraint: Option<String>,
    objects: BTreeMap<String, Bytes>,
}

/// Shared state of the fake service
#[derive(Debug)]
pub struct FakeS3 {
    buckets: Mutex<HashMap<String, FakeBucket>>,
    undeletable: Mutex<HashSet<String>>,
    head_mode: Mutex<HeadMode>,

    pub deny_location: AtomicBool,
    pub deny_list_buckets: AtomicBool,
    pub fail_list_buckets: AtomicBool,
    pub fail_location: AtomicBool,
    pub fail_builds: AtomicBool,
    pub page_size: AtomicUsize,
    /// Artificial latency on location lookups and client builds
    pub latency_ms: AtomicUsize,

    pub builds: AtomicUsize,
    pub location_calls: AtomicUsize,
    pub head_bucket_calls: AtomicUsize,
    pub list_bucket_calls: AtomicUsize,
    pub list_object_calls: AtomicUsize,

    specs: Mutex<Vec<(ClientSpec, CredentialHandle)>>,
    clients: Mutex<Vec<Arc<FakeClient>>>,
    puts: Mutex<Vec<PutObjectRequest>>,
    copies: Mutex<Vec<(String, CopyObjectRequest)>>,
    delete_batches: Mutex<Vec<usize>>,
}

impl FakeS3 {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            buckets: Mutex::new(HashMap::new()),
            undeletable: Mutex::new(HashSet::new()),
            head_mode: Mutex::new(HeadMode::Ok),
            deny_location: AtomicBool::new(false),
            deny_list_buckets: AtomicBool::new(false),
            fail_list_buckets: AtomicBool::new(false),
            fail_location: AtomicBool::new(false),
            fail_builds: AtomicBool::new(false),
            page_size: AtomicUsize::new(1000),
            latency_ms: AtomicUsize::new(0),
            builds: AtomicUsize::new(0),
            location_calls: AtomicUsize::new(0),
            head_bucket_calls: AtomicUsize::new(0),
            list_bucket_calls: AtomicUsize::new(0),
            list_object_calls: AtomicUsize::new(0),
            specs: Mutex::new(Vec::new()),
            clients: Mutex::new(Vec::new()),
            puts: Mutex::new(Vec::new()),
            copies: Mutex::new(Vec::new()),
            delete_batches: Mutex::new(Vec::new()),
        })
    }

    /// Add a bucket; `us-east-1` buckets report no location constraint
    pub fn add_bucket(&self, name: &str, region: &str) {
        let constraint = if region == "us-east-1" {
            None
        } else {
            Some(region.to_string())
        };
        self.insert_bucket(name, region, constraint);
    }

    /// Add a bucket whose location constraint is reported verbatim
    pub fn add_bucket_with_constraint(&self, name: &str, region: &str, constraint: Option<&str>) {
        self.insert_bucket(name, region, constraint.map(str::to_string));
    }

    fn insert_bucket(&self, name: &str, region: &str, constraint: Option<String>) {
        self.buckets.lock().unwrap().insert(
            name.to_string(),
            FakeBucket {
                region: region.to_string(),
                constraint,
                objects: BTreeMap::new(),
            },
        );
    }

    pub fn add_object(&self, bucket: &str, key: &str, body: &str) {
        let mut buckets = self.buckets.lock().unwrap();
        let bucket = buckets.get_mut(bucket).expect("bucket must exist");
        bucket
            .objects
            .insert(key.to_string(), Bytes::copy_from_slice(body.as_bytes()));
    }

    pub fn has_object(&self, bucket: &str, key: &str) -> bool {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .is_some_and(|b| b.objects.contains_key(key))
    }

    pub fn object_count(&self, bucket: &str) -> usize {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .map_or(0, |b| b.objects.len())
    }

    pub fn mark_undeletable(&self, key: &str) {
        self.undeletable.lock().unwrap().insert(key.to_string());
    }

    pub fn set_head_mode(&self, mode: HeadMode) {
        *self.head_mode.lock().unwrap() = mode;
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn builds(&self) -> usize {
        Self::count(&self.builds)
    }

    pub fn location_calls(&self) -> usize {
        Self::count(&self.location_calls)
    }

    pub fn head_bucket_calls(&self) -> usize {
        Self::count(&self.head_bucket_calls)
    }

    pub fn list_bucket_calls(&self) -> usize {
        Self::count(&self.list_bucket_calls)
    }

    pub fn specs(&self) -> Vec<(ClientSpec, CredentialHandle)> {
        self.specs.lock().unwrap().clone()
    }

    pub fn clients(&self) -> Vec<Arc<FakeClient>> {
        self.clients.lock().unwrap().clone()
    }

    pub fn puts(&self) -> Vec<PutObjectRequest> {
        self.puts.lock().unwrap().clone()
    }

    /// Copies as `(region of the client that served it, request)`
    pub fn copies(&self) -> Vec<(String, CopyObjectRequest)> {
        self.copies.lock().unwrap().clone()
    }

    pub fn delete_batches(&self) -> Vec<usize> {
        self.delete_batches.lock().unwrap().clone()
    }

    async fn latency(&self) {
        let ms = self.latency_ms.load(Ordering::SeqCst) as u64;
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    fn bucket(&self, name: &str) -> S3Result<FakeBucket> {
        self.buckets
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| S3Error::BucketNotFound(name.to_string()))
    }
}

/// One fake per-region client handle
#[derive(Debug)]
pub struct FakeClient {
    region: Region,
    pub spec: ClientSpec,
    service: Arc<FakeS3>,
    shutdowns: AtomicUsize,
}

impl FakeClient {
    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    fn served_from(&self) -> String {
        self.region.as_ref().to_string()
    }
}

#[async_trait]
impl S3Transport for FakeClient {
    fn region(&self) -> &Region {
        &self.region
    }

    async fn list_buckets(&self) -> S3Result<Vec<BucketInfo>> {
        self.service.list_bucket_calls.fetch_add(1, Ordering::SeqCst);
        if self.service.deny_list_buckets.load(Ordering::SeqCst) {
            return Err(S3Error::AccessDenied {
                message: "ListAllMyBuckets denied".to_string(),
                bucket_region: None,
            });
        }
        if self.service.fail_list_buckets.load(Ordering::SeqCst) {
            return Err(S3Error::Network("connection reset".to_string()));
        }

        let mut buckets: Vec<BucketInfo> = self
            .service
            .buckets
            .lock()
            .unwrap()
            .keys()
            .map(|name| BucketInfo {
                name: name.clone(),
                creation_date: Some(std::time::UNIX_EPOCH + Duration::from_secs(1_600_000_000)),
            })
            .collect();
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    async fn get_bucket_location(&self, bucket: &str) -> S3Result<Option<String>> {
        self.service.location_calls.fetch_add(1, Ordering::SeqCst);
        self.service.latency().await;

        if self.service.fail_location.load(Ordering::SeqCst) {
            return Err(S3Error::Timeout("GetBucketLocation".to_string()));
        }
        if self.service.deny_location.load(Ordering::SeqCst) {
            return Err(S3Error::AccessDenied {
                message: "GetBucketLocation denied".to_string(),
                bucket_region: None,
            });
        }
        Ok(self.service.bucket(bucket)?.constraint)
    }

    async fn head_bucket(&self, bucket: &str) -> S3Result<HeadBucketOutcome> {
        self.service.head_bucket_calls.fetch_add(1, Ordering::SeqCst);
        let found = self.service.bucket(bucket)?;
        let mode = *self.service.head_mode.lock().unwrap();

        match mode {
            HeadMode::Ok => Ok(HeadBucketOutcome {
                bucket_region: Some(found.region),
            }),
            HeadMode::OkWithoutRegion => Ok(HeadBucketOutcome::default()),
            HeadMode::Redirect => Err(S3Error::Redirect {
                bucket: bucket.to_string(),
                region: Some(found.region),
            }),
            HeadMode::DeniedWithRegion => Err(S3Error::AccessDenied {
                message: "HeadBucket denied".to_string(),
                bucket_region: Some(found.region),
            }),
            HeadMode::Denied => Err(S3Error::AccessDenied {
                message: "HeadBucket denied".to_string(),
                bucket_region: None,
            }),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> S3Result<()> {
        self.service.add_bucket(bucket, self.region.as_ref());
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> S3Result<()> {
        self.service
            .buckets
            .lock()
            .unwrap()
            .remove(bucket)
            .map(|_| ())
            .ok_or_else(|| S3Error::BucketNotFound(bucket.to_string()))
    }

    async fn list_objects(&self, request: &ListObjectsRequest) -> S3Result<S3ListResult> {
        self.service.list_object_calls.fetch_add(1, Ordering::SeqCst);
        let found = self.service.bucket(&request.bucket)?;
        let page_size = self.service.page_size.load(Ordering::SeqCst);
        let start: usize = request
            .continuation_token
            .as_deref()
            .map(|t| t.parse().unwrap())
            .unwrap_or(0);

        let matching: Vec<(&String, &Bytes)> = found
            .objects
            .iter()
            .filter(|(key, _)| {
                request
                    .prefix
                    .as_deref()
                    .map_or(true, |prefix| key.starts_with(prefix))
            })
            .collect();

        let end = (start + page_size).min(matching.len());
        let objects = matching[start..end]
            .iter()
            .map(|(key, body)| S3Object {
                key: (*key).clone(),
                size: body.len() as u64,
                last_modified: None,
                etag: None,
                storage_class: None,
            })
            .collect();

        let is_truncated = end < matching.len();
        Ok(S3ListResult {
            objects,
            common_prefixes: Vec::new(),
            continuation_token: is_truncated.then(|| end.to_string()),
            is_truncated,
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> S3Result<S3ObjectMetadata> {
        let found = self.service.bucket(bucket)?;
        let body = found.objects.get(key).ok_or_else(|| S3Error::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })?;
        Ok(S3ObjectMetadata {
            key: key.to_string(),
            size: body.len() as u64,
            ..Default::default()
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> S3Result<ObjectBody> {
        let metadata = self.head_object(bucket, key).await?;
        let body = self.service.bucket(bucket)?.objects[key].clone();
        Ok(ObjectBody {
            metadata,
            body: ByteStream::from(body),
        })
    }

    async fn put_object(&self, request: PutObjectRequest) -> S3Result<WriteOutcome> {
        {
            let mut buckets = self.service.buckets.lock().unwrap();
            let found = buckets
                .get_mut(&request.bucket)
                .ok_or_else(|| S3Error::BucketNotFound(request.bucket.clone()))?;
            found
                .objects
                .insert(request.key.clone(), request.body.clone());
        }
        self.service.puts.lock().unwrap().push(request);
        Ok(WriteOutcome {
            etag: Some("\"fake-etag\"".to_string()),
            version_id: None,
        })
    }

    async fn copy_object(&self, request: &CopyObjectRequest) -> S3Result<WriteOutcome> {
        // Resolve the source the way the service does, from the encoded header
        let header = request.copy_source();
        let (source_bucket, encoded_key) = header
            .split_once('/')
            .ok_or_else(|| S3Error::InvalidConfig(format!("bad copy source {}", header)))?;
        let source_key = percent_decode_str(encoded_key)
            .decode_utf8()
            .map_err(|e| S3Error::InvalidConfig(e.to_string()))?
            .into_owned();

        let source = self.service.bucket(source_bucket)?;
        let body = source
            .objects
            .get(&source_key)
            .cloned()
            .ok_or_else(|| S3Error::NotFound {
                bucket: source_bucket.to_string(),
                key: source_key.clone(),
            })?;
        {
            let mut buckets = self.service.buckets.lock().unwrap();
            let dest = buckets
                .get_mut(&request.bucket)
                .ok_or_else(|| S3Error::BucketNotFound(request.bucket.clone()))?;
            dest.objects.insert(request.key.clone(), body);
        }
        self.service
            .copies
            .lock()
            .unwrap()
            .push((self.served_from(), request.clone()));
        Ok(WriteOutcome::default())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> S3Result<()> {
        let mut buckets = self.service.buckets.lock().unwrap();
        let found = buckets
            .get_mut(bucket)
            .ok_or_else(|| S3Error::BucketNotFound(bucket.to_string()))?;
        found.objects.remove(key);
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> S3Result<Vec<DeleteFailure>> {
        assert!(keys.len() <= 1000, "DeleteObjects accepts at most 1000 keys");
        self.service.delete_batches.lock().unwrap().push(keys.len());

        let undeletable = self.service.undeletable.lock().unwrap().clone();
        let mut buckets = self.service.buckets.lock().unwrap();
        let found = buckets
            .get_mut(bucket)
            .ok_or_else(|| S3Error::BucketNotFound(bucket.to_string()))?;

        let mut failures = Vec::new();
        for key in keys {
            if undeletable.contains(key) {
                failures.push(DeleteFailure {
                    key: key.clone(),
                    code: Some("AccessDenied".to_string()),
                    message: Some("Access Denied".to_string()),
                });
            } else {
                found.objects.remove(key);
            }
        }
        Ok(failures)
    }

    async fn presign(&self, request: &PresignRequest) -> S3Result<PresignedUrl> {
        let method = match request.method {
            PresignMethod::Get => "GET",
            PresignMethod::Put => "PUT",
        };

        let mut headers = Vec::new();
        if let Some(sse) = &request.server_side_encryption {
            let marker = match sse {
                S3ServerSideEncryption::Aes256 => "AES256",
                S3ServerSideEncryption::AwsKms { .. } => "aws:kms",
            };
            headers.push((
                "x-amz-server-side-encryption".to_string(),
                marker.to_string(),
            ));
            if let Some(key_id) = sse.kms_key_id() {
                headers.push((
                    "x-amz-server-side-encryption-aws-kms-key-id".to_string(),
                    key_id.to_string(),
                ));
            }
        }

        Ok(PresignedUrl {
            url: format!(
                "https://{}.s3.{}.amazonaws.com/{}?X-Amz-Expires={}&X-Amz-Signature=fake",
                request.bucket,
                self.region,
                request.key,
                request.expires_in.as_secs()
            ),
            method: method.to_string(),
            headers,
        })
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory producing `FakeClient`s bound to one `FakeS3`
#[derive(Debug, Clone)]
pub struct FakeFactory {
    pub service: Arc<FakeS3>,
}

impl FakeFactory {
    pub fn new(service: Arc<FakeS3>) -> Arc<Self> {
        Arc::new(Self { service })
    }
}

#[async_trait]
impl ClientFactory for FakeFactory {
    async fn build(
        &self,
        spec: ClientSpec,
        credentials: CredentialHandle,
    ) -> S3Result<Arc<dyn S3Transport>> {
        self.service.builds.fetch_add(1, Ordering::SeqCst);
        self.service.latency().await;

        if self.service.fail_builds.load(Ordering::SeqCst) {
            return Err(S3Error::Credential("role assumption failed".to_string()));
        }

        self.service
            .specs
            .lock()
            .unwrap()
            .push((spec.clone(), credentials));

        let client = Arc::new(FakeClient {
            region: spec.region.clone(),
            spec,
            service: Arc::clone(&self.service),
            shutdowns: AtomicUsize::new(0),
        });
        self.service.clients.lock().unwrap().push(Arc::clone(&client));
        Ok(client as Arc<dyn S3Transport>)
    }
}

/// Router over a fresh fake, default region `us-east-1`
pub async fn router(service: &Arc<FakeS3>) -> MultiRegionClient {
    router_with(service, ConnectionConfig::new("us-east-1")).await
}

pub async fn router_with(service: &Arc<FakeS3>, config: ConnectionConfig) -> MultiRegionClient {
    MultiRegionClient::with_factory(
        config,
        Arc::new(PlaintextSecrets),
        FakeFactory::new(Arc::clone(service)),
    )
    .await
    .expect("router should connect")
}
