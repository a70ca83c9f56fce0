//! Bucket to region resolution.
//!
//! Resolution runs at most once per bucket (see [`SingleFlight`]) and falls
//! back in two tiers:
//!
//! 1. `GetBucketLocation` through the path-style default-region client.
//!    Needs `s3:GetBucketLocation`.
//! 2. On access denied, `HeadBucket` through the default-region client. S3
//!    reports the bucket's region in the `x-amz-bucket-region` header on
//!    success as well as on redirect and error responses.
//!
//! A bucket that does not exist resolves to [`BucketRegion::Missing`] and is
//! cached like any other answer.

use aws_sdk_s3::config::Region;
use std::fmt;
use tracing::{debug, warn};

use super::client_pool::ClientPool;
use super::error::{S3Error, S3Result};
use super::single_flight::SingleFlight;
use super::transport::S3Transport;
use super::LEGACY_DEFAULT_REGION;

/// Location constraint returned for buckets created in the old `EU` region
const LEGACY_EU_CONSTRAINT: &str = "EU";

/// Region the `EU` constraint stands for
const LEGACY_EU_REGION: &str = "eu-west-1";

/// Resolved location of a bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketRegion {
    Located(Region),
    /// The bucket does not exist
    Missing,
}

impl BucketRegion {
    pub fn region(&self) -> Option<&Region> {
        match self {
            BucketRegion::Located(region) => Some(region),
            BucketRegion::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, BucketRegion::Missing)
    }
}

/// Map a `GetBucketLocation` answer to a region name.
///
/// S3 returns no constraint for buckets in `us-east-1`.
pub fn region_from_location_constraint(constraint: Option<&str>) -> String {
    match constraint.map(str::trim) {
        None | Some("") => LEGACY_DEFAULT_REGION.to_string(),
        Some(LEGACY_EU_CONSTRAINT) => LEGACY_EU_REGION.to_string(),
        Some(region) => region.to_string(),
    }
}

/// Outcome of a `HeadBucket` existence probe
#[derive(Debug)]
pub(crate) enum ExistenceProbe {
    /// The bucket exists; region is known if the service reported it
    Exists(Option<String>),
    Missing,
    Failed(S3Error),
}

/// Probe a bucket with `HeadBucket`, reading the region header from both
/// successful and failed responses.
pub(crate) async fn probe_bucket(client: &dyn S3Transport, bucket: &str) -> ExistenceProbe {
    match client.head_bucket(bucket).await {
        Ok(outcome) => ExistenceProbe::Exists(outcome.bucket_region.filter(|r| !r.is_empty())),
        Err(e) if e.is_not_found() => ExistenceProbe::Missing,
        Err(e) => match e.bucket_region() {
            Some(region) => ExistenceProbe::Exists(Some(region.to_string())),
            None => ExistenceProbe::Failed(e),
        },
    }
}

/// Memoized bucket to region map
pub struct RegionCache {
    regions: SingleFlight<String, BucketRegion>,
}

impl RegionCache {
    pub fn new() -> Self {
        Self {
            regions: SingleFlight::new(),
        }
    }

    /// Cached answer for `bucket`, without touching the network
    pub fn cached(&self, bucket: &str) -> Option<BucketRegion> {
        self.regions.get(&bucket.to_string())
    }

    /// Number of buckets resolved so far
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Resolve the region of `bucket`
    pub async fn resolve(&self, bucket: &str, pool: &ClientPool) -> S3Result<BucketRegion> {
        let key = bucket.to_string();
        if let Some(region) = self.regions.get(&key) {
            return Ok(region);
        }

        self.regions
            .get_or_try_init(&key, || async {
                let resolved = resolve_uncached(bucket, pool).await?;
                debug!(bucket, region = ?resolved, "Resolved bucket region");
                Ok(resolved)
            })
            .await
    }
}

impl Default for RegionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RegionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionCache")
            .field("resolved", &self.regions.len())
            .finish()
    }
}

async fn resolve_uncached(bucket: &str, pool: &ClientPool) -> S3Result<BucketRegion> {
    let path_style = pool.path_style_client()?;

    let tier1_error = match path_style.get_bucket_location(bucket).await {
        Ok(constraint) => {
            let region = region_from_location_constraint(constraint.as_deref());
            return Ok(BucketRegion::Located(Region::new(region)));
        }
        Err(e) if e.is_not_found() => return Ok(BucketRegion::Missing),
        Err(e) if e.is_access_denied() => e,
        Err(e) => return Err(e),
    };

    warn!(
        bucket,
        "GetBucketLocation denied, falling back to HeadBucket region probe"
    );

    let default_client = pool.default_client().await?;
    match probe_bucket(default_client.as_ref(), bucket).await {
        ExistenceProbe::Exists(Some(region)) => Ok(BucketRegion::Located(Region::new(region))),
        ExistenceProbe::Missing => Ok(BucketRegion::Missing),
        ExistenceProbe::Exists(None) | ExistenceProbe::Failed(_) => {
            Err(S3Error::RegionResolution {
                bucket: bucket.to_string(),
                source: Box::new(tier1_error),
            })
        }
    }
}
