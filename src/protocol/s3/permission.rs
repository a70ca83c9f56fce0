//! One-shot check for the `s3:ListAllMyBuckets` permission

use tracing::info;

use super::error::S3Result;
use super::transport::S3Transport;

/// Whether the caller may enumerate all buckets.
///
/// A denied listing is a supported configuration and yields `false`; any
/// other failure is returned as an error.
pub async fn probe_list_permission(client: &dyn S3Transport) -> S3Result<bool> {
    match client.list_buckets().await {
        Ok(_) => Ok(true),
        Err(e) if e.is_access_denied() => {
            info!("ListAllMyBuckets denied, using existence probes for bucket lookups");
            Ok(false)
        }
        Err(e) => Err(e.context("Failed to probe bucket listing permission")),
    }
}
