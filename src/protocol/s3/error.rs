//! Error types for multi-region S3 routing

use aws_credential_types::provider::error::CredentialsError;
use std::error::Error as StdError;
use std::io;
use thiserror::Error;

use super::BUCKET_REGION_HEADER;

/// Result type alias for S3 operations
pub type S3Result<T> = Result<T, S3Error>;

/// Errors that can occur while routing S3 operations
#[derive(Error, Debug, Clone)]
pub enum S3Error {
    /// AWS SDK error that could not be classified further
    #[error("AWS SDK error: {0}")]
    Sdk(String),

    /// S3 service error with specific error code
    #[error("S3 service error ({code}): {message}")]
    Service {
        code: String,
        message: String,
        status: Option<u16>,
        bucket_region: Option<String>,
    },

    /// Object not found in bucket
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Bucket does not exist
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    /// Access denied (HTTP 403)
    #[error("Access denied: {message}")]
    AccessDenied {
        message: String,
        bucket_region: Option<String>,
    },

    /// The bucket lives in another region (HTTP 301/307)
    #[error("Bucket {bucket} must be addressed in region {}", .region.as_deref().unwrap_or("<unknown>"))]
    Redirect {
        bucket: String,
        region: Option<String>,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Secret decryption or role assumption failed
    #[error("Credential error: {0}")]
    Credential(String),

    /// The region of a bucket could not be determined
    #[error("Unable to determine region of bucket {bucket}: {source}")]
    RegionResolution {
        bucket: String,
        source: Box<S3Error>,
    },

    /// Request presigning failed
    #[error("Presign error: {0}")]
    Presign(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// The client has been closed
    #[error("S3 client has been closed")]
    Closed,

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        source: Box<S3Error>,
    },
}

impl S3Error {
    /// Add context to an error
    pub fn context<S: Into<String>>(self, context: S) -> Self {
        S3Error::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an error from AWS SDK error
    pub fn from_sdk<E: std::error::Error>(error: E) -> Self {
        S3Error::Sdk(error.to_string())
    }

    /// True if the bucket or key does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            S3Error::NotFound { .. } | S3Error::BucketNotFound(_) => true,
            S3Error::WithContext { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// True if the bucket itself does not exist
    pub fn is_bucket_not_found(&self) -> bool {
        match self {
            S3Error::BucketNotFound(_) => true,
            S3Error::WithContext { source, .. } => source.is_bucket_not_found(),
            _ => false,
        }
    }

    /// True for authorization failures (HTTP 403)
    pub fn is_access_denied(&self) -> bool {
        match self {
            S3Error::AccessDenied { .. } => true,
            S3Error::Service { status, .. } => *status == Some(403),
            S3Error::WithContext { source, .. } => source.is_access_denied(),
            _ => false,
        }
    }

    /// Region reported by the service through the `x-amz-bucket-region` header, if any
    pub fn bucket_region(&self) -> Option<&str> {
        let region = match self {
            S3Error::AccessDenied { bucket_region, .. } => bucket_region.as_deref(),
            S3Error::Service { bucket_region, .. } => bucket_region.as_deref(),
            S3Error::Redirect { region, .. } => region.as_deref(),
            S3Error::WithContext { source, .. } => source.bucket_region(),
            _ => None,
        };
        region.filter(|r| !r.is_empty())
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            S3Error::Network(_) => true,
            S3Error::Timeout(_) => true,
            S3Error::RateLimitExceeded(_) => true,
            S3Error::Io(_) => true,
            // Fatal by definition
            S3Error::Credential(_) | S3Error::RegionResolution { .. } => false,
            S3Error::Sdk(msg) => {
                let lower = msg.to_lowercase();
                lower.contains("connection reset")
                    || lower.contains("connection timed out")
                    || lower.contains("broken pipe")
                    || lower.contains("connection refused")
                    || lower.contains("temporarily unavailable")
            }
            S3Error::Service { code, .. } => is_retryable_code(code),
            S3Error::WithContext { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

impl From<io::Error> for S3Error {
    fn from(err: io::Error) -> Self {
        S3Error::Io(err.to_string())
    }
}

/// Check if an AWS error code is retryable
pub(crate) fn is_retryable_code(code: &str) -> bool {
    matches!(
        code,
        "RequestTimeout"
            | "ServiceUnavailable"
            | "InternalError"
            | "SlowDown"
            | "RequestTimeTooSkewed"
    )
}

/// What a failed request was addressing, used to build not-found errors
#[derive(Debug, Clone, Copy)]
pub(crate) struct ErrorTarget<'a> {
    pub bucket: &'a str,
    pub key: Option<&'a str>,
}

impl<'a> ErrorTarget<'a> {
    pub fn bucket(bucket: &'a str) -> Self {
        Self { bucket, key: None }
    }

    pub fn object(bucket: &'a str, key: &'a str) -> Self {
        Self {
            bucket,
            key: Some(key),
        }
    }

    pub fn none() -> Self {
        Self {
            bucket: "",
            key: None,
        }
    }
}

/// Classify a service response into an [`S3Error`].
///
/// `code` is the S3 error code, `status` the HTTP status and `bucket_region`
/// the value of the `x-amz-bucket-region` header when the response carried one.
pub(crate) fn classify_service_error(
    target: ErrorTarget<'_>,
    code: Option<&str>,
    message: Option<&str>,
    status: Option<u16>,
    bucket_region: Option<String>,
) -> S3Error {
    let message = message.unwrap_or_default().to_string();
    match (code, status) {
        (Some("NoSuchBucket"), _) => S3Error::BucketNotFound(target.bucket.to_string()),
        (Some("NoSuchKey"), _) => S3Error::NotFound {
            bucket: target.bucket.to_string(),
            key: target.key.unwrap_or_default().to_string(),
        },
        // HEAD responses have no body, so a bare 404 is all we get
        (Some("NotFound"), _) | (None, Some(404)) => match target.key {
            Some(key) => S3Error::NotFound {
                bucket: target.bucket.to_string(),
                key: key.to_string(),
            },
            None => S3Error::BucketNotFound(target.bucket.to_string()),
        },
        (Some("PermanentRedirect" | "TemporaryRedirect" | "AuthorizationHeaderMalformed"), _)
        | (_, Some(301 | 307)) => S3Error::Redirect {
            bucket: target.bucket.to_string(),
            region: bucket_region,
        },
        (Some("AccessDenied" | "Forbidden" | "AllAccessDisabled"), _) | (_, Some(403)) => {
            S3Error::AccessDenied {
                message: if message.is_empty() {
                    format!("access denied to {}", target.bucket)
                } else {
                    message
                },
                bucket_region,
            }
        }
        (Some("SlowDown" | "Throttling" | "TooManyRequests"), _) | (_, Some(429)) => {
            S3Error::RateLimitExceeded(message)
        }
        (code, status) => S3Error::Service {
            code: code.unwrap_or("Unknown").to_string(),
            message,
            status,
            bucket_region,
        },
    }
}

/// Find a credential provider failure anywhere in an error's source chain
pub(crate) fn credential_failure(error: &(dyn StdError + 'static)) -> Option<String> {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(cause) = err.downcast_ref::<CredentialsError>() {
            let detail = cause
                .source()
                .map(|s| format!("{}: {}", cause, s))
                .unwrap_or_else(|| cause.to_string());
            return Some(detail);
        }
        current = err.source();
    }
    None
}

/// Convert AWS SDK errors to S3Error
pub(crate) fn from_sdk_error<E>(
    target: ErrorTarget<'_>,
    error: aws_sdk_s3::error::SdkError<E>,
) -> S3Error
where
    E: aws_sdk_s3::error::ProvideErrorMetadata + std::error::Error + 'static,
{
    use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};

    // Credential resolution, role assumption included, fails before dispatch
    if matches!(
        error,
        SdkError::DispatchFailure(_) | SdkError::ConstructionFailure(_)
    ) {
        if let Some(detail) = credential_failure(&error) {
            return S3Error::Credential(detail);
        }
    }

    match &error {
        SdkError::DispatchFailure(e) => {
            if e.is_timeout() {
                S3Error::Timeout(format!("{:?}", e))
            } else {
                S3Error::Network(format!("Network dispatch failure: {:?}", e))
            }
        }
        SdkError::TimeoutError(_) => S3Error::Timeout(format!("{}", error)),
        SdkError::ResponseError(e) => S3Error::Network(format!("Response error: {:?}", e)),
        SdkError::ServiceError(ctx) => {
            let raw = ctx.raw();
            let status = raw.status().as_u16();
            let bucket_region = raw
                .headers()
                .get(BUCKET_REGION_HEADER)
                .map(|v| v.to_string());
            classify_service_error(
                target,
                error.code(),
                error.message(),
                Some(status),
                bucket_region,
            )
        }
        _ => S3Error::Sdk(format!("{:?}", error)),
    }
}
