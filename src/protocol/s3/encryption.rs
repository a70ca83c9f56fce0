//! Server-side-encryption parameters for write requests

use super::config::{EncryptionSettings, SseMode};
use super::types::{EncryptableRequest, S3ServerSideEncryption};

/// Encryption parameters implied by the settings, or `None` if writes go out unencrypted
pub fn server_side_encryption_for(settings: &EncryptionSettings) -> Option<S3ServerSideEncryption> {
    if !settings.enabled {
        return None;
    }

    match settings.mode {
        SseMode::None => None,
        SseMode::Sse => Some(S3ServerSideEncryption::Aes256),
        SseMode::Kms => Some(S3ServerSideEncryption::AwsKms {
            // An empty id defers to the account's default key
            key_id: settings
                .kms_key_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string),
        }),
    }
}

/// Attach the configured encryption parameters to a put, copy or presigned put
pub fn apply_server_side_encryption<R: EncryptableRequest>(
    request: &mut R,
    settings: &EncryptionSettings,
) {
    if let Some(sse) = server_side_encryption_for(settings) {
        request.set_server_side_encryption(sse);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::s3::types::{CopyObjectRequest, PutObjectRequest};

    #[test]
    fn test_disabled_attaches_nothing() {
        let mut settings = EncryptionSettings::kms(Some("key-1".to_string()));
        settings.enabled = false;

        let mut request = PutObjectRequest::new("b", "k", "data");
        apply_server_side_encryption(&mut request, &settings);
        assert!(request.server_side_encryption().is_none());
    }

    #[test]
    fn test_sse_attaches_marker_only() {
        let mut request = CopyObjectRequest::new("a", "x", "b", "y");
        apply_server_side_encryption(&mut request, &EncryptionSettings::sse());
        assert_eq!(
            request.server_side_encryption(),
            Some(&S3ServerSideEncryption::Aes256)
        );
    }

    #[test]
    fn test_kms_with_key_attaches_both() {
        let mut request = PutObjectRequest::new("b", "k", "data");
        apply_server_side_encryption(
            &mut request,
            &EncryptionSettings::kms(Some("arn:aws:kms:us-east-1:111111111111:key/abc".to_string())),
        );
        let sse = request.server_side_encryption().unwrap();
        assert_eq!(sse.to_aws(), aws_sdk_s3::types::ServerSideEncryption::AwsKms);
        assert_eq!(
            sse.kms_key_id(),
            Some("arn:aws:kms:us-east-1:111111111111:key/abc")
        );
    }

    #[test]
    fn test_kms_with_empty_key_attaches_marker_only() {
        for key in [None, Some(String::new()), Some("  ".to_string())] {
            let mut request = PutObjectRequest::new("b", "k", "data");
            apply_server_side_encryption(&mut request, &EncryptionSettings::kms(key));
            assert_eq!(
                request.server_side_encryption(),
                Some(&S3ServerSideEncryption::AwsKms { key_id: None })
            );
        }
    }

    #[test]
    fn test_enabled_without_mode_attaches_nothing() {
        let settings = EncryptionSettings {
            enabled: true,
            mode: SseMode::None,
            kms_key_id: None,
        };
        assert_eq!(server_side_encryption_for(&settings), None);
    }
}
