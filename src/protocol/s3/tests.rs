//! Live tests against AWS S3
//!
//! These tests require real credentials and buckets in at least two regions.
//! Set the following environment variables to run them:
//!
//! - `S3_TESTS_ENABLED`: Set to "1" to enable live tests
//! - `S3_TEST_REGION`: Default region of the connection (default: us-east-1)
//! - `S3_TEST_BUCKET`: Bucket in any region, writable by the test credentials
//! - `S3_TEST_ROLE_ACCOUNT` / `S3_TEST_ROLE_NAME`: Optional role to assume
//! - `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`: Optional, uses the default chain if not set

use super::*;
use std::env;
use std::sync::Arc;

/// Check if live tests should run
fn s3_tests_enabled() -> bool {
    env::var("S3_TESTS_ENABLED").unwrap_or_default() == "1"
}

fn test_bucket() -> String {
    env::var("S3_TEST_BUCKET").unwrap_or_else(|_| "orbit-test-bucket".to_string())
}

/// Get test configuration from environment
fn get_test_config() -> ConnectionConfig {
    let mut config = ConnectionConfig::new(
        env::var("S3_TEST_REGION").unwrap_or_else(|_| LEGACY_DEFAULT_REGION.to_string()),
    );

    if let (Ok(access_key_id), Ok(secret)) = (
        env::var("AWS_ACCESS_KEY_ID"),
        env::var("AWS_SECRET_ACCESS_KEY"),
    ) {
        config.auth = AuthMode::Static {
            access_key_id,
            secret,
        };
    }

    if let (Ok(account), Ok(role)) = (
        env::var("S3_TEST_ROLE_ACCOUNT"),
        env::var("S3_TEST_ROLE_NAME"),
    ) {
        config.assume_role = Some(AssumeRoleConfig::new(account, role));
    }

    config
}

async fn connect() -> MultiRegionClient {
    MultiRegionClient::connect(get_test_config(), Arc::new(PlaintextSecrets))
        .await
        .expect("Failed to connect")
}

#[tokio::test]
#[ignore]
async fn test_resolve_region() {
    if !s3_tests_enabled() {
        println!("Skipping S3 live test - set S3_TESTS_ENABLED=1 to run");
        return;
    }

    let client = connect().await;
    let region = client
        .region_for(&test_bucket())
        .await
        .expect("Failed to resolve region");
    assert!(region.region().is_some());

    client.close();
}

#[tokio::test]
#[ignore]
async fn test_put_get_delete() {
    if !s3_tests_enabled() {
        return;
    }

    let client = connect().await;
    let bucket = test_bucket();
    let key = "orbit-s3-router/test/small-file.txt";

    client
        .put_object(PutObjectRequest::new(&bucket, key, "Hello, S3!"))
        .await
        .expect("Failed to upload");

    assert!(client
        .object_exists(&bucket, key)
        .await
        .expect("Failed to check existence"));

    let body = client
        .get_object(&bucket, key)
        .await
        .expect("Failed to download")
        .into_bytes()
        .await
        .expect("Failed to read body");
    assert_eq!(&body[..], b"Hello, S3!");

    client
        .delete_object(&bucket, key)
        .await
        .expect("Failed to delete");
    assert!(!client.object_exists(&bucket, key).await.unwrap());

    client.close();
}

#[tokio::test]
#[ignore]
async fn test_missing_bucket() {
    if !s3_tests_enabled() {
        return;
    }

    let client = connect().await;
    let bucket = "orbit-s3-router-bucket-that-does-not-exist-7f3a";

    assert!(client.get_bucket(bucket).await.unwrap().is_none());
    assert!(!client.object_exists(bucket, "any-key").await.unwrap());
    assert!(matches!(
        client.presigner(bucket).await,
        Err(S3Error::BucketNotFound(_))
    ));

    client.close();
}

#[tokio::test]
#[ignore]
async fn test_presign_get() {
    if !s3_tests_enabled() {
        return;
    }

    let client = connect().await;
    let presigner = client
        .presigner(&test_bucket())
        .await
        .expect("Failed to build presigner");

    let url = presigner
        .presign_get("orbit-s3-router/test/any.txt", DEFAULT_PRESIGN_EXPIRY)
        .await
        .expect("Failed to presign");
    assert!(url.url.contains("X-Amz-Signature"));
    assert_eq!(url.method, "GET");

    client.close();
}
