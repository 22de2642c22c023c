//! Bucket test setup utilities

#![allow(dead_code)]

use std::sync::Arc;

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::Client as S3Client;
use share_storage::{BucketStorage, ObjectKeyGenerator};
use uuid::Uuid;

pub const TEST_DOMAIN: &str = "https://cdn.example.com";
pub const TEST_PREFIX: &str = "shots";

/// Test context that provides an S3 client and a throwaway bucket
pub struct BucketTestContext {
    pub s3_client: Arc<S3Client>,
    pub bucket_name: String,
}

impl BucketTestContext {
    /// Creates a new test context with a unique bucket on LocalStack
    pub async fn new(test_name: &str) -> Self {
        let bucket_name = format!("{test_name}-{}", Uuid::new_v4());

        // Setup LocalStack client with hardcoded credentials for CI
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("test", "test", None, None, "localstack"))
            .endpoint_url("http://localhost:4566")
            .force_path_style(true)
            .build();

        let s3_client = Arc::new(S3Client::from_conf(config));

        s3_client
            .create_bucket()
            .bucket(&bucket_name)
            .send()
            .await
            .expect("Failed to create test bucket");

        Self {
            s3_client,
            bucket_name,
        }
    }

    /// Storage gateway bound to the test bucket
    pub fn storage(&self) -> BucketStorage {
        BucketStorage::new(
            self.s3_client.clone(),
            self.bucket_name.clone(),
            TEST_DOMAIN,
            ObjectKeyGenerator::new(TEST_PREFIX),
        )
    }

    /// Reads an object back in full
    pub async fn read_object(&self, key: &str) -> (Vec<u8>, Option<String>) {
        let output = self
            .s3_client
            .get_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .expect("Failed to get object");

        let content_type = output.content_type().map(ToString::to_string);
        let body = output
            .body
            .collect()
            .await
            .expect("Failed to read object body")
            .into_bytes()
            .to_vec();

        (body, content_type)
    }

    /// Entity tag of a stored object, without quotes
    ///
    /// Multipart objects carry a `-<part count>` suffix.
    pub async fn etag(&self, key: &str) -> String {
        self.s3_client
            .head_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .expect("Failed to head object")
            .e_tag()
            .unwrap_or_default()
            .trim_matches('"')
            .to_string()
    }

    /// Key of a public URL produced by the test gateway
    pub fn key_of(url: &str) -> &str {
        url.strip_prefix(TEST_DOMAIN)
            .expect("URL should be on the test domain")
            .trim_start_matches('/')
    }
}

impl Drop for BucketTestContext {
    fn drop(&mut self) {
        // Clean up the bucket
        let client = self.s3_client.clone();
        let bucket_name = self.bucket_name.clone();

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Ok(listing) = client.list_objects_v2().bucket(&bucket_name).send().await {
                    for object in listing.contents() {
                        if let Some(key) = object.key() {
                            let _ = client
                                .delete_object()
                                .bucket(&bucket_name)
                                .key(key)
                                .send()
                                .await;
                        }
                    }
                }
                let _ = client.delete_bucket().bucket(&bucket_name).send().await;
            });
        }
    }
}

/// Writes `payload` to `name` inside a fresh temporary directory
pub fn write_temp_file(name: &str, payload: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join(name);
    std::fs::write(&path, payload).expect("Failed to write temp file");
    (dir, path)
}

/// A minimal PNG header followed by filler bytes
pub fn png_payload(len: usize) -> Vec<u8> {
    let mut payload = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR".to_vec();
    payload.resize(len.max(payload.len()), 0);
    payload
}
