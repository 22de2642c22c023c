//! Test doubles for the dispatcher and the control surface

// Not every double is used in every test file
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response, Router};
use chrono::{DateTime, TimeZone, Utc};
use cloudshare::server::{self, Catalog};
use cloudshare::worker::{PublishSink, SinkError, Uploader};
use http_body_util::BodyExt;
use share_storage::{
    BucketError, BucketResult, ContentClassifier, DeleteOutcome, StorageObject,
};
use tower::ServiceExt;

pub const TEST_DOMAIN: &str = "https://cdn.example.com";
pub const TEST_PREFIX: &str = "shots";

/// Uploader that records every call and fails on demand
#[derive(Default)]
pub struct FakeUploader {
    calls: Mutex<Vec<PathBuf>>,
    /// Remaining failures per file name
    failures: Mutex<HashMap<String, u32>>,
}

impl FakeUploader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes the next `times` uploads of `name` fail
    pub fn fail(self: &Arc<Self>, name: &str, times: u32) -> Arc<Self> {
        self.failures
            .lock()
            .unwrap()
            .insert(name.to_string(), times);
        self.clone()
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Uploader for FakeUploader {
    async fn upload(&self, source_path: &Path) -> BucketResult<String> {
        self.calls.lock().unwrap().push(source_path.to_path_buf());

        let name = source_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();

        if let Some(remaining) = self.failures.lock().unwrap().get_mut(&name) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(BucketError::UpstreamError(format!("{name}: 503")));
            }
        }

        Ok(format!("{TEST_DOMAIN}/{TEST_PREFIX}/{name}"))
    }
}

/// Sink that records published URLs
#[derive(Default)]
pub struct RecordingSink {
    urls: Mutex<Vec<String>>,
    failing: bool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A sink that records and then fails every publish
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            urls: Mutex::default(),
            failing: true,
        })
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PublishSink for RecordingSink {
    async fn publish(&self, url: &str) -> Result<(), SinkError> {
        self.urls.lock().unwrap().push(url.to_string());
        if self.failing {
            return Err(SinkError::Clipboard(arboard::Error::ClipboardNotSupported));
        }
        Ok(())
    }
}

/// Catalog backed by a vector of objects
pub struct InMemoryCatalog {
    objects: Mutex<Vec<StorageObject>>,
    classifier: ContentClassifier,
    list_error: Mutex<Option<BucketError>>,
}

impl InMemoryCatalog {
    pub fn new(objects: Vec<StorageObject>) -> Arc<Self> {
        Arc::new(Self {
            objects: Mutex::new(objects),
            classifier: ContentClassifier::default(),
            list_error: Mutex::new(None),
        })
    }

    /// Makes the next `list` call fail with `error`
    pub fn fail_next_list(&self, error: BucketError) {
        *self.list_error.lock().unwrap() = Some(error);
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .map(|object| object.key.clone())
            .collect()
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn list(&self, prefix: &str) -> BucketResult<Vec<StorageObject>> {
        if let Some(error) = self.list_error.lock().unwrap().take() {
            return Err(error);
        }

        let mut objects: Vec<StorageObject> = self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|object| object.key.starts_with(prefix))
            .cloned()
            .collect();
        objects.sort_by(|a, b| {
            b.last_modified
                .cmp(&a.last_modified)
                .then_with(|| a.key.cmp(&b.key))
        });
        Ok(objects)
    }

    async fn delete(&self, key: &str) -> BucketResult<DeleteOutcome> {
        let mut objects = self.objects.lock().unwrap();
        let before = objects.len();
        objects.retain(|object| object.key != key);

        if objects.len() == before {
            Ok(DeleteOutcome::AlreadyAbsent)
        } else {
            Ok(DeleteOutcome::Deleted)
        }
    }

    fn key_prefix(&self) -> &str {
        TEST_PREFIX
    }

    fn public_url(&self, key: &str) -> String {
        format!("{TEST_DOMAIN}/{key}")
    }

    fn key_from_url<'a>(&self, url: &'a str) -> &'a str {
        url.strip_prefix(TEST_DOMAIN)
            .unwrap_or(url)
            .trim_start_matches('/')
    }

    fn classifier(&self) -> &ContentClassifier {
        &self.classifier
    }
}

/// Object under the test prefix modified `secs` seconds after the epoch
pub fn object(name: &str, secs: i64) -> StorageObject {
    let last_modified: DateTime<Utc> = Utc.timestamp_opt(secs, 0).unwrap();
    StorageObject {
        key: format!("{TEST_PREFIX}/{name}"),
        last_modified,
    }
}

/// Router over `catalog`
pub fn test_router(catalog: &Arc<InMemoryCatalog>) -> Router {
    server::router(catalog.clone())
}

pub async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn body_string(response: Response) -> String {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(body.to_vec()).unwrap()
}
