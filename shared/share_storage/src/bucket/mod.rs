//! S3 bucket operations for published files

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

mod error;
mod multipart;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use aws_sdk_s3::{
    error::SdkError, operation::head_object::HeadObjectError, primitives::ByteStream,
    Client as S3Client,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

pub use error::{BucketError, BucketResult};
pub use multipart::{part_ranges, MAX_CONCURRENT_PARTS};

use crate::{
    classifier::ContentClassifier,
    key::{file_extension, ObjectKeyGenerator},
};

/// Default multipart part size, also the threshold above which uploads are chunked
pub const DEFAULT_PART_SIZE: usize = 10 * 1024 * 1024;

/// Fresh keys tried before giving up on a collision
const MAX_KEY_ATTEMPTS: usize = 3;

/// An object currently stored in the bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageObject {
    /// Object key
    pub key: String,
    /// Last modification time reported by the store
    pub last_modified: DateTime<Utc>,
}

/// A file prepared for transfer
#[derive(Debug, Clone)]
pub struct UploadTask {
    /// File the payload was read from
    pub source_path: PathBuf,
    /// Key the payload will be stored under
    pub object_key: String,
    /// Resolved MIME type
    pub content_type: String,
    /// Whole file contents
    pub payload: Bytes,
}

/// Outcome of a delete request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The object existed and was removed
    Deleted,
    /// There was nothing to delete
    AlreadyAbsent,
}

/// Gateway to the bucket holding published files
pub struct BucketStorage {
    s3_client: Arc<S3Client>,
    bucket_name: String,
    domain: String,
    keys: ObjectKeyGenerator,
    classifier: ContentClassifier,
    part_size: usize,
}

impl BucketStorage {
    /// Creates a new bucket storage client
    ///
    /// # Arguments
    ///
    /// * `s3_client` - Pre-configured S3 client, shared with other callers
    /// * `bucket_name` - Bucket holding published files
    /// * `domain` - Public base URL the bucket is served from
    /// * `keys` - Generator for the keys of new uploads
    #[must_use]
    pub fn new(
        s3_client: Arc<S3Client>,
        bucket_name: String,
        domain: &str,
        keys: ObjectKeyGenerator,
    ) -> Self {
        Self {
            s3_client,
            bucket_name,
            domain: domain.trim_end_matches('/').to_string(),
            keys,
            classifier: ContentClassifier::default(),
            part_size: DEFAULT_PART_SIZE,
        }
    }

    /// Replaces the content classifier
    #[must_use]
    pub fn with_classifier(mut self, classifier: ContentClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Sets the multipart part size; payloads larger than this are chunked
    #[must_use]
    pub fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size.max(1);
        self
    }

    /// Bucket this gateway operates on
    #[must_use]
    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// Prefix all published keys live under
    #[must_use]
    pub fn key_prefix(&self) -> &str {
        self.keys.prefix()
    }

    /// Content classifier used for uploads
    #[must_use]
    pub const fn classifier(&self) -> &ContentClassifier {
        &self.classifier
    }

    /// Public URL of `key`
    #[must_use]
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.domain)
    }

    /// Maps a public URL back to its object key
    ///
    /// The configured domain and any leading `/` are stripped; URLs on other
    /// domains are returned as they are.
    #[must_use]
    pub fn key_from_url<'a>(&self, url: &'a str) -> &'a str {
        url.strip_prefix(self.domain.as_str())
            .unwrap_or(url)
            .trim_start_matches('/')
    }

    /// Uploads a local file and returns its public URL
    ///
    /// The whole file is buffered in memory. Payloads larger than the part size
    /// are sent as a multipart upload.
    ///
    /// # Errors
    ///
    /// Returns `BucketError::Read` if the file cannot be read
    /// Returns a transport error if any S3 operation fails
    /// Returns `BucketError::ObjectExists` if no free key could be found
    pub async fn upload(&self, source_path: &Path) -> BucketResult<String> {
        let task = self.prepare(source_path).await?;
        let url = self.public_url(&task.object_key);

        self.transfer(task).await?;

        info!("Uploaded file '{}' to '{url}'", source_path.display());
        Ok(url)
    }

    async fn prepare(&self, source_path: &Path) -> BucketResult<UploadTask> {
        let payload = tokio::fs::read(source_path)
            .await
            .map_err(|source| BucketError::Read {
                path: source_path.to_path_buf(),
                source,
            })?;

        let file_name = source_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = self.classifier.classify(&payload, &file_name);
        let object_key = self.reserve_key(file_extension(&file_name)).await?;

        Ok(UploadTask {
            source_path: source_path.to_path_buf(),
            object_key,
            content_type,
            payload: Bytes::from(payload),
        })
    }

    /// Draws a key that is not yet taken in the bucket
    async fn reserve_key(&self, extension: &str) -> BucketResult<String> {
        for _ in 0..MAX_KEY_ATTEMPTS {
            let key = self.keys.new_key(extension);
            if !self.check_object_exists(&key).await? {
                return Ok(key);
            }
            warn!("Generated key {key} is already taken, drawing another");
        }

        Err(BucketError::ObjectExists(format!(
            "no free key under '{}' after {MAX_KEY_ATTEMPTS} attempts",
            self.keys.prefix()
        )))
    }

    async fn transfer(&self, task: UploadTask) -> BucketResult<()> {
        let result = if task.payload.len() > self.part_size {
            self.upload_multipart(&task).await
        } else {
            self.put_single(&task).await
        };

        if let Err(e) = &result {
            error!(
                "Couldn't upload '{}' to {}:{}: {e}",
                task.source_path.display(),
                self.bucket_name,
                task.object_key
            );
        }

        result
    }

    async fn put_single(&self, task: &UploadTask) -> BucketResult<()> {
        self.s3_client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&task.object_key)
            .content_type(&task.content_type)
            .body(ByteStream::from(task.payload.clone()))
            .send()
            .await?;

        Ok(())
    }

    /// Checks if an object exists in the bucket
    ///
    /// # Returns
    ///
    /// * `Ok(true)` if object exists
    /// * `Ok(false)` if object does not exist
    /// * `Err(BucketError)` if S3 operation fails
    ///
    /// # Errors
    ///
    /// Returns `BucketError::S3Error` for S3 service errors
    /// Returns `BucketError::UpstreamError` for 5xx errors
    pub async fn check_object_exists(&self, key: &str) -> BucketResult<bool> {
        let result = self
            .s3_client
            .head_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(service_err))
                if matches!(service_err.err(), HeadObjectError::NotFound(_)) =>
            {
                Ok(false)
            }
            Err(e) => {
                let err = BucketError::from(e);
                error!(
                    "Failed to check object existence for {}:{key}: {err}",
                    self.bucket_name
                );
                Err(err)
            }
        }
    }

    /// Lists objects under `prefix`, most recently modified first
    ///
    /// All result pages are fetched. Objects with equal modification times are
    /// ordered by key.
    ///
    /// # Errors
    ///
    /// Returns a transport error if listing fails
    pub async fn list(&self, prefix: &str) -> BucketResult<Vec<StorageObject>> {
        let mut pages = self
            .s3_client
            .list_objects_v2()
            .bucket(&self.bucket_name)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut objects = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                let err = BucketError::from(e);
                error!(
                    "Unable to list items in bucket {} with prefix '{prefix}': {err}",
                    self.bucket_name
                );
                err
            })?;

            objects.extend(page.contents().iter().filter_map(|object| {
                let key = object.key()?.to_string();
                let last_modified = object
                    .last_modified()
                    .and_then(|ts| DateTime::from_timestamp(ts.secs(), ts.subsec_nanos()))
                    .unwrap_or_default();
                Some(StorageObject { key, last_modified })
            }));
        }

        sort_most_recent_first(&mut objects);
        info!(
            "Listed {} items from '{}/{prefix}'",
            objects.len(),
            self.bucket_name
        );

        Ok(objects)
    }

    /// Deletes the object stored under `key`
    ///
    /// Deleting a key that does not exist is not an error; it is logged and
    /// reported as `DeleteOutcome::AlreadyAbsent`.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the existence check or the delete fails
    pub async fn delete(&self, key: &str) -> BucketResult<DeleteOutcome> {
        if !self.check_object_exists(key).await? {
            warn!(
                "Object {key} is not in bucket {}, nothing to delete",
                self.bucket_name
            );
            return Ok(DeleteOutcome::AlreadyAbsent);
        }

        self.s3_client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let err = BucketError::from(e);
                error!("Couldn't delete object {}:{key}: {err}", self.bucket_name);
                err
            })?;

        info!("Deleted {key} from {}", self.bucket_name);
        Ok(DeleteOutcome::Deleted)
    }
}

fn sort_most_recent_first(objects: &mut [StorageObject]) {
    objects.sort_by(|a, b| {
        b.last_modified
            .cmp(&a.last_modified)
            .then_with(|| a.key.cmp(&b.key))
    });
}
