//! Read and delete access to published objects

use async_trait::async_trait;
use share_storage::{
    BucketResult, BucketStorage, ContentClassifier, DeleteOutcome, StorageObject,
};

/// Objects the control surface can list and delete
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Objects under `prefix`, most recent first
    async fn list(&self, prefix: &str) -> BucketResult<Vec<StorageObject>>;

    /// Deletes `key`
    async fn delete(&self, key: &str) -> BucketResult<DeleteOutcome>;

    /// Prefix that all published objects share
    fn key_prefix(&self) -> &str;

    /// Public URL of `key`
    fn public_url(&self, key: &str) -> String;

    /// Object key behind a public URL
    fn key_from_url<'a>(&self, url: &'a str) -> &'a str;

    /// Classifier used to tell images from videos
    fn classifier(&self) -> &ContentClassifier;
}

#[async_trait]
impl Catalog for BucketStorage {
    async fn list(&self, prefix: &str) -> BucketResult<Vec<StorageObject>> {
        Self::list(self, prefix).await
    }

    async fn delete(&self, key: &str) -> BucketResult<DeleteOutcome> {
        Self::delete(self, key).await
    }

    fn key_prefix(&self) -> &str {
        Self::key_prefix(self)
    }

    fn public_url(&self, key: &str) -> String {
        Self::public_url(self, key)
    }

    fn key_from_url<'a>(&self, url: &'a str) -> &'a str {
        Self::key_from_url(self, url)
    }

    fn classifier(&self) -> &ContentClassifier {
        Self::classifier(self)
    }
}

/// A published object as shown on the index page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedLink {
    /// Public URL
    pub url: String,
    /// Rendered with an inline image preview
    pub is_image: bool,
    /// Rendered with an inline video player
    pub is_video: bool,
}

impl PublishedLink {
    /// Builds the link for `key`, judging its media kind by extension
    #[must_use]
    pub fn new(catalog: &dyn Catalog, key: &str) -> Self {
        let media_type = catalog.classifier().media_type_for(key);

        Self {
            url: catalog.public_url(key),
            is_image: media_type.is_some_and(|m| m.type_() == mime::IMAGE),
            is_video: media_type.is_some_and(|m| m.type_() == mime::VIDEO),
        }
    }
}
