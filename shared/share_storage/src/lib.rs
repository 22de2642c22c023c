//! Object storage services for cloudshare
//!
//! This crate provides everything needed to publish a local file to an
//! S3-compatible bucket: content type detection, object key generation and the
//! bucket gateway used for uploads, listings and deletions.

pub mod bucket;
pub mod classifier;
pub mod key;

pub use bucket::{
    BucketError, BucketResult, BucketStorage, DeleteOutcome, StorageObject, UploadTask,
};
pub use classifier::ContentClassifier;
pub use key::ObjectKeyGenerator;
