//! Chunked uploads for payloads above the part size

use std::ops::Range;

use aws_sdk_s3::{
    primitives::ByteStream,
    types::{CompletedMultipartUpload, CompletedPart},
};
use futures::{stream, StreamExt, TryStreamExt};
use tracing::{debug, error, warn};

use super::{BucketError, BucketResult, BucketStorage, UploadTask};

/// Parts of a single upload that may be in flight at once
pub const MAX_CONCURRENT_PARTS: usize = 5;

/// Hard S3 limit on the number of parts in one upload
const MAX_PARTS: usize = 10_000;

/// Splits `len` bytes into sequential ranges of at most `part_size` bytes
///
/// # Panics
///
/// Panics if `part_size` is zero
#[must_use]
pub fn part_ranges(len: usize, part_size: usize) -> Vec<Range<usize>> {
    (0..len)
        .step_by(part_size)
        .map(|start| start..(start + part_size).min(len))
        .collect()
}

impl BucketStorage {
    pub(super) async fn upload_multipart(&self, task: &UploadTask) -> BucketResult<()> {
        let ranges = part_ranges(task.payload.len(), self.part_size);
        if ranges.len() > MAX_PARTS {
            return Err(BucketError::InvalidInput(format!(
                "'{}' needs {} parts, more than the {MAX_PARTS} allowed",
                task.source_path.display(),
                ranges.len()
            )));
        }

        let created = self
            .s3_client
            .create_multipart_upload()
            .bucket(&self.bucket_name)
            .key(&task.object_key)
            .content_type(&task.content_type)
            .send()
            .await?;

        let upload_id = created
            .upload_id()
            .ok_or_else(|| {
                BucketError::S3Error(format!(
                    "No upload id returned for multipart upload of {}",
                    task.object_key
                ))
            })?
            .to_string();

        debug!(
            "Started multipart upload {upload_id} for {} with {} parts",
            task.object_key,
            ranges.len()
        );

        match self.upload_parts(task, &upload_id, ranges).await {
            Ok(parts) => self.complete(task, &upload_id, parts).await,
            Err(e) => {
                self.abort(task, &upload_id).await;
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        task: &UploadTask,
        upload_id: &str,
        ranges: Vec<Range<usize>>,
    ) -> BucketResult<Vec<CompletedPart>> {
        stream::iter(ranges.into_iter().enumerate())
            .map(|(index, range)| async move {
                let part_number = i32::try_from(index + 1)
                    .map_err(|_| BucketError::InvalidInput(format!("part {index} out of range")))?;
                let body = task.payload.slice(range);

                let output = self
                    .s3_client
                    .upload_part()
                    .bucket(&self.bucket_name)
                    .key(&task.object_key)
                    .upload_id(upload_id)
                    .part_number(part_number)
                    .body(ByteStream::from(body))
                    .send()
                    .await?;

                debug!("Uploaded part {part_number} of {}", task.object_key);

                Ok::<_, BucketError>(
                    CompletedPart::builder()
                        .part_number(part_number)
                        .set_e_tag(output.e_tag().map(ToString::to_string))
                        .build(),
                )
            })
            .buffered(MAX_CONCURRENT_PARTS)
            .try_collect()
            .await
    }

    async fn complete(
        &self,
        task: &UploadTask,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> BucketResult<()> {
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        let result = self
            .s3_client
            .complete_multipart_upload()
            .bucket(&self.bucket_name)
            .key(&task.object_key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await;

        if let Err(e) = result {
            self.abort(task, upload_id).await;
            return Err(e.into());
        }

        Ok(())
    }

    /// Best effort; the upload error is what gets reported
    async fn abort(&self, task: &UploadTask, upload_id: &str) {
        warn!(
            "Aborting multipart upload {upload_id} for {}:{}",
            self.bucket_name, task.object_key
        );

        if let Err(e) = self
            .s3_client
            .abort_multipart_upload()
            .bucket(&self.bucket_name)
            .key(&task.object_key)
            .upload_id(upload_id)
            .send()
            .await
        {
            error!(
                "Couldn't abort multipart upload {upload_id} for {}:{}: {}",
                self.bucket_name,
                task.object_key,
                BucketError::from(e)
            );
        }
    }
}
