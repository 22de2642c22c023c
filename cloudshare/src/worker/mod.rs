//! Upload dispatch for watched files

mod policy;
pub mod sink;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use share_storage::{BucketError, BucketResult, BucketStorage};
use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub use policy::FailurePolicy;
pub use sink::{DesktopSink, LogSink, PublishSink, SinkError, SinkKind};

use crate::watcher::EventSource;

/// Result type for dispatcher runs
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors that end a dispatcher run
#[derive(Error, Debug)]
pub enum DispatchError {
    /// An upload failed under `FailurePolicy::Stop`
    #[error("Failed to upload file '{}': {source}", path.display())]
    Upload {
        /// File that could not be uploaded
        path: PathBuf,
        /// Upload failure
        #[source]
        source: BucketError,
    },
}

/// Publishes a local file and returns its public URL
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Uploads the file at `source_path`
    ///
    /// # Errors
    ///
    /// Returns `BucketError` if the file cannot be read or transferred
    async fn upload(&self, source_path: &Path) -> BucketResult<String>;
}

#[async_trait]
impl Uploader for BucketStorage {
    async fn upload(&self, source_path: &Path) -> BucketResult<String> {
        Self::upload(self, source_path).await
    }
}

/// Lifecycle of a dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Created, not yet consuming events
    Idle,
    /// Consuming the event stream
    Dispatching,
    /// Event stream closed or shutdown requested
    Stopped,
}

/// Counters for a finished dispatcher run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Files uploaded successfully
    pub uploaded: usize,
    /// Files given up on
    pub failed: usize,
}

/// Uploads watched files one at a time, in arrival order
///
/// Publish results reach the sink in the order the files were created; a slow
/// upload holds back everything behind it.
pub struct Dispatcher {
    uploader: Arc<dyn Uploader>,
    sink: Arc<dyn PublishSink>,
    policy: FailurePolicy,
    shutdown_token: CancellationToken,
    state: DispatcherState,
}

impl Dispatcher {
    /// Creates a new dispatcher
    #[must_use]
    pub fn new(
        uploader: Arc<dyn Uploader>,
        sink: Arc<dyn PublishSink>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            uploader,
            sink,
            policy,
            shutdown_token: CancellationToken::new(),
            state: DispatcherState::Idle,
        }
    }

    /// Returns a clone of the shutdown token for external control
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> DispatcherState {
        self.state
    }

    /// Consumes `events` until the stream closes or shutdown is requested
    ///
    /// Shutdown is only observed between files; an upload in progress always
    /// runs to completion.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Upload` if an upload fails under `FailurePolicy::Stop`
    pub async fn run<S: EventSource>(&mut self, mut events: S) -> DispatchResult<DispatchSummary> {
        self.state = DispatcherState::Dispatching;
        info!("Dispatcher started with {:?} failure policy", self.policy);

        let mut summary = DispatchSummary::default();
        let result = loop {
            let event = tokio::select! {
                biased;
                () = self.shutdown_token.cancelled() => {
                    info!("Dispatcher received shutdown signal");
                    break Ok(summary);
                }
                event = events.next_event() => event,
            };

            let Some(event) = event else {
                info!("Watch event stream closed");
                break Ok(summary);
            };

            match self.upload_with_policy(&event.path).await {
                Ok(url) => {
                    summary.uploaded += 1;
                    self.publish(&url).await;
                }
                Err(e) if self.policy == FailurePolicy::Stop => {
                    summary.failed += 1;
                    error!("Stopping dispatcher after failed upload of '{}'", event.path.display());
                    break Err(DispatchError::Upload {
                        path: event.path,
                        source: e,
                    });
                }
                Err(e) => {
                    summary.failed += 1;
                    error!("Giving up on '{}': {e}", event.path.display());
                }
            }
        };

        self.state = DispatcherState::Stopped;
        info!(
            "Dispatcher stopped after {} uploads and {} failures",
            summary.uploaded, summary.failed
        );
        result
    }

    async fn upload_with_policy(&self, path: &Path) -> BucketResult<String> {
        let max_attempts = self.policy.max_attempts().max(1);
        let mut attempt = 1;

        loop {
            let err = match self.uploader.upload(path).await {
                Ok(url) => return Ok(url),
                Err(e) if attempt >= max_attempts => return Err(e),
                Err(e) => e,
            };

            let delay = self.policy.backoff(attempt);
            warn!(
                "Upload of '{}' failed (attempt {attempt}/{max_attempts}): {err}, retrying in {}ms",
                path.display(),
                delay.as_millis()
            );

            tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    info!("Abandoning retries for '{}' on shutdown", path.display());
                    return Err(err);
                }
                () = sleep(delay) => {}
            }

            attempt += 1;
        }
    }

    /// Sink failures are logged only; the object is already stored
    async fn publish(&self, url: &str) {
        if let Err(e) = self.sink.publish(url).await {
            error!("Failed to publish {url}: {e}");
        }
    }
}
