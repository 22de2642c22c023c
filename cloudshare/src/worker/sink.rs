//! Destinations for the public URL of a finished upload

use std::sync::{Arc, Mutex, PoisonError};

use arboard::Clipboard;
use async_trait::async_trait;
use notify_rust::Notification;
use strum::{Display, EnumString};
use thiserror::Error;
use tracing::info;

const NOTIFICATION_TITLE: &str = "Link copied to clipboard";

/// Errors raised by a publish sink
#[derive(Error, Debug)]
pub enum SinkError {
    /// The system clipboard could not be opened or written
    #[error("Clipboard error: {0}")]
    Clipboard(#[from] arboard::Error),

    /// The desktop notification could not be shown
    #[error("Notification error: {0}")]
    Notification(#[from] notify_rust::error::Error),

    /// The blocking desktop call did not finish
    #[error("Desktop task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Receives the public URL of every successful upload
#[async_trait]
pub trait PublishSink: Send + Sync {
    /// Publishes `url`
    ///
    /// # Errors
    ///
    /// Returns `SinkError` if the URL could not be delivered
    async fn publish(&self, url: &str) -> Result<(), SinkError>;
}

/// Available sink implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SinkKind {
    /// Clipboard plus desktop notification
    #[default]
    Desktop,
    /// Log line only
    Log,
}

impl SinkKind {
    /// Builds the sink for this kind
    #[must_use]
    pub fn build(self) -> Arc<dyn PublishSink> {
        match self {
            Self::Desktop => Arc::new(DesktopSink::new()),
            Self::Log => Arc::new(LogSink),
        }
    }
}

/// Logs published URLs
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl PublishSink for LogSink {
    async fn publish(&self, url: &str) -> Result<(), SinkError> {
        info!("Published {url}");
        Ok(())
    }
}

/// Copies the URL to the clipboard and raises a desktop notification
///
/// The clipboard handle is opened on first use and kept for the life of the
/// sink; on X11 the copied text is only served while the handle is alive.
#[derive(Default)]
pub struct DesktopSink {
    clipboard: Arc<Mutex<Option<Clipboard>>>,
}

impl DesktopSink {
    /// Creates a sink; no desktop resources are touched until the first publish
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PublishSink for DesktopSink {
    async fn publish(&self, url: &str) -> Result<(), SinkError> {
        let clipboard = Arc::clone(&self.clipboard);
        let url = url.to_string();

        tokio::task::spawn_blocking(move || {
            copy_to_clipboard(&clipboard, &url)?;
            notification(&url).show()?;
            Ok::<(), SinkError>(())
        })
        .await?
    }
}

fn copy_to_clipboard(clipboard: &Mutex<Option<Clipboard>>, text: &str) -> Result<(), SinkError> {
    let mut guard = clipboard.lock().unwrap_or_else(PoisonError::into_inner);
    if guard.is_none() {
        *guard = Some(Clipboard::new()?);
    }
    if let Some(clipboard) = guard.as_mut() {
        clipboard.set_text(text)?;
    }
    Ok(())
}

/// Notification announcing that `url` is on the clipboard
fn notification(url: &str) -> Notification {
    let mut notification = Notification::new();
    notification
        .appname(env!("CARGO_PKG_NAME"))
        .summary(NOTIFICATION_TITLE)
        .body(url);
    notification
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_sink_kind_parsing() {
        assert_eq!(SinkKind::from_str("desktop").unwrap(), SinkKind::Desktop);
        assert_eq!(SinkKind::from_str("LOG").unwrap(), SinkKind::Log);
        assert!(SinkKind::from_str("clipboard").is_err());
        assert_eq!(SinkKind::Log.to_string(), "log");
    }

    #[test]
    fn test_notification_carries_url() {
        let notification = notification("https://cdn.example.com/shots/a.png");
        assert_eq!(notification.summary, NOTIFICATION_TITLE);
        assert_eq!(notification.body, "https://cdn.example.com/shots/a.png");
        assert_eq!(notification.appname, "cloudshare");
    }

    #[test]
    fn test_desktop_sink_opens_clipboard_lazily() {
        let sink = DesktopSink::new();
        assert!(sink.clipboard.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_log_sink_never_fails() {
        assert!(LogSink.publish("https://cdn.example.com/shots/a.png").await.is_ok());
    }
}
