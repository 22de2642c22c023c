//! Creation events for a single watched directory

mod error;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use notify::{
    event::{ModifyKind, RenameMode},
    EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

pub use error::WatchError;

const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Kind of filesystem change forwarded to the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    /// A new entry appeared in the watched directory
    Create,
}

/// A candidate file for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// Path of the new file
    pub path: PathBuf,
    /// What happened to it
    pub kind: WatchEventKind,
}

impl WatchEvent {
    /// Creation event for `path`
    #[must_use]
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: WatchEventKind::Create,
        }
    }
}

/// A sequential stream of watch events
#[async_trait]
pub trait EventSource: Send {
    /// Waits for the next event; `None` once the stream has ended
    async fn next_event(&mut self) -> Option<WatchEvent>;
}

#[async_trait]
impl EventSource for mpsc::Receiver<WatchEvent> {
    async fn next_event(&mut self) -> Option<WatchEvent> {
        self.recv().await
    }
}

/// Watches one directory (non-recursively) for files created in or renamed into it
///
/// Dropping the watcher detaches it from the filesystem, which ends the stream.
pub struct DirectoryWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
    event_rx: mpsc::Receiver<WatchEvent>,
}

impl DirectoryWatcher {
    /// Starts watching `path`, creating it first if it does not exist
    ///
    /// # Errors
    ///
    /// Returns `WatchError::CreateDir` if the directory cannot be created, or
    /// `WatchError::Notify` if the platform watcher cannot be attached
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, WatchError> {
        let path = path.into();
        std::fs::create_dir_all(&path).map_err(|source| WatchError::CreateDir {
            path: path.clone(),
            source,
        })?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let mut filter = EventFilter::default();
        let mut watcher = notify::recommended_watcher(
            move |res: Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    for watch_event in filter.accept(event) {
                        if event_tx.blocking_send(watch_event).is_err() {
                            debug!("Watch event receiver dropped");
                            return;
                        }
                    }
                }
                Err(e) => error!("Watch error: {e}"),
            },
        )?;
        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        info!("Watching {} for new files", path.display());

        Ok(Self {
            path,
            _watcher: watcher,
            event_rx,
        })
    }

    /// Directory being watched
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl EventSource for DirectoryWatcher {
    async fn next_event(&mut self) -> Option<WatchEvent> {
        self.event_rx.recv().await
    }
}

/// Turns raw notify events into arrivals of visible files
///
/// A file counts as arrived when it is created in the directory or renamed
/// into it. Screenshot tools write a hidden temp file and rename it, so the
/// rename is often the only signal for the final name.
#[derive(Debug, Default)]
struct EventFilter {
    /// Destination of the last `RenameMode::To`; the paired `Both` repeats it
    last_rename_to: Option<PathBuf>,
}

impl EventFilter {
    fn accept(&mut self, event: notify::Event) -> Vec<WatchEvent> {
        let last_rename_to = self.last_rename_to.take();

        let arrived: Vec<PathBuf> = match event.kind {
            EventKind::Create(_) => event.paths,
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                self.last_rename_to = event.paths.last().cloned();
                event.paths
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                match event.paths.into_iter().nth(1) {
                    Some(to) if last_rename_to.as_ref() == Some(&to) => Vec::new(),
                    Some(to) => vec![to],
                    None => Vec::new(),
                }
            }
            // Backends that cannot tell the two sides apart report both paths
            EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => event
                .paths
                .into_iter()
                .filter(|path| path.exists())
                .collect(),
            _ => Vec::new(),
        };

        arrived
            .into_iter()
            .filter(|path| {
                let hidden = is_hidden(path);
                if hidden {
                    debug!("Ignoring hidden file {}", path.display());
                }
                !hidden
            })
            .map(WatchEvent::created)
            .collect()
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}
