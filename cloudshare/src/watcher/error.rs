use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while setting up a directory watcher
#[derive(Error, Debug)]
pub enum WatchError {
    /// The watched directory could not be created
    #[error("Failed to create watch directory '{}': {source}", path.display())]
    CreateDir {
        /// Directory that was requested
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The platform watcher could not be attached
    #[error("Failed to watch directory: {0}")]
    Notify(#[from] notify::Error),
}
