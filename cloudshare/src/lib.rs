//! Watches a directory and publishes every new file to object storage
//!
//! New files are picked up by the [`watcher`], uploaded one at a time by the
//! [`worker::Dispatcher`], and their public URLs are handed to a
//! [`worker::PublishSink`]. The [`server`] module exposes the published objects
//! over HTTP for listing and deletion.

#![deny(clippy::all, clippy::pedantic, clippy::nursery, missing_docs, dead_code)]

pub mod server;
pub mod types;
pub mod watcher;
pub mod worker;
