//! Errors that abort a thread before any download starts.
//!
//! Per-file failures never surface here; they are recorded as
//! [`FetchError`](crate::downloader::FetchError) in the run's result.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid thread URL: {0}")]
    InvalidThreadUrl(String),

    /// The thread API answered with something other than 200
    #[error("request to {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed thread response: {0}")]
    Json(#[from] serde_json::Error),

    /// A post carried a `tim` but not the other file fields
    #[error("malformed post {post}: {message}")]
    MalformedPost { post: u64, message: String },

    #[error("thread does not contain any posts")]
    EmptyThread,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("download directory {} is unavailable", .0.display())]
    DirectoryUnavailable(PathBuf),

    #[error("more than one file resolves to {}", .0.display())]
    DuplicateDestination(PathBuf),

    #[error("cannot derive a file name from {0:?}")]
    EmptyFilename(String),

    #[error("invalid name template {template:?}: {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("invalid name pattern: {0}")]
    Pattern(#[from] regex::Error),
}
