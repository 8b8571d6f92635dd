use reqwest::StatusCode;
use std::future::Future;
use std::io;
use std::path::Path;
use thiserror::Error;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::debug;

use super::Job;
use crate::utils::checksum::md5_file;

/// How a single job ended.
#[derive(Debug)]
pub enum Outcome {
    Downloaded,
    /// A valid copy was already on disk; nothing was transferred.
    Skipped,
    Failed(FetchError),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("file failed to download with status {0}")]
    Status(u16),

    #[error("transfer failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The bytes were written but do not hash to the advertised digest. The
    /// file is left in place.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("write failed: {0}")]
    Io(#[from] io::Error),

    #[error("download task panicked")]
    Panicked,
}

/// Moves one job's file from its source to its destination.
pub trait Fetch: Send + Sync + 'static {
    fn fetch(&self, job: &Job) -> impl Future<Output = Outcome> + Send;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        HttpFetcher { client }
    }

    async fn download_and_check(&self, job: &Job) -> Result<(), FetchError> {
        let mut response = self.client.get(job.file.url.as_str()).send().await?;
        if response.status() != StatusCode::OK {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let mut file = File::create(&job.destination).await?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        let actual = md5_file(&job.destination).await?;
        if !actual.eq_ignore_ascii_case(&job.file.md5) {
            return Err(FetchError::ChecksumMismatch {
                expected: job.file.md5.clone(),
                actual,
            });
        }
        Ok(())
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, job: &Job) -> Outcome {
        if is_valid_copy(&job.destination, &job.file.md5).await {
            debug!("{} already exists; skipping download", job.file);
            return Outcome::Skipped;
        }

        debug!("Downloading {}", job.file);
        match self.download_and_check(job).await {
            Ok(()) => Outcome::Downloaded,
            Err(err) => Outcome::Failed(err),
        }
    }
}

/// Whether `path` is a regular file hashing to `md5`. Unreadable files count
/// as absent so they get downloaded again.
async fn is_valid_copy(path: &Path, md5: &str) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => match md5_file(path).await {
            Ok(actual) => actual.eq_ignore_ascii_case(md5),
            Err(err) => {
                debug!("cannot hash existing {}: {}", path.display(), err);
                false
            }
        },
        _ => false,
    }
}
