//! Concurrent download of a thread's files.
//!
//! [`DownloadEngine`] resolves each [`RemoteFile`] to a [`Job`], queues the
//! jobs, and drains the queue with a [`WorkerPool`]. Every job ends up in
//! exactly one bucket of the returned [`DownloadResult`]: downloaded, failed,
//! skipped (a valid copy already existed), or remaining (never started because
//! the run was cancelled).

mod executor;
mod fetcher;
mod planer;
mod progress;
mod queue;
mod result;

pub use executor::{Buckets, WorkerPool};
pub use fetcher::{Fetch, FetchError, HttpFetcher, Outcome};
pub use planer::{DEFAULT_NAME_TEMPLATE, NameTemplate};
pub use progress::ProgressMonitor;
pub use queue::JobQueue;
pub use result::{DownloadResult, FailedJob};

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::thread::RemoteFile;
use crate::utils::interrupt::InterruptRouter;

/// A file and where to save it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub file: RemoteFile,
    pub destination: PathBuf,
}

/// Workers to request for `parallelism` downloads per core.
pub fn worker_count(parallelism: usize) -> usize {
    let cores = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    parallelism.saturating_mul(cores).max(1)
}

/// Downloads one batch of files. Consumed by [`download`](Self::download), so
/// each run gets a fresh engine and a fresh cancellation token.
pub struct DownloadEngine<F = HttpFetcher> {
    directory: PathBuf,
    template: NameTemplate,
    fetcher: Arc<F>,
    interrupts: Option<InterruptRouter>,
    cancel: CancellationToken,
}

impl DownloadEngine<HttpFetcher> {
    pub fn new(directory: &Path, template: NameTemplate, client: reqwest::Client) -> Self {
        Self::with_fetcher(directory, template, HttpFetcher::new(client))
    }
}

impl<F: Fetch> DownloadEngine<F> {
    pub fn with_fetcher(directory: &Path, template: NameTemplate, fetcher: F) -> Self {
        DownloadEngine {
            directory: directory.to_path_buf(),
            template,
            fetcher: Arc::new(fetcher),
            interrupts: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Let Ctrl-C cancel interactive runs of this engine. The redirect lasts
    /// until the last worker has been joined.
    pub fn with_interrupts(mut self, interrupts: InterruptRouter) -> Self {
        self.interrupts = Some(interrupts);
        self
    }

    /// Token that stops the run from starting further jobs when cancelled.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Download `files` with up to `workers` concurrent transfers.
    ///
    /// Fails only if the jobs cannot be prepared; failures of individual
    /// files are reported in the result. With `interactive`, a progress bar
    /// is drawn and Ctrl-C stops the run gracefully.
    pub async fn download(
        self,
        files: &[RemoteFile],
        workers: usize,
        interactive: bool,
    ) -> Result<DownloadResult> {
        match tokio::fs::metadata(&self.directory).await {
            Ok(metadata) if metadata.is_dir() => {}
            _ => return Err(Error::DirectoryUnavailable(self.directory)),
        }

        let jobs = planer::plan(&self.directory, &self.template, files)?;
        let total = jobs.len();
        debug!("Downloading {} files to {}", total, self.directory.display());

        let queue = Arc::new(JobQueue::new());
        queue.push_all(jobs);
        let buckets = Arc::new(Buckets::new());
        let pool = WorkerPool::new(Arc::clone(&self.fetcher), workers);

        // Ctrl-C cancels this run until every in-flight job has finished.
        let _redirect = self
            .interrupts
            .as_ref()
            .filter(|_| interactive)
            .map(|router| router.redirect(self.cancel.clone()));

        let elapsed = if interactive && total > 0 {
            let monitor = ProgressMonitor::new();
            let (elapsed, _) = tokio::join!(
                pool.run(&queue, &buckets, &self.cancel),
                monitor.watch(&queue, &buckets, total, &self.cancel)
            );
            elapsed
        } else {
            pool.run(&queue, &buckets, &self.cancel).await
        };

        let result = buckets.drain_into_result(queue.remaining_snapshot(), elapsed);
        if !result.remaining.is_empty() {
            info!("Cancelled with {} files not started", result.remaining.len());
        }
        Ok(result)
    }
}
