use std::fmt;
use std::time::Duration;

use super::{FetchError, Job};
use crate::utils::fmt::bytes_fmt;

#[derive(Debug)]
pub struct FailedJob {
    pub job: Job,
    pub error: FetchError,
}

/// What happened to every job of one run.
///
/// Each job appears in exactly one of the four lists.
#[derive(Debug)]
pub struct DownloadResult {
    pub downloaded: Vec<Job>,
    pub failed: Vec<FailedJob>,
    pub skipped: Vec<Job>,
    /// Jobs no worker started before the run was cancelled.
    pub remaining: Vec<Job>,
    pub elapsed: Duration,
}

fn total_size<'a, I: IntoIterator<Item = &'a Job>>(jobs: I) -> u64 {
    jobs.into_iter().map(|job| job.file.size).sum()
}

impl DownloadResult {
    pub fn total_jobs(&self) -> usize {
        self.downloaded.len() + self.failed.len() + self.skipped.len() + self.remaining.len()
    }

    pub fn downloaded_bytes(&self) -> u64 {
        total_size(&self.downloaded)
    }

    pub fn failed_bytes(&self) -> u64 {
        total_size(self.failed.iter().map(|failed| &failed.job))
    }

    pub fn skipped_bytes(&self) -> u64 {
        total_size(&self.skipped)
    }

    pub fn remaining_bytes(&self) -> u64 {
        total_size(&self.remaining)
    }

    pub fn total_bytes(&self) -> u64 {
        self.downloaded_bytes() + self.failed_bytes() + self.skipped_bytes() + self.remaining_bytes()
    }

    /// Downloaded bytes per second of wall-clock time.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.downloaded_bytes() as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for DownloadResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}/{} jobs completed, {} failed, {} skipped",
            self.downloaded.len() + self.skipped.len(),
            self.total_jobs(),
            self.failed.len(),
            self.skipped.len()
        )?;
        writeln!(
            f,
            "{}/{} downloaded, {} skipped",
            bytes_fmt(self.downloaded_bytes() as f64),
            bytes_fmt(self.total_bytes() as f64),
            bytes_fmt(self.skipped_bytes() as f64)
        )?;
        write!(
            f,
            "Duration: {:.3} seconds ({}/s)",
            self.elapsed.as_secs_f64(),
            bytes_fmt(self.throughput())
        )
    }
}
