use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::{DownloadResult, FailedJob, Fetch, FetchError, Job, JobQueue, Outcome};
use crate::utils::limited_spawner::LimitedSpawner;

/// Outcomes recorded so far. Each list has its own lock, so workers only
/// contend when finishing with the same kind of outcome.
#[derive(Default)]
pub struct Buckets {
    downloaded: Mutex<Vec<Job>>,
    failed: Mutex<Vec<FailedJob>>,
    skipped: Mutex<Vec<Job>>,
}

fn push<T>(bucket: &Mutex<Vec<T>>, item: T) {
    bucket.lock().unwrap_or_else(PoisonError::into_inner).push(item);
}

fn take<T>(bucket: &Mutex<Vec<T>>) -> Vec<T> {
    std::mem::take(&mut *bucket.lock().unwrap_or_else(PoisonError::into_inner))
}

fn len<T>(bucket: &Mutex<Vec<T>>) -> usize {
    bucket.lock().unwrap_or_else(PoisonError::into_inner).len()
}

impl Buckets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, job: Job, outcome: Outcome) {
        match outcome {
            Outcome::Downloaded => push(&self.downloaded, job),
            Outcome::Skipped => push(&self.skipped, job),
            Outcome::Failed(error) => {
                warn!("Failed to download {}: {}", job.file, error);
                push(&self.failed, FailedJob { job, error });
            }
        }
    }

    /// Jobs with a recorded outcome.
    pub fn completed(&self) -> usize {
        len(&self.downloaded) + len(&self.failed) + len(&self.skipped)
    }

    /// Move the recorded outcomes into a result. Call once workers are joined.
    pub fn drain_into_result(&self, remaining: Vec<Job>, elapsed: Duration) -> DownloadResult {
        DownloadResult {
            downloaded: take(&self.downloaded),
            failed: take(&self.failed),
            skipped: take(&self.skipped),
            remaining,
            elapsed,
        }
    }
}

/// Drains a [`JobQueue`] with a bounded number of concurrent workers.
pub struct WorkerPool<F> {
    fetcher: Arc<F>,
    workers: usize,
}

impl<F: Fetch> WorkerPool<F> {
    pub fn new(fetcher: Arc<F>, workers: usize) -> Self {
        WorkerPool { fetcher, workers }
    }

    /// Run until the queue is empty or `cancel` fires and in-flight jobs
    /// finish. Returns the wall-clock time from launch to join.
    pub async fn run(
        &self,
        queue: &Arc<JobQueue>,
        buckets: &Arc<Buckets>,
        cancel: &CancellationToken,
    ) -> Duration {
        // don't launch more workers than jobs
        let workers = self.workers.min(queue.len());
        debug!("Will use {} workers for downloading", workers);

        let start = Instant::now();
        // One permit per worker, so spawning never waits; the worker count
        // is the concurrency bound and the spawner only collects handles.
        let mut spawner = LimitedSpawner::new(workers);
        for id in 0..workers {
            let worker = work(
                id,
                Arc::clone(&self.fetcher),
                Arc::clone(queue),
                Arc::clone(buckets),
                cancel.clone(),
            );
            if let Err(err) = spawner.spawn(worker).await {
                error!("Cannot launch worker {}: {}", id, err);
                break;
            }
        }
        debug!("All workers launched");

        for (id, result) in spawner.join_all().await.into_iter().enumerate() {
            if let Err(err) = result {
                error!("Worker {} stopped abnormally: {}", id, err);
            }
        }
        start.elapsed()
    }
}

async fn work<F: Fetch>(
    id: usize,
    fetcher: Arc<F>,
    queue: Arc<JobQueue>,
    buckets: Arc<Buckets>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            debug!("Worker {} stopping: run cancelled", id);
            break;
        }
        let Some(job) = queue.pop() else {
            break;
        };
        let outcome = AssertUnwindSafe(fetcher.fetch(&job))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Outcome::Failed(FetchError::Panicked));
        buckets.record(job, outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::FetchError;
    use crate::test_helpers::{job, remote_file};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    /// Decides outcomes from the job id: multiples of 3 fail, multiples of 5
    /// are skipped, the rest download.
    #[derive(Default)]
    struct ScriptedFetcher {
        delay: Duration,
        active: AtomicUsize,
        max_active: AtomicUsize,
        order: Mutex<Vec<u64>>,
        cancel_after: Option<(usize, CancellationToken)>,
        panic_on: Option<u64>,
    }

    impl Fetch for ScriptedFetcher {
        async fn fetch(&self, job: &Job) -> Outcome {
            let current = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(current, Ordering::SeqCst);
            let calls = {
                let mut order = self.order.lock().unwrap();
                order.push(job.file.id);
                order.len()
            };
            if self.panic_on == Some(job.file.id) {
                self.active.fetch_sub(1, Ordering::SeqCst);
                panic!("fetcher broke on job {}", job.file.id);
            }
            if let Some((after, token)) = &self.cancel_after {
                if calls == *after {
                    token.cancel();
                }
            }

            sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            match job.file.id {
                id if id % 3 == 0 => Outcome::Failed(FetchError::Status(500)),
                id if id % 5 == 0 => Outcome::Skipped,
                _ => Outcome::Downloaded,
            }
        }
    }

    fn queue(n: u64) -> Arc<JobQueue> {
        let queue = Arc::new(JobQueue::new());
        queue.push_all(
            (1..=n).map(|id| job(remote_file(id, String::new(), b""), Path::new("out"))),
        );
        queue
    }

    async fn run(
        fetcher: ScriptedFetcher,
        workers: usize,
        jobs: u64,
        cancel: CancellationToken,
    ) -> (Arc<ScriptedFetcher>, DownloadResult) {
        let fetcher = Arc::new(fetcher);
        let queue = queue(jobs);
        let buckets = Arc::new(Buckets::new());
        let elapsed = WorkerPool::new(Arc::clone(&fetcher), workers)
            .run(&queue, &buckets, &cancel)
            .await;
        let result = buckets.drain_into_result(queue.remaining_snapshot(), elapsed);
        (fetcher, result)
    }

    fn ids<'a, I: IntoIterator<Item = &'a Job>>(jobs: I) -> Vec<u64> {
        let mut ids = jobs.into_iter().map(|job| job.file.id).collect::<Vec<_>>();
        ids.sort();
        ids
    }

    fn assert_partition(result: &DownloadResult, jobs: u64) {
        let all = ids(
            result
                .downloaded
                .iter()
                .chain(result.failed.iter().map(|failed| &failed.job))
                .chain(&result.skipped)
                .chain(&result.remaining),
        );
        assert_eq!(all, (1..=jobs).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_routes_outcomes() {
        let (_, result) = run(ScriptedFetcher::default(), 4, 10, CancellationToken::new()).await;

        assert_partition(&result, 10);
        assert_eq!(ids(&result.downloaded), vec![1, 2, 4, 7, 8]);
        assert_eq!(ids(result.failed.iter().map(|failed| &failed.job)), vec![3, 6, 9]);
        assert_eq!(ids(&result.skipped), vec![5, 10]);
        assert!(result.remaining.is_empty());
    }

    #[tokio::test]
    async fn test_concurrency_bound() {
        let fetcher = ScriptedFetcher {
            delay: Duration::from_millis(20),
            ..Default::default()
        };
        let (fetcher, result) = run(fetcher, 3, 12, CancellationToken::new()).await;

        assert_partition(&result, 12);
        let max_active = fetcher.max_active.load(Ordering::SeqCst);
        assert!(max_active <= 3, "{} workers ran at once", max_active);
    }

    #[tokio::test]
    async fn test_workers_clamped_to_job_count() {
        let fetcher = ScriptedFetcher {
            delay: Duration::from_millis(50),
            ..Default::default()
        };
        let (fetcher, result) = run(fetcher, 64, 2, CancellationToken::new()).await;

        assert_partition(&result, 2);
        assert!(fetcher.max_active.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_single_worker_is_fifo() {
        let (fetcher, _) = run(ScriptedFetcher::default(), 1, 6, CancellationToken::new()).await;
        assert_eq!(*fetcher.order.lock().unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_cancel_mid_run() {
        let cancel = CancellationToken::new();
        let fetcher = ScriptedFetcher {
            cancel_after: Some((3, cancel.clone())),
            ..Default::default()
        };
        let (fetcher, result) = run(fetcher, 1, 10, cancel).await;

        // The third job was in flight when cancellation fired and still lands
        // in a bucket; nothing after it is started.
        assert_eq!(fetcher.order.lock().unwrap().len(), 3);
        assert_eq!(ids(&result.remaining), (4..=10).collect::<Vec<_>>());
        assert_eq!(
            result.downloaded.len() + result.failed.len() + result.skipped.len(),
            3
        );
        assert_partition(&result, 10);
    }

    #[tokio::test]
    async fn test_cancel_with_many_workers() {
        let cancel = CancellationToken::new();
        let fetcher = ScriptedFetcher {
            delay: Duration::from_millis(10),
            cancel_after: Some((5, cancel.clone())),
            ..Default::default()
        };
        let (fetcher, result) = run(fetcher, 4, 40, cancel).await;

        let dequeued = fetcher.order.lock().unwrap().len();
        assert!(result.remaining.len() <= 40 - 5);
        assert_eq!(result.remaining.len(), 40 - dequeued);
        assert_partition(&result, 40);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (fetcher, result) = run(ScriptedFetcher::default(), 4, 5, cancel).await;

        assert!(fetcher.order.lock().unwrap().is_empty());
        assert_eq!(result.remaining.len(), 5);
        assert_partition(&result, 5);
    }

    #[tokio::test]
    async fn test_panicking_fetch_is_recorded_as_failed() {
        let fetcher = ScriptedFetcher {
            panic_on: Some(4),
            ..Default::default()
        };
        let (fetcher, result) = run(fetcher, 2, 8, CancellationToken::new()).await;

        assert_partition(&result, 8);
        assert_eq!(fetcher.order.lock().unwrap().len(), 8);
        let failed = result
            .failed
            .iter()
            .find(|failed| failed.job.file.id == 4)
            .unwrap();
        assert!(matches!(failed.error, FetchError::Panicked));
        assert_eq!(ids(&result.downloaded), vec![1, 2, 7, 8]);
    }

    #[tokio::test]
    async fn test_empty_queue() {
        let (_, result) = run(ScriptedFetcher::default(), 4, 0, CancellationToken::new()).await;
        assert_eq!(result.total_jobs(), 0);
    }

    #[test]
    fn test_completed_counts_every_bucket() {
        let buckets = Buckets::new();
        let job = |id| job(remote_file(id, String::new(), b""), Path::new("out"));
        buckets.record(job(1), Outcome::Downloaded);
        buckets.record(job(2), Outcome::Skipped);
        buckets.record(job(3), Outcome::Failed(FetchError::Status(404)));
        assert_eq!(buckets.completed(), 3);

        let result = buckets.drain_into_result(Vec::new(), Duration::ZERO);
        assert_eq!(result.total_jobs(), 3);
        assert_eq!(buckets.completed(), 0);
    }
}
