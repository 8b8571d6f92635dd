use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{AcquireError, Semaphore};
use tokio::task::{JoinError, JoinHandle};

/// Spawns tasks onto the runtime with at most `max_concurrent` running at
/// once, and keeps their handles so they can be joined together.
pub struct LimitedSpawner<T> {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    handles: Vec<JoinHandle<T>>,
}

impl<T: Send + 'static> LimitedSpawner<T> {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            handles: Vec::new(),
        }
    }

    /// Waits for a free slot, then spawns `f`. The slot is released when the
    /// task finishes, including by panicking.
    pub async fn spawn<F>(&mut self, f: F) -> Result<(), AcquireError>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let permit = Arc::clone(&self.semaphore).acquire_owned().await?;
        self.handles.push(tokio::spawn(async move {
            let _permit = permit;
            f.await
        }));
        Ok(())
    }

    /// Number of tasks currently holding a slot.
    pub fn running(&self) -> usize {
        self.max_concurrent - self.semaphore.available_permits()
    }

    /// Waits for every spawned task, in spawn order.
    pub async fn join_all(self) -> Vec<Result<T, JoinError>> {
        join_all(self.handles).await
    }
}
