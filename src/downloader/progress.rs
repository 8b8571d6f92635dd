use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Buckets, JobQueue};

pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Terminal progress bar for interactive runs.
pub struct ProgressMonitor {
    interval: Duration,
}

impl ProgressMonitor {
    pub fn new() -> Self {
        ProgressMonitor {
            interval: POLL_INTERVAL,
        }
    }

    /// Poll the run until the queue drains or `cancel` fires. Returns whether
    /// the queue drained; only then is the bar drawn full.
    pub async fn watch(
        &self,
        queue: &JobQueue,
        buckets: &Buckets,
        total: usize,
        cancel: &CancellationToken,
    ) -> bool {
        let mut bar = Bar::new(total);
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            bar.advance_to(buckets.completed());
            if queue.is_empty() {
                break;
            }
        }

        let drained = queue.is_empty();
        if drained {
            bar.advance_to(total);
        }
        drained
    }
}

struct Bar {
    pbar: tqdm::Tqdm<()>,
    shown: usize,
}

impl Bar {
    fn new(total: usize) -> Self {
        Bar {
            pbar: tqdm::pbar(Some(total)),
            shown: 0,
        }
    }

    fn advance_to(&mut self, position: usize) {
        if position <= self.shown {
            return;
        }
        if let Err(err) = self.pbar.update(position - self.shown) {
            debug!("cannot draw progress: {}", err);
        }
        self.shown = position;
    }
}
