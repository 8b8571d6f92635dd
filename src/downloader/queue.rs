use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::Job;

/// FIFO of jobs that no worker has taken yet.
///
/// The lock is only held for the duration of a single push, pop or copy, so
/// callers never wait on another worker's download.
#[derive(Default)]
pub struct JobQueue {
    jobs: Mutex<VecDeque<Job>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `jobs` in order. Meant to be called before workers start.
    pub fn push_all<I: IntoIterator<Item = Job>>(&self, jobs: I) {
        self.lock().extend(jobs);
    }

    /// Take the head job, or `None` when the queue is drained.
    pub fn pop(&self) -> Option<Job> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the jobs not yet popped, in queue order.
    pub fn remaining_snapshot(&self) -> Vec<Job> {
        self.lock().iter().cloned().collect()
    }
}
