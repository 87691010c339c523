//! Recording [`JobQueue`].

use conference_core::error::QueueError;
use conference_core::jobs::{Job, JobQueue, QueueFuture};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Job queue that records what was enqueued instead of running it.
///
/// Can be switched into a failing mode to exercise fire-and-forget paths.
#[derive(Clone, Debug, Default)]
pub struct RecordingJobQueue {
    jobs: Arc<Mutex<Vec<Job>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingJobQueue {
    /// Create an empty, healthy queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent enqueue fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Jobs enqueued so far, oldest first.
    #[must_use]
    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().unwrap().clone()
    }

    /// Remove and return the recorded jobs.
    #[must_use]
    pub fn take_jobs(&self) -> Vec<Job> {
        std::mem::take(&mut *self.jobs.lock().unwrap())
    }
}

impl JobQueue for RecordingJobQueue {
    fn enqueue(&self, job: Job) -> QueueFuture<'_, ()> {
        Box::pin(async move {
            if self.failing.load(Ordering::SeqCst) {
                return Err(QueueError::Backend("queue unavailable".to_string()));
            }
            self.jobs.lock().unwrap().push(job);
            Ok(())
        })
    }
}
