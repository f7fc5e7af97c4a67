//! Worker pool used to run ready tasks.
//!
//! The scheduler only needs fire-and-forget submission. [`RayonPool`] is the
//! default implementation; anything implementing [`ThreadPool`] can be passed
//! to [`Scheduler::with_pool`](crate::Scheduler::with_pool) instead.

use rayon::ThreadPoolBuilder;

use crate::error::SchedulerError;

/// A unit of work submitted to a pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fire-and-forget work submission.
pub trait ThreadPool: Send + Sync {
    /// Queue `job` to run on some worker thread. No handle is returned.
    fn submit(&self, job: Job);

    /// Number of worker threads.
    fn worker_count(&self) -> usize;
}

/// A fixed-size pool of named rayon workers.
#[derive(Debug)]
pub struct RayonPool {
    pool: rayon::ThreadPool,
}

impl RayonPool {
    /// Create a pool with `worker_threads` workers (at least 1).
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Pool`] if the operating system refuses to
    /// spawn the worker threads.
    pub fn new(worker_threads: usize) -> Result<Self, SchedulerError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(worker_threads.max(1))
            .thread_name(|index| format!("engine-worker-{index}"))
            .build()?;
        Ok(Self { pool })
    }
}

impl ThreadPool for RayonPool {
    fn submit(&self, job: Job) {
        self.pool.spawn(job);
    }

    fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn test_pool_size() {
        let pool = RayonPool::new(3).unwrap();
        assert_eq!(pool.worker_count(), 3);
        assert_eq!(RayonPool::new(0).unwrap().worker_count(), 1);
    }

    #[test]
    fn test_submit_runs_on_named_worker() {
        let pool = RayonPool::new(2).unwrap();
        let (tx, rx) = mpsc::channel();
        pool.submit(Box::new(move || {
            let name = std::thread::current().name().map(str::to_string);
            tx.send(name).unwrap();
        }));
        let name = rx.recv().unwrap().unwrap();
        assert!(name.starts_with("engine-worker-"));
    }
}
