//! Fork-join execution of independent units of work.
//!
//! [`TaskScheduler::fork_join`] runs a batch of tasks with no ordering between
//! them and returns only after every task has finished. That return is the
//! join barrier the recursive engines rely on: whatever a task wrote
//! happens-before the caller's next statement.
//!
//! There is no cancellation. The first failing task's error is returned once
//! the whole batch has settled; a panicking task is reported as a task error.

use std::panic::{catch_unwind, AssertUnwindSafe};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{configuration_error, task_error, Result};

/// One unit of fork-join work.
pub type Task<'s> = Box<dyn FnOnce() -> Result<()> + Send + 's>;

/// Executes batches of tasks and joins on them.
pub trait TaskScheduler: Send + Sync {
    /// Short name for logs and reports.
    fn name(&self) -> &str;

    /// Number of worker threads backing this scheduler.
    fn threads(&self) -> usize;

    /// Runs every task, then returns once all of them have completed.
    fn fork_join<'s>(&self, tasks: Vec<Task<'s>>) -> Result<()>;
}

fn run_guarded(task: Task<'_>) -> Result<()> {
    match catch_unwind(AssertUnwindSafe(task)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            Err(task_error(format!("task panicked: {message}")))
        }
    }
}

/// Scheduler backed by a dedicated Rayon thread pool.
///
/// The pool size comes from configuration and is fixed at construction; the
/// global Rayon pool is never touched.
#[derive(Debug)]
pub struct RayonScheduler {
    pool: ThreadPool,
}

impl RayonScheduler {
    /// Builds a pool with `threads` workers, or Rayon's default when `None`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for `Some(0)` or if the pool cannot be built.
    pub fn new(threads: Option<usize>) -> Result<Self> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("strassen-{i}"));
        if let Some(threads) = threads {
            if threads == 0 {
                return Err(configuration_error("thread count must be at least 1"));
            }
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|e| configuration_error(format!("failed to build thread pool: {e}")))?;
        Ok(Self { pool })
    }

    /// Runs `f` inside this scheduler's pool.
    pub fn install<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        self.pool.install(f)
    }
}

impl TaskScheduler for RayonScheduler {
    fn name(&self) -> &str {
        "rayon"
    }

    fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn fork_join<'s>(&self, tasks: Vec<Task<'s>>) -> Result<()> {
        // Collect every outcome before reporting so no task is still running
        // when the caller sees an error.
        let outcomes: Vec<Result<()>> = self
            .pool
            .install(|| tasks.into_par_iter().map(run_guarded).collect());
        outcomes.into_iter().collect()
    }
}

/// Runs tasks one after another on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialScheduler;

impl TaskScheduler for SequentialScheduler {
    fn name(&self) -> &str {
        "sequential"
    }

    fn threads(&self) -> usize {
        1
    }

    fn fork_join<'s>(&self, tasks: Vec<Task<'s>>) -> Result<()> {
        let outcomes: Vec<Result<()>> = tasks.into_iter().map(run_guarded).collect();
        outcomes.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_tasks(counter: &AtomicUsize, count: usize) -> Vec<Task<'_>> {
        (0..count)
            .map(|_| {
                Box::new(move || -> Result<()> {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }) as Task<'_>
            })
            .collect()
    }

    #[test]
    fn test_rayon_scheduler_joins_all_tasks() {
        let scheduler = RayonScheduler::new(Some(4)).unwrap();
        assert_eq!(scheduler.threads(), 4);
        let counter = AtomicUsize::new(0);
        scheduler.fork_join(counting_tasks(&counter, 7)).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_tasks_write_disjoint_borrowed_slots() {
        let scheduler = RayonScheduler::new(Some(3)).unwrap();
        let mut results = vec![0usize; 7];
        let tasks: Vec<Task<'_>> = results
            .iter_mut()
            .enumerate()
            .map(|(i, slot)| {
                Box::new(move || -> Result<()> {
                    *slot = i * i;
                    Ok(())
                }) as Task<'_>
            })
            .collect();
        scheduler.fork_join(tasks).unwrap();
        assert_eq!(results, vec![0, 1, 4, 9, 16, 25, 36]);
    }

    #[test]
    fn test_nested_fork_join() {
        let scheduler = RayonScheduler::new(Some(2)).unwrap();
        let counter = AtomicUsize::new(0);
        let outer: Vec<Task<'_>> = (0..3)
            .map(|_| {
                let scheduler = &scheduler;
                let counter = &counter;
                Box::new(move || scheduler.fork_join(counting_tasks(counter, 7))) as Task<'_>
            })
            .collect();
        scheduler.fork_join(outer).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 21);
    }

    #[test]
    fn test_failing_task_is_reported_after_join() {
        let counter = AtomicUsize::new(0);
        for scheduler in [
            Box::new(SequentialScheduler) as Box<dyn TaskScheduler>,
            Box::new(RayonScheduler::new(Some(2)).unwrap()),
        ] {
            counter.store(0, Ordering::SeqCst);
            let mut batch = counting_tasks(&counter, 6);
            batch.insert(3, Box::new(|| -> Result<()> { Err(task_error("boom")) }));
            let err = scheduler.fork_join(batch).unwrap_err();
            assert_eq!(err, task_error("boom"));
            assert_eq!(counter.load(Ordering::SeqCst), 6, "{}", scheduler.name());
        }
    }

    #[test]
    fn test_panicking_task_becomes_error() {
        let scheduler = RayonScheduler::new(Some(2)).unwrap();
        let tasks: Vec<Task<'_>> = vec![Box::new(|| -> Result<()> { panic!("kernel exploded") })];
        let err = scheduler.fork_join(tasks).unwrap_err();
        assert!(err.to_string().contains("kernel exploded"));
    }

    #[test]
    fn test_zero_threads_rejected() {
        assert!(RayonScheduler::new(Some(0)).is_err());
    }
}
