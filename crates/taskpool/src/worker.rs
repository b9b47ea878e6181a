//! Worker loop
//!
//! Each worker pulls tasks from the shared queue and runs them one at a time
//! until it observes the queue closed and drained.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::completion::CompletionTracker;
use crate::queue::{BoundedQueue, Dequeue};
use crate::task::{Task, TaskStatus};

/// Worker identifier, unique within a pool and starting at 1
pub type WorkerId = usize;

/// Shared counters updated by workers and producers
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub submitted: AtomicUsize,
    pub rejected: AtomicUsize,
    pub started: AtomicUsize,
    pub completed: AtomicUsize,
    pub failed: AtomicUsize,
    pub running: AtomicUsize,
    pub peak_running: AtomicUsize,
    pub active_workers: AtomicUsize,
}

impl PoolCounters {
    fn task_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
        let running = self.running.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_running.fetch_max(running, Ordering::AcqRel);
    }

    fn task_finished(&self, status: TaskStatus) {
        match status {
            TaskStatus::Completed => self.completed.fetch_add(1, Ordering::Relaxed),
            _ => self.failed.fetch_add(1, Ordering::Relaxed),
        };
        self.running.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Everything a worker thread needs from its pool
pub(crate) struct WorkerContext {
    pub pool_id: Arc<str>,
    pub queue: Arc<BoundedQueue<Task>>,
    pub tracker: Arc<CompletionTracker>,
    pub counters: Arc<PoolCounters>,
}

/// Drain the queue until it is closed and empty
pub(crate) fn run_worker(worker_id: WorkerId, ctx: WorkerContext) {
    // Declared first so it is dropped last, after the active count is released.
    let _completion = ctx.tracker.guard();
    let _active = ActiveWorker::enter(&ctx.counters);

    debug!(pool_id = %ctx.pool_id, worker_id, "Worker started");

    let mut processed = 0usize;
    loop {
        let mut task = match ctx.queue.pop() {
            Dequeue::Item(task) => task,
            Dequeue::Closed => break,
            // Blocking pop only reports items or closure
            Dequeue::Empty => continue,
        };

        ctx.counters.task_started();
        info!(
            pool_id = %ctx.pool_id,
            worker_id,
            task_id = task.id(),
            job_id = task.job_id(),
            status = %TaskStatus::Running,
            "Task started"
        );

        let status = task.run();
        ctx.counters.task_finished(status);
        processed += 1;

        match status {
            TaskStatus::Completed => info!(
                pool_id = %ctx.pool_id,
                worker_id,
                task_id = task.id(),
                job_id = task.job_id(),
                %status,
                "Task finished"
            ),
            _ => {
                let failure = task.handle().failure().unwrap_or_default();
                warn!(
                    pool_id = %ctx.pool_id,
                    worker_id,
                    task_id = task.id(),
                    job_id = task.job_id(),
                    %status,
                    error = %failure,
                    "Task failed"
                );
            }
        }
    }

    debug!(pool_id = %ctx.pool_id, worker_id, processed, "Worker exited");
}

struct ActiveWorker<'a> {
    counters: &'a PoolCounters,
}

impl<'a> ActiveWorker<'a> {
    fn enter(counters: &'a PoolCounters) -> Self {
        counters.active_workers.fetch_add(1, Ordering::AcqRel);
        Self { counters }
    }
}

impl Drop for ActiveWorker<'_> {
    fn drop(&mut self) {
        self.counters.active_workers.fetch_sub(1, Ordering::AcqRel);
    }
}
