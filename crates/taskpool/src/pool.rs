//! Worker pool for task execution
//!
//! Owns a bounded task queue and a fixed set of worker threads. The pool is
//! single-use: create it, submit tasks, close it, then wait for the drain.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::completion::CompletionTracker;
use crate::queue::{BoundedQueue, PushTimeoutError, TryPushError};
use crate::task::Task;
use crate::worker::{run_worker, PoolCounters, WorkerContext};

/// Worker pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    /// Pool ID used in thread names and log fields (generated if not provided)
    pub pool_id: String,

    /// Number of worker threads
    pub worker_count: usize,

    /// Maximum number of queued, not yet running, tasks
    pub queue_capacity: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            pool_id: format!("pool-{}", Uuid::now_v7()),
            worker_count: 3,
            queue_capacity: 10,
        }
    }
}

impl WorkerPoolConfig {
    /// Create a configuration with the given worker count and queue capacity
    pub fn new(worker_count: usize, queue_capacity: usize) -> Self {
        Self {
            worker_count,
            queue_capacity,
            ..Default::default()
        }
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `TASKPOOL_ID`: Pool ID (default: generated)
    /// - `TASKPOOL_WORKERS`: Number of workers (default: 3)
    /// - `TASKPOOL_QUEUE_CAPACITY`: Queue capacity (default: 10)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let pool_id = std::env::var("TASKPOOL_ID").unwrap_or(defaults.pool_id);

        let worker_count = std::env::var("TASKPOOL_WORKERS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.worker_count);

        let queue_capacity = std::env::var("TASKPOOL_QUEUE_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.queue_capacity);

        Self {
            pool_id,
            worker_count,
            queue_capacity,
        }
    }

    /// Set the pool ID
    pub fn with_pool_id(mut self, id: impl Into<String>) -> Self {
        self.pool_id = id.into();
        self
    }

    /// Set the number of workers
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Set the queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), WorkerPoolError> {
        if self.worker_count == 0 {
            return Err(WorkerPoolError::InvalidConfig(
                "worker_count must be at least 1".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(WorkerPoolError::InvalidConfig(
                "queue_capacity must be at least 1".into(),
            ));
        }
        if self.pool_id.trim().is_empty() {
            return Err(WorkerPoolError::InvalidConfig(
                "pool_id must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Worker pool status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerPoolStatus {
    /// Accepting tasks
    Running,
    /// Closed; workers are finishing queued and in-flight tasks
    Draining,
    /// Every worker has exited
    Stopped,
}

/// Worker pool errors
#[derive(Debug, thiserror::Error)]
pub enum WorkerPoolError {
    /// Invalid configuration
    #[error("invalid worker pool configuration: {0}")]
    InvalidConfig(String),

    /// A worker thread could not be spawned
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Returned by [`WorkerPool::submit`] once the pool has been closed.
///
/// The rejected task is handed back and was never enqueued; recover it with
/// [`into_task`](Self::into_task). The error is `Send + Sync`, so `?` also
/// converts it into boxed or `anyhow` errors when the task is not needed.
#[derive(Debug, thiserror::Error)]
#[error("task queue is closed; task {} was not enqueued", .0.id())]
pub struct QueueClosedError(Task);

impl QueueClosedError {
    pub fn task(&self) -> &Task {
        &self.0
    }

    pub fn into_task(self) -> Task {
        self.0
    }
}

/// Error returned by [`WorkerPool::try_submit`]
#[derive(Debug, thiserror::Error)]
pub enum TrySubmitError {
    /// The queue is at capacity
    #[error("task queue is full; task {} was not enqueued", .0.id())]
    Full(Task),

    /// The pool has been closed
    #[error("task queue is closed; task {} was not enqueued", .0.id())]
    Closed(Task),
}

impl TrySubmitError {
    pub fn into_task(self) -> Task {
        match self {
            TrySubmitError::Full(task) | TrySubmitError::Closed(task) => task,
        }
    }
}

/// Error returned by [`WorkerPool::submit_timeout`]
#[derive(Debug, thiserror::Error)]
pub enum SubmitTimeoutError {
    /// No capacity became available in time
    #[error("timed out waiting for queue capacity; task {} was not enqueued", .0.id())]
    Timeout(Task),

    /// The pool has been closed
    #[error("task queue is closed; task {} was not enqueued", .0.id())]
    Closed(Task),
}

impl SubmitTimeoutError {
    pub fn into_task(self) -> Task {
        match self {
            SubmitTimeoutError::Timeout(task) | SubmitTimeoutError::Closed(task) => task,
        }
    }
}

/// Point-in-time pool statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Tasks accepted into the queue
    pub submitted: usize,
    /// Submissions refused because the pool was closed, full or timed out
    pub rejected: usize,
    /// Tasks picked up by a worker
    pub started: usize,
    pub completed: usize,
    pub failed: usize,
    /// Tasks currently executing
    pub running: usize,
    /// Highest number of tasks observed executing at once
    pub peak_running: usize,
    /// Tasks waiting in the queue
    pub queued: usize,
    /// Workers that have not yet exited
    pub active_workers: usize,
}

/// Fixed-size worker pool draining a bounded task queue
///
/// # Example
///
/// ```
/// use taskpool::{Task, TaskStatus, WorkerPool};
///
/// let pool = WorkerPool::new(3, 10).unwrap();
///
/// let mut handles = Vec::new();
/// for id in 1..=10 {
///     let task = Task::noop(id, 100 + id);
///     handles.push(task.handle());
///     pool.submit(task).unwrap();
/// }
///
/// pool.close();
/// pool.wait();
///
/// assert!(handles.iter().all(|h| h.status() == TaskStatus::Completed));
/// ```
pub struct WorkerPool {
    id: Arc<str>,
    config: WorkerPoolConfig,
    queue: Arc<BoundedQueue<Task>>,
    tracker: Arc<CompletionTracker>,
    counters: Arc<PoolCounters>,
    status: RwLock<WorkerPoolStatus>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a pool with `worker_count` workers and a queue of `queue_capacity`
    pub fn new(worker_count: usize, queue_capacity: usize) -> Result<Self, WorkerPoolError> {
        Self::with_config(WorkerPoolConfig::new(worker_count, queue_capacity))
    }

    /// Create a pool from a configuration; workers start polling immediately
    #[instrument(skip(config), fields(pool_id = %config.pool_id))]
    pub fn with_config(config: WorkerPoolConfig) -> Result<Self, WorkerPoolError> {
        config.validate()?;

        let id: Arc<str> = Arc::from(config.pool_id.as_str());
        let queue = Arc::new(BoundedQueue::new(config.queue_capacity));
        let tracker = Arc::new(CompletionTracker::new(config.worker_count));
        let counters = Arc::new(PoolCounters::default());

        info!(
            pool_id = %id,
            worker_count = config.worker_count,
            queue_capacity = config.queue_capacity,
            "Starting worker pool"
        );

        let mut workers = Vec::with_capacity(config.worker_count);
        for worker_id in 1..=config.worker_count {
            let ctx = WorkerContext {
                pool_id: Arc::clone(&id),
                queue: Arc::clone(&queue),
                tracker: Arc::clone(&tracker),
                counters: Arc::clone(&counters),
            };

            let spawned = thread::Builder::new()
                .name(format!("{id}-worker-{worker_id}"))
                .spawn(move || run_worker(worker_id, ctx));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    error!(pool_id = %id, worker_id, "Failed to spawn worker: {}", e);
                    // Release the workers already running before bailing out.
                    queue.close();
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(WorkerPoolError::Spawn(e));
                }
            }
        }

        Ok(Self {
            id,
            config,
            queue,
            tracker,
            counters,
            status: RwLock::new(WorkerPoolStatus::Running),
            workers: Mutex::new(workers),
        })
    }

    /// Enqueue a task, blocking while the queue is full
    ///
    /// Fails once the pool has been closed, including when the close happens
    /// while this call is blocked.
    pub fn submit(&self, task: Task) -> Result<(), QueueClosedError> {
        let (task_id, job_id) = (task.id(), task.job_id());

        match self.queue.push(task) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                debug!(pool_id = %self.id, task_id, job_id, "Task submitted");
                Ok(())
            }
            Err(e) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                debug!(pool_id = %self.id, task_id, job_id, "Rejected task: pool closed");
                Err(QueueClosedError(e.into_inner()))
            }
        }
    }

    /// Enqueue a task without blocking
    pub fn try_submit(&self, task: Task) -> Result<(), TrySubmitError> {
        let (task_id, job_id) = (task.id(), task.job_id());

        match self.queue.try_push(task) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                debug!(pool_id = %self.id, task_id, job_id, "Task submitted");
                Ok(())
            }
            Err(e) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                debug!(pool_id = %self.id, task_id, job_id, "Rejected task: {}", e);
                Err(match e {
                    TryPushError::Full(task) => TrySubmitError::Full(task),
                    TryPushError::Closed(task) => TrySubmitError::Closed(task),
                })
            }
        }
    }

    /// Enqueue a task, blocking at most `timeout` while the queue is full
    pub fn submit_timeout(&self, task: Task, timeout: Duration) -> Result<(), SubmitTimeoutError> {
        let (task_id, job_id) = (task.id(), task.job_id());

        match self.queue.push_timeout(task, timeout) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                debug!(pool_id = %self.id, task_id, job_id, "Task submitted");
                Ok(())
            }
            Err(e) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                debug!(pool_id = %self.id, task_id, job_id, "Rejected task: {}", e);
                Err(match e {
                    PushTimeoutError::Timeout(task) => SubmitTimeoutError::Timeout(task),
                    PushTimeoutError::Closed(task) => SubmitTimeoutError::Closed(task),
                })
            }
        }
    }

    /// Stop accepting tasks; queued tasks are still executed
    pub fn close(&self) {
        if self.queue.close() {
            let mut status = self.status.write();
            if *status == WorkerPoolStatus::Running {
                *status = WorkerPoolStatus::Draining;
            }
            info!(
                pool_id = %self.id,
                queued = self.queue.len(),
                "Worker pool closed, draining"
            );
        }
    }

    /// Block until every worker has exited
    ///
    /// Returns immediately once the pool is stopped. Blocks indefinitely if
    /// the pool is never closed.
    pub fn wait(&self) {
        self.tracker.wait();
        self.join_workers();
    }

    /// Block until every worker has exited or `timeout` elapses
    ///
    /// Returns `true` if the pool stopped within the timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if !self.tracker.wait_timeout(timeout) {
            return false;
        }
        self.join_workers();
        true
    }

    /// Close the pool and wait for the drain to finish
    pub fn shutdown(self) -> PoolStats {
        self.close();
        self.wait();
        self.stats()
    }

    fn join_workers(&self) {
        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                error!(pool_id = %self.id, thread = %name, "Worker thread panicked");
            }
        }

        let mut status = self.status.write();
        if *status != WorkerPoolStatus::Stopped {
            *status = WorkerPoolStatus::Stopped;
            let stats = self.stats();
            info!(
                pool_id = %self.id,
                completed = stats.completed,
                failed = stats.failed,
                rejected = stats.rejected,
                "Worker pool stopped"
            );
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    pub fn worker_count(&self) -> usize {
        self.config.worker_count
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Number of tasks waiting in the queue
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    pub fn status(&self) -> WorkerPoolStatus {
        *self.status.read()
    }

    pub fn stats(&self) -> PoolStats {
        let c = &self.counters;
        PoolStats {
            submitted: c.submitted.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            started: c.started.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            running: c.running.load(Ordering::Acquire),
            peak_running: c.peak_running.load(Ordering::Acquire),
            queued: self.queue.len(),
            active_workers: c.active_workers.load(Ordering::Acquire),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Workers keep draining on their own; they are not joined here.
        if self.queue.close() {
            debug!(pool_id = %self.id, "Worker pool dropped without close");
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("id", &self.id)
            .field("worker_count", &self.config.worker_count)
            .field("queue_capacity", &self.config.queue_capacity)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
