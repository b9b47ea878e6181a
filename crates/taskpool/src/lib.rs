//! # taskpool
//!
//! A fixed-size worker pool draining a bounded, closable task queue.
//!
//! ## Features
//!
//! - **Bounded concurrency**: exactly `W` worker threads, so at most `W` tasks run at once
//! - **Backpressure**: `submit` blocks while the queue holds `N` pending tasks
//! - **Graceful drain**: `close` stops new submissions while queued tasks still run
//! - **Failure isolation**: a task that errors or panics is marked `Failed`; the worker moves on
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   submit    ┌──────────────────────────┐
//! │   Producer   │ ──────────▶ │  BoundedQueue<Task> (N)  │
//! └──────────────┘   close     └────────────┬─────────────┘
//!                                           │ pop
//!                      ┌────────────────────┼────────────────────┐
//!                      ▼                    ▼                    ▼
//!               ┌────────────┐       ┌────────────┐       ┌────────────┐
//!               │  worker-1  │       │  worker-2  │  ...  │  worker-W  │
//!               └─────┬──────┘       └─────┬──────┘       └─────┬──────┘
//!                     └────────────────────┼────────────────────┘
//!                                          ▼
//!                              CompletionTracker (wait)
//! ```
//!
//! ## Example
//!
//! ```
//! use taskpool::prelude::*;
//!
//! let pool = WorkerPool::new(3, 10)?;
//!
//! let task = Task::new(1, 101, || Err(TaskError::failed("upstream unavailable")));
//! let handle = task.handle();
//! pool.submit(task)?;
//!
//! pool.close();
//! pool.wait();
//!
//! assert_eq!(handle.status(), TaskStatus::Failed);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod completion;
pub mod pool;
pub mod queue;
pub mod task;
mod worker;

/// Prelude for common imports
pub mod prelude {
    pub use crate::pool::{
        PoolStats, QueueClosedError, SubmitTimeoutError, TrySubmitError, WorkerPool,
        WorkerPoolConfig, WorkerPoolError, WorkerPoolStatus,
    };
    pub use crate::task::{JobId, Task, TaskError, TaskHandle, TaskId, TaskSnapshot, TaskStatus};
}

// Re-export key types at crate root
pub use completion::CompletionTracker;
pub use pool::{
    PoolStats, QueueClosedError, SubmitTimeoutError, TrySubmitError, WorkerPool,
    WorkerPoolConfig, WorkerPoolError, WorkerPoolStatus,
};
pub use queue::{BoundedQueue, Dequeue};
pub use task::{
    JobId, Task, TaskError, TaskHandle, TaskId, TaskSnapshot, TaskStatus, TransitionError,
    WorkResult,
};
pub use worker::WorkerId;
