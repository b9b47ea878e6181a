//! Task definition and lifecycle
//!
//! A [`Task`] is created by the producer, handed to the pool, and then owned by
//! exactly one worker which runs it. Status is kept in a shared record so the
//! producer can keep a [`TaskHandle`] and inspect the final outcome after the
//! pool has drained.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Task identifier
pub type TaskId = u64;

/// Identifier of the job a task belongs to
pub type JobId = u64;

/// Result returned by a unit of work
pub type WorkResult = Result<(), TaskError>;

/// Unit of work executed by a task
pub type Work = Box<dyn FnOnce() -> WorkResult + Send + 'static>;

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet picked up by a worker
    Pending,
    /// A worker is executing the task
    Running,
    /// Work finished successfully
    Completed,
    /// Work reported an error or panicked
    Failed,
}

impl TaskStatus {
    /// Whether the status is final
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Running => "Running",
            TaskStatus::Completed => "Completed",
            TaskStatus::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Failure reported by a unit of work
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// The work returned an error
    #[error("task failed: {0}")]
    Failed(String),

    /// The work panicked
    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Create a failure with the given message
    pub fn failed(message: impl Into<String>) -> Self {
        TaskError::Failed(message.into())
    }
}

/// Rejected status transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid task status transition from {from} to {to}")]
pub struct TransitionError {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

#[derive(Debug)]
struct StatusRecord {
    status: TaskStatus,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    failure: Option<String>,
}

#[derive(Debug)]
struct TaskState {
    id: TaskId,
    job_id: JobId,
    created_at: DateTime<Utc>,
    record: Mutex<StatusRecord>,
}

impl TaskState {
    fn transition(&self, next: TaskStatus) -> Result<(), TransitionError> {
        self.transition_with(next, None)
    }

    fn transition_with(
        &self,
        next: TaskStatus,
        failure: Option<String>,
    ) -> Result<(), TransitionError> {
        let mut record = self.record.lock();
        if !record.status.can_transition_to(next) {
            return Err(TransitionError {
                from: record.status,
                to: next,
            });
        }

        let now = Utc::now();
        match next {
            TaskStatus::Running => record.started_at = Some(now),
            TaskStatus::Completed | TaskStatus::Failed => record.finished_at = Some(now),
            TaskStatus::Pending => {}
        }
        record.status = next;
        record.failure = failure;
        Ok(())
    }

    fn status(&self) -> TaskStatus {
        self.record.lock().status
    }

    fn snapshot(&self) -> TaskSnapshot {
        let record = self.record.lock();
        TaskSnapshot {
            id: self.id,
            job_id: self.job_id,
            status: record.status,
            created_at: self.created_at,
            started_at: record.started_at,
            finished_at: record.finished_at,
            failure: record.failure.clone(),
        }
    }
}

/// A unit of work with identity and status
///
/// # Example
///
/// ```
/// use taskpool::{Task, TaskError, TaskStatus};
///
/// let mut ok = Task::new(1, 101, || Ok(()));
/// assert_eq!(ok.run(), TaskStatus::Completed);
///
/// let mut bad = Task::new(2, 102, || Err(TaskError::failed("disk full")));
/// let handle = bad.handle();
/// assert_eq!(bad.run(), TaskStatus::Failed);
/// assert_eq!(handle.failure().as_deref(), Some("task failed: disk full"));
/// ```
pub struct Task {
    state: Arc<TaskState>,
    // Behind a lock only so `Task` (and errors carrying it) are `Sync`;
    // `run` takes `&mut self` and never contends on it.
    work: Mutex<Option<Work>>,
}

impl Task {
    /// Create a pending task that runs `work`
    pub fn new<F>(id: TaskId, job_id: JobId, work: F) -> Self
    where
        F: FnOnce() -> WorkResult + Send + 'static,
    {
        Self {
            state: Arc::new(TaskState {
                id,
                job_id,
                created_at: Utc::now(),
                record: Mutex::new(StatusRecord {
                    status: TaskStatus::Pending,
                    started_at: None,
                    finished_at: None,
                    failure: None,
                }),
            }),
            work: Mutex::new(Some(Box::new(work))),
        }
    }

    /// Create a task whose work completes immediately
    pub fn noop(id: TaskId, job_id: JobId) -> Self {
        Self::new(id, job_id, || Ok(()))
    }

    pub fn id(&self) -> TaskId {
        self.state.id
    }

    pub fn job_id(&self) -> JobId {
        self.state.job_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.state.created_at
    }

    pub fn status(&self) -> TaskStatus {
        self.state.status()
    }

    /// Read-only view that outlives the task's hand-off to a worker
    pub fn handle(&self) -> TaskHandle {
        TaskHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Execute the work synchronously and return the final status
    ///
    /// The work is consumed on the first call. Later calls leave the status
    /// untouched and return it.
    pub fn run(&mut self) -> TaskStatus {
        let Some(work) = self.work.get_mut().take() else {
            return self.status();
        };

        if self.state.transition(TaskStatus::Running).is_err() {
            return self.status();
        }

        let outcome = match catch_unwind(AssertUnwindSafe(work)) {
            Ok(result) => result,
            Err(payload) => Err(TaskError::Panicked(panic_message(payload.as_ref()))),
        };

        // Running -> terminal is always legal here; the worker is the only writer.
        let _ = match outcome {
            Ok(()) => self.state.transition(TaskStatus::Completed),
            Err(error) => self
                .state
                .transition_with(TaskStatus::Failed, Some(error.to_string())),
        };

        self.status()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.state.id)
            .field("job_id", &self.state.job_id)
            .field("status", &self.status())
            .field("created_at", &self.state.created_at)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Shared read-only view of a task's status
#[derive(Debug, Clone)]
pub struct TaskHandle {
    state: Arc<TaskState>,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.state.id
    }

    pub fn job_id(&self) -> JobId {
        self.state.job_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.state.created_at
    }

    pub fn status(&self) -> TaskStatus {
        self.state.status()
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Failure message, if the task failed
    pub fn failure(&self) -> Option<String> {
        self.state.record.lock().failure.clone()
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        self.state.snapshot()
    }
}

/// Point-in-time copy of a task's state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub job_id: JobId,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub failure: Option<String>,
}
