//! End-to-end behaviour of the worker pool
//!
//! Work units are deterministic; coordination uses barriers and channels
//! instead of randomized sleeps.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use taskpool::prelude::*;

fn recording_task(id: TaskId, seen: &Arc<Mutex<Vec<TaskId>>>) -> Task {
    let seen = Arc::clone(seen);
    Task::new(id, 100 + id, move || {
        seen.lock().unwrap().push(id);
        Ok(())
    })
}

#[test_log::test]
fn test_three_workers_ten_tasks_all_terminal() {
    let pool = WorkerPool::new(3, 10).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<TaskHandle> = (1..=10)
        .map(|id| {
            let task = recording_task(id, &seen);
            let handle = task.handle();
            pool.submit(task).unwrap();
            handle
        })
        .collect();

    pool.close();
    pool.wait();

    assert_eq!(pool.status(), WorkerPoolStatus::Stopped);
    assert_eq!(handles.len(), 10);
    for handle in &handles {
        assert_eq!(handle.status(), TaskStatus::Completed);
        assert_eq!(handle.job_id(), 100 + handle.id());
    }

    let stats = pool.stats();
    assert_eq!(stats.submitted, 10);
    assert_eq!(stats.started, 10);
    assert_eq!(stats.completed + stats.failed, 10);
    assert_eq!(stats.queued, 0);
}

#[test_log::test]
fn test_every_task_processed_exactly_once() {
    let pool = WorkerPool::new(4, 8).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for id in 1..=200 {
        pool.submit(recording_task(id, &seen)).unwrap();
    }
    pool.close();
    pool.wait();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 200, "no task may run twice");

    let unique: HashSet<TaskId> = seen.iter().copied().collect();
    let expected: HashSet<TaskId> = (1..=200).collect();
    assert_eq!(unique, expected, "no task may be skipped");
}

#[test_log::test]
fn test_no_tasks_returns_immediately() {
    let pool = WorkerPool::new(1, 1).unwrap();
    pool.close();
    assert!(pool.wait_timeout(Duration::from_secs(5)));

    let stats = pool.stats();
    assert_eq!(stats.submitted, 0);
    assert_eq!(stats.active_workers, 0);
}

#[test_log::test]
fn test_concurrency_never_exceeds_worker_count() {
    const WORKERS: usize = 3;

    let pool = WorkerPool::new(WORKERS, 4).unwrap();
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<TaskHandle> = (1..=30)
        .map(|id| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let task = Task::new(id, 100 + id, move || {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(2));
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            });
            let handle = task.handle();
            pool.submit(task).unwrap();
            handle
        })
        .collect();

    pool.close();
    pool.wait();

    assert!(peak.load(Ordering::SeqCst) <= WORKERS);
    assert!(pool.stats().peak_running <= WORKERS);
    assert!(handles.iter().all(|h| h.status() == TaskStatus::Completed));
}

#[test_log::test]
fn test_workers_run_in_parallel() {
    const WORKERS: usize = 3;

    // Every task waits for all of its peers; this only finishes if W tasks
    // really execute at the same time.
    let pool = WorkerPool::new(WORKERS, WORKERS).unwrap();
    let barrier = Arc::new(Barrier::new(WORKERS));

    for id in 1..=WORKERS as TaskId {
        let barrier = Arc::clone(&barrier);
        pool.submit(Task::new(id, 100 + id, move || {
            barrier.wait();
            Ok(())
        }))
        .unwrap();
    }

    pool.close();
    assert!(pool.wait_timeout(Duration::from_secs(10)));
    assert_eq!(pool.stats().peak_running, WORKERS);
}

#[test_log::test]
fn test_submit_blocks_when_queue_full() {
    const CAPACITY: usize = 2;

    let pool = Arc::new(WorkerPool::new(1, CAPACITY).unwrap());
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let (started_tx, started_rx) = mpsc::channel::<()>();

    // Occupy the single worker until released.
    pool.submit(Task::new(1, 101, move || {
        started_tx.send(()).ok();
        release_rx.recv().ok();
        Ok(())
    }))
    .unwrap();
    started_rx.recv().unwrap();

    // Fill the queue to capacity without blocking.
    for id in 2..=(1 + CAPACITY as TaskId) {
        pool.try_submit(Task::noop(id, 100 + id)).unwrap();
    }
    assert_eq!(pool.queued(), CAPACITY);

    // The N+1-th submission blocks.
    let producer = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.submit(Task::noop(99, 199)))
    };
    thread::sleep(Duration::from_millis(50));
    assert!(!producer.is_finished());
    assert_eq!(pool.queued(), CAPACITY);

    // Freeing the worker lets it dequeue, which unblocks the producer.
    release_tx.send(()).unwrap();
    producer.join().unwrap().unwrap();

    pool.close();
    pool.wait();
    assert_eq!(pool.stats().completed, 2 + CAPACITY);
}

#[test_log::test]
fn test_try_submit_reports_full() {
    let pool = WorkerPool::new(1, 1).unwrap();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let (started_tx, started_rx) = mpsc::channel::<()>();

    pool.submit(Task::new(1, 101, move || {
        started_tx.send(()).ok();
        release_rx.recv().ok();
        Ok(())
    }))
    .unwrap();
    started_rx.recv().unwrap();

    pool.try_submit(Task::noop(2, 102)).unwrap();
    let err = pool.try_submit(Task::noop(3, 103)).unwrap_err();
    assert!(matches!(err, TrySubmitError::Full(_)));
    assert_eq!(err.into_task().id(), 3);

    let err = pool
        .submit_timeout(Task::noop(4, 104), Duration::from_millis(20))
        .unwrap_err();
    assert!(matches!(err, SubmitTimeoutError::Timeout(_)));

    release_tx.send(()).unwrap();
    let stats = pool.shutdown();
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.rejected, 2);
}

#[test_log::test]
fn test_submit_after_close_fails_and_queue_unchanged() {
    let pool = WorkerPool::new(1, 4).unwrap();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let (started_tx, started_rx) = mpsc::channel::<()>();

    pool.submit(Task::new(1, 101, move || {
        started_tx.send(()).ok();
        release_rx.recv().ok();
        Ok(())
    }))
    .unwrap();
    started_rx.recv().unwrap();
    pool.submit(Task::noop(2, 102)).unwrap();

    pool.close();
    assert_eq!(pool.queued(), 1);

    let rejected = Task::noop(3, 103);
    let handle = rejected.handle();
    let err = pool.submit(rejected).unwrap_err();
    assert_eq!(err.task().id(), 3);
    assert_eq!(pool.queued(), 1);

    assert!(matches!(
        pool.try_submit(Task::noop(4, 104)),
        Err(TrySubmitError::Closed(_))
    ));
    assert!(matches!(
        pool.submit_timeout(Task::noop(5, 105), Duration::from_millis(5)),
        Err(SubmitTimeoutError::Closed(_))
    ));

    release_tx.send(()).unwrap();
    pool.wait();

    assert_eq!(handle.status(), TaskStatus::Pending);
    assert_eq!(pool.stats().completed, 2);
}

#[test_log::test]
fn test_close_unblocks_waiting_producer() {
    let pool = Arc::new(WorkerPool::new(1, 1).unwrap());
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let (started_tx, started_rx) = mpsc::channel::<()>();

    pool.submit(Task::new(1, 101, move || {
        started_tx.send(()).ok();
        release_rx.recv().ok();
        Ok(())
    }))
    .unwrap();
    started_rx.recv().unwrap();
    pool.submit(Task::noop(2, 102)).unwrap();

    let producer = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.submit(Task::noop(3, 103)).map_err(|e| e.into_task().id()))
    };
    thread::sleep(Duration::from_millis(50));

    pool.close();
    assert_eq!(producer.join().unwrap(), Err(3));

    release_tx.send(()).unwrap();
    pool.wait();
    assert_eq!(pool.stats().completed, 2);
}

#[test_log::test]
fn test_failed_tasks_do_not_stop_the_pool() {
    let pool = WorkerPool::new(2, 16).unwrap();

    let handles: Vec<TaskHandle> = (1..=20)
        .map(|id| {
            let task = match id % 4 {
                0 => Task::new(id, 100 + id, move || Err(TaskError::failed(format!("task {id}")))),
                1 => Task::new(id, 100 + id, || panic!("simulated crash")),
                _ => Task::noop(id, 100 + id),
            };
            let handle = task.handle();
            pool.submit(task).unwrap();
            handle
        })
        .collect();

    pool.close();
    pool.wait();

    for handle in &handles {
        assert!(handle.is_terminal(), "task {} left {:?}", handle.id(), handle.status());
        let expected = if handle.id() % 4 < 2 {
            TaskStatus::Failed
        } else {
            TaskStatus::Completed
        };
        assert_eq!(handle.status(), expected);
    }

    let stats = pool.stats();
    assert_eq!(stats.completed, 10);
    assert_eq!(stats.failed, 10);
}

#[test_log::test]
fn test_snapshot_after_drain() {
    let pool = WorkerPool::with_config(
        WorkerPoolConfig::new(1, 1).with_pool_id("snapshot-test"),
    )
    .unwrap();
    assert_eq!(pool.id(), "snapshot-test");

    let task = Task::new(7, 107, || Err(TaskError::failed("quota exceeded")));
    let handle = task.handle();
    pool.submit(task).unwrap();
    pool.close();
    pool.wait();

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.id, 7);
    assert_eq!(snapshot.job_id, 107);
    assert_eq!(snapshot.status, TaskStatus::Failed);
    assert_eq!(snapshot.failure.as_deref(), Some("task failed: quota exceeded"));
    assert!(snapshot.started_at.is_some());
    assert!(snapshot.finished_at.is_some());

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["status"], "failed");
}

#[test_log::test]
fn test_huge_queue_capacity_starts_and_drains() {
    let config = WorkerPoolConfig::new(1, 1usize << 45);
    assert!(config.validate().is_ok());

    let pool = WorkerPool::with_config(config).unwrap();
    assert_eq!(pool.queue_capacity(), 1usize << 45);

    let seen = Arc::new(Mutex::new(Vec::new()));
    for id in 1..=3 {
        pool.submit(recording_task(id, &seen)).unwrap();
    }
    pool.close();
    pool.wait();

    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
}

#[test_log::test]
fn test_wait_forever_timeouts() {
    let pool = WorkerPool::new(2, 2).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for id in 1..=5 {
        pool.submit_timeout(recording_task(id, &seen), Duration::MAX)
            .unwrap();
    }
    pool.close();

    assert!(pool.wait_timeout(Duration::MAX));
    assert_eq!(pool.status(), WorkerPoolStatus::Stopped);
    assert_eq!(seen.lock().unwrap().len(), 5);
}

#[test_log::test]
fn test_submit_errors_propagate_into_anyhow() {
    fn produce(pool: &WorkerPool, count: TaskId) -> anyhow::Result<()> {
        for id in 1..=count {
            pool.submit(Task::noop(id, 100 + id))?;
        }
        Ok(())
    }

    let pool = WorkerPool::new(1, 4).unwrap();
    produce(&pool, 3).unwrap();
    pool.close();

    let err = produce(&pool, 1).unwrap_err();
    let closed = err.downcast::<QueueClosedError>().unwrap();
    assert_eq!(closed.into_task().id(), 1);

    let stats = pool.shutdown();
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.rejected, 1);
}

