//! Bounded, closable FIFO queue
//!
//! Items and the `closed` flag live under one lock, so "empty", "full" and
//! "closed" are always observed together. Closing is one-way and wakes every
//! blocked producer and consumer.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Upper bound on storage reserved up front by [`BoundedQueue::new`]
const INITIAL_ALLOCATION: usize = 1024;

/// Outcome of a dequeue attempt
#[derive(Debug, PartialEq, Eq)]
pub enum Dequeue<T> {
    /// An item was removed from the queue
    Item(T),
    /// The queue is open but currently empty (non-blocking pops only)
    Empty,
    /// The queue is closed and fully drained
    Closed,
}

impl<T> Dequeue<T> {
    /// Convert into the dequeued item, if any
    pub fn into_item(self) -> Option<T> {
        match self {
            Dequeue::Item(item) => Some(item),
            Dequeue::Empty | Dequeue::Closed => None,
        }
    }
}

/// Error returned by [`BoundedQueue::push`]
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PushError<T> {
    #[error("queue is closed")]
    Closed(T),
}

impl<T> PushError<T> {
    /// Recover the rejected item
    pub fn into_inner(self) -> T {
        match self {
            PushError::Closed(item) => item,
        }
    }
}

/// Error returned by [`BoundedQueue::try_push`]
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TryPushError<T> {
    #[error("queue is full")]
    Full(T),
    #[error("queue is closed")]
    Closed(T),
}

impl<T> TryPushError<T> {
    pub fn into_inner(self) -> T {
        match self {
            TryPushError::Full(item) | TryPushError::Closed(item) => item,
        }
    }
}

/// Error returned by [`BoundedQueue::push_timeout`]
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PushTimeoutError<T> {
    #[error("timed out waiting for queue capacity")]
    Timeout(T),
    #[error("queue is closed")]
    Closed(T),
}

impl<T> PushTimeoutError<T> {
    pub fn into_inner(self) -> T {
        match self {
            PushTimeoutError::Timeout(item) | PushTimeoutError::Closed(item) => item,
        }
    }
}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Bounded multi-producer multi-consumer FIFO queue with explicit closure
pub struct BoundedQueue<T> {
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Create an open queue holding at most `capacity` items (minimum 1)
    ///
    /// `capacity` is a bound, not a reservation: storage grows with the
    /// number of queued items.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity.min(INITIAL_ALLOCATION)),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Enqueue an item, blocking while the queue is full
    pub fn push(&self, item: T) -> Result<(), PushError<T>> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(PushError::Closed(item));
            }
            if state.items.len() < self.capacity {
                break;
            }
            self.not_full.wait(&mut state);
        }

        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Enqueue an item without blocking
    pub fn try_push(&self, item: T) -> Result<(), TryPushError<T>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TryPushError::Closed(item));
        }
        if state.items.len() >= self.capacity {
            return Err(TryPushError::Full(item));
        }

        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Enqueue an item, blocking at most `timeout` for free capacity
    ///
    /// A timeout too large to express as a deadline (e.g. `Duration::MAX`)
    /// waits like [`push`](Self::push).
    pub fn push_timeout(&self, item: T, timeout: Duration) -> Result<(), PushTimeoutError<T>> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self
                .push(item)
                .map_err(|PushError::Closed(item)| PushTimeoutError::Closed(item));
        };
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(PushTimeoutError::Closed(item));
            }
            if state.items.len() < self.capacity {
                break;
            }
            if self.not_full.wait_until(&mut state, deadline).timed_out() {
                // Capacity or closure may have arrived with the timeout.
                if state.closed {
                    return Err(PushTimeoutError::Closed(item));
                }
                if state.items.len() >= self.capacity {
                    return Err(PushTimeoutError::Timeout(item));
                }
                break;
            }
        }

        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Dequeue an item, blocking while the queue is empty and open
    ///
    /// Never returns [`Dequeue::Empty`].
    pub fn pop(&self) -> Dequeue<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Dequeue::Item(item);
            }
            if state.closed {
                return Dequeue::Closed;
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Dequeue an item without blocking
    pub fn try_pop(&self) -> Dequeue<T> {
        let mut state = self.state.lock();
        match state.items.pop_front() {
            Some(item) => {
                drop(state);
                self.not_full.notify_one();
                Dequeue::Item(item)
            }
            None if state.closed => Dequeue::Closed,
            None => Dequeue::Empty,
        }
    }

    /// Close the queue; returns `true` for the call that performed the close
    pub fn close(&self) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        drop(state);

        self.not_empty.notify_all();
        self.not_full.notify_all();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
