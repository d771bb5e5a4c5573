use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// Why a `try_push` did not enqueue.
#[derive(Debug)]
pub(crate) enum PushError<T> {
    /// Queue at capacity; the message is handed back.
    Full(T),
    /// Queue closed; the message is handed back.
    Closed(T),
}

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Bounded FIFO shared between one producer and one consumer.
///
/// The only shared state between the caller and the channel's loops.
/// `close` wakes every waiter; a closed queue still drains items that
/// were accepted before the close.
pub(crate) struct MessageQueue<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> MessageQueue<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity.min(64)),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Non-blocking enqueue; rejects when full or closed.
    pub(crate) fn try_push(&self, item: T) -> std::result::Result<(), PushError<T>> {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        if inner.closed {
            return Err(PushError::Closed(item));
        }
        if inner.items.len() >= self.capacity {
            return Err(PushError::Full(item));
        }
        inner.items.push_back(item);
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Blocking enqueue; waits for space. Returns the item back when the
    /// queue closes while waiting.
    pub(crate) fn push(&self, item: T) -> std::result::Result<(), T> {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        loop {
            if inner.closed {
                return Err(item);
            }
            if inner.items.len() < self.capacity {
                inner.items.push_back(item);
                drop(inner);
                self.not_empty.notify_one();
                return Ok(());
            }
            inner = self
                .not_full
                .wait(inner)
                .expect("queue lock poisoned");
        }
    }

    /// Blocking dequeue. Returns `None` only once the queue is closed and
    /// fully drained.
    pub(crate) fn pop(&self) -> Option<T> {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        loop {
            if let Some(item) = inner.items.pop_front() {
                drop(inner);
                self.not_full.notify_one();
                return Some(item);
            }
            if inner.closed {
                return None;
            }
            inner = self
                .not_empty
                .wait(inner)
                .expect("queue lock poisoned");
        }
    }

    /// Non-blocking dequeue.
    pub(crate) fn try_pop(&self) -> Option<T> {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        let item = inner.items.pop_front();
        if item.is_some() {
            drop(inner);
            self.not_full.notify_one();
        }
        item
    }

    /// Close the queue and wake all waiters. Buffered items stay poppable.
    pub(crate) fn close(&self) {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        inner.closed = true;
        drop(inner);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.inner.lock().expect("queue lock poisoned").items.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().expect("queue lock poisoned").items.len()
    }
}
