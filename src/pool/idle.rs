//! The idle queue: a FIFO-fair bag of connections not currently checked
//! out.
//!
//! Fairness comes from [`event_listener::Event`]: a waiter registers a
//! listener *before* re-checking the queue, so a `release()` landing
//! between the check and the listen is never missed.

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_queue::ArrayQueue;
use event_listener::Event;

use crate::pool::connection::{Floating, Idle};

pub(super) struct IdleQueue {
    queue: ArrayQueue<Floating<Idle>>,
    // Kept separately because `ArrayQueue::len()` spins until head and tail
    // agree, which can stall indefinitely under contention.
    len: AtomicUsize,
    released: Event,
}

impl IdleQueue {
    pub(super) fn new(capacity: u32) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1) as usize),
            len: AtomicUsize::new(0),
            released: Event::new(),
        }
    }

    pub(super) fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub(super) fn try_acquire(&self) -> Option<Floating<Idle>> {
        let idle = self.queue.pop()?;
        self.len.fetch_sub(1, Ordering::AcqRel);
        Some(idle)
    }

    /// Waits until a connection appears in the queue. Callers race this
    /// against their own acquire deadline.
    pub(super) async fn acquire(&self) -> Floating<Idle> {
        loop {
            let listener = self.released.listen();

            if let Some(idle) = self.try_acquire() {
                return idle;
            }

            listener.await;

            if let Some(idle) = self.try_acquire() {
                return idle;
            }
        }
    }

    pub(super) fn release(&self, idle: Floating<Idle>) {
        if self.queue.push(idle).is_ok() {
            self.len.fetch_add(1, Ordering::AcqRel);
            self.released.notify(1);
        }
        // If the queue is already at capacity (only possible if
        // `max_connections` was lowered while connections were checked
        // out) the connection's guard drops here, closing it implicitly.
    }

    /// Wakes every waiter so they can observe a closed pool or a freed
    /// size slot without holding a connection.
    pub(super) fn notify_all(&self) {
        self.released.notify(usize::MAX);
    }

    /// Removes and returns every idle connection, for `Pool::close()`.
    pub(super) fn drain(&self) -> Vec<Floating<Idle>> {
        let mut drained = Vec::with_capacity(self.len());
        while let Some(idle) = self.try_acquire() {
            drained.push(idle);
        }
        drained
    }
}
