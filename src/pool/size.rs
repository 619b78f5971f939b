use std::mem;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

struct Shared {
    size: AtomicU32,
    max_size: u32,
}

/// Tracks the number of live connections (idle + checked out) against a
/// ceiling, without holding a lock: `try_increase` is a single
/// compare-exchange loop, and the returned guard decrements on drop unless
/// explicitly committed or cancelled.
///
/// Cloning shares the same counter; a clone travels with a checked-out
/// connection for as long as it lives, independent of the `PoolInner` that
/// created it.
#[derive(Clone)]
pub(super) struct PoolSize(Arc<Shared>);

pub(super) struct IncreaseGuard(DecreaseOnDrop);

pub(super) struct DecreaseOnDrop {
    shared: Arc<Shared>,
    dropped: bool,
}

impl PoolSize {
    pub fn new(max_size: u32) -> Self {
        PoolSize(Arc::new(Shared {
            size: AtomicU32::new(0),
            max_size,
        }))
    }

    pub fn current(&self) -> u32 {
        self.0.size.load(Ordering::Acquire)
    }

    pub fn max(&self) -> u32 {
        self.0.max_size
    }

    /// Reserves one slot against `max_size`, returning `None` if the pool
    /// is already full. The caller must either `commit()` the guard (the
    /// connection stays counted) or let it drop (the slot is freed again).
    pub fn try_increase(&self) -> Option<IncreaseGuard> {
        let mut size = self.current();

        while size < self.0.max_size {
            match self.0.size.compare_exchange(size, size + 1, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return Some(IncreaseGuard(self.decrease_on_drop())),
                Err(actual) => size = actual,
            }
        }

        None
    }

    pub fn decrease_on_drop(&self) -> DecreaseOnDrop {
        DecreaseOnDrop {
            shared: Arc::clone(&self.0),
            dropped: false,
        }
    }
}

impl IncreaseGuard {
    /// Keeps the slot counted permanently (the connection this guard was
    /// reserved for is now live) by leaking the inner decrement-on-drop.
    pub fn commit(self) {
        self.0.cancel();
    }
}

impl DecreaseOnDrop {
    pub fn cancel(mut self) {
        self.dropped = true;
        mem::forget(self);
    }
}

impl Drop for DecreaseOnDrop {
    fn drop(&mut self) {
        assert!(!self.dropped, "double-dropped pool size guard");
        self.dropped = true;
        self.shared.size.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_increase_respects_max_size() {
        let size = PoolSize::new(2);

        let a = size.try_increase().expect("first slot");
        let b = size.try_increase().expect("second slot");
        assert_eq!(size.current(), 2);
        assert!(size.try_increase().is_none());

        a.commit();
        b.commit();
        assert_eq!(size.current(), 2);
    }

    #[test]
    fn dropping_an_uncommitted_guard_frees_the_slot() {
        let size = PoolSize::new(1);

        {
            let _guard = size.try_increase().expect("one slot available");
            assert_eq!(size.current(), 1);
        }

        assert_eq!(size.current(), 0);
        assert!(size.try_increase().is_some());
    }

    #[test]
    fn decrease_on_drop_outlives_the_pool_size_it_was_cloned_from() {
        let size = PoolSize::new(1);
        let guard = size.try_increase().expect("one slot available").0;
        drop(size);

        assert_eq!(guard.shared.size.load(Ordering::Acquire), 1);
        drop(guard);
    }

    #[test]
    fn commit_keeps_the_slot_counted_after_the_guard_is_gone() {
        let size = PoolSize::new(1);
        let guard = size.try_increase().expect("one slot available");
        assert_eq!(size.current(), 1);

        guard.commit();
        assert_eq!(size.current(), 1, "committing must not free the slot it reserved");

        // the connection's own long-lived guard is created separately and
        // is the only thing that can free the slot now.
        let long_lived = size.decrease_on_drop();
        drop(long_lived);
        assert_eq!(size.current(), 0);
    }
}
