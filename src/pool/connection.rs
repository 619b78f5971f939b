use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_std::task;

use crate::connection::Connection;
use crate::pool::inner::PoolInner;
use crate::pool::options::PoolConnectionMetadata;
use crate::pool::size::DecreaseOnDrop;

/// A connection that counts against the pool's size, in its checked-out
/// form.
pub(super) struct Live {
    pub(super) conn: Connection,
    pub(super) created: Instant,
}

/// A connection that counts against the pool's size, sitting in the idle
/// queue.
pub(super) struct Idle {
    pub(super) live: Live,
    pub(super) since: Instant,
}

/// Wraps a connection (checked out or idle) together with the guard that
/// decrements the pool's size counter when the connection is finally
/// dropped, whichever state it's in at the time.
pub(super) struct Floating<T> {
    pub(super) inner: T,
    pub(super) guard: DecreaseOnDrop,
}

impl<T> Floating<T> {
    fn map<U>(self, f: impl FnOnce(T) -> U) -> Floating<U> {
        Floating {
            inner: f(self.inner),
            guard: self.guard,
        }
    }

    /// Splits the wrapper apart so the inner value and the guard can be
    /// moved independently (e.g. to close the connection before the guard
    /// decrements the counter).
    pub(super) fn into_parts(self) -> (T, DecreaseOnDrop) {
        (self.inner, self.guard)
    }
}

impl Floating<Live> {
    pub(super) fn new(conn: Connection, guard: DecreaseOnDrop) -> Self {
        Floating {
            inner: Live {
                conn,
                created: Instant::now(),
            },
            guard,
        }
    }

    pub(super) fn into_idle(self) -> Floating<Idle> {
        self.map(|live| Idle {
            since: Instant::now(),
            live,
        })
    }

    pub(super) fn metadata(&self) -> PoolConnectionMetadata {
        PoolConnectionMetadata {
            age: self.inner.created.elapsed(),
            idle_for: Duration::ZERO,
        }
    }
}

impl Floating<Idle> {
    pub(super) fn into_live(self) -> Floating<Live> {
        self.map(|idle| idle.live)
    }

    pub(super) fn metadata(&self) -> PoolConnectionMetadata {
        PoolConnectionMetadata {
            age: self.inner.live.created.elapsed(),
            idle_for: self.inner.since.elapsed(),
        }
    }

    /// Whether this idle connection has outlived `max_lifetime` or sat idle
    /// longer than `idle_timeout`.
    pub(super) fn is_expired(&self, max_lifetime: Option<Duration>, idle_timeout: Option<Duration>) -> bool {
        max_lifetime.is_some_and(|max| self.inner.live.created.elapsed() >= max)
            || idle_timeout.is_some_and(|timeout| self.inner.since.elapsed() >= timeout)
    }
}

/// Closes the underlying connection and drops `guard`, freeing the size
/// slot it was reserved against.
pub(super) async fn close_floating(conn: Connection, guard: DecreaseOnDrop) {
    let _ = conn.close().await;
    drop(guard);
}

/// A connection checked out from [`Pool`](super::Pool).
///
/// Returned to the pool's idle queue on drop; use [`PoolConnection::close`]
/// to discard it instead.
pub struct PoolConnection {
    live: Option<Floating<Live>>,
    pool: Arc<PoolInner>,
    leaked: Option<Arc<AtomicBool>>,
    checked_out_at: Instant,
}

impl std::fmt::Debug for PoolConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConnection")
            .field("checked_out_at", &self.checked_out_at)
            .finish()
    }
}

const DEREF_ERR: &str = "(bug) connection already released to pool";

impl Deref for PoolConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.live.as_ref().expect(DEREF_ERR).inner.conn
    }
}

impl DerefMut for PoolConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        &mut self.live.as_mut().expect(DEREF_ERR).inner.conn
    }
}

impl PoolConnection {
    pub(super) fn new(live: Floating<Live>, pool: Arc<PoolInner>) -> Self {
        let leaked = pool.options.leak_detection_threshold.map(|threshold| {
            let alive = Arc::new(AtomicBool::new(true));
            let watch = Arc::clone(&alive);

            task::spawn(async move {
                task::sleep(threshold).await;

                if watch.load(Ordering::Acquire) {
                    log::warn!(
                        "possible connection leak: checked out for over {:?} without being returned",
                        threshold
                    );
                }
            });

            alive
        });

        Self {
            live: Some(live),
            pool,
            leaked,
            checked_out_at: Instant::now(),
        }
    }

    /// How long this connection has been open since it was established.
    pub fn age(&self) -> Duration {
        self.live.as_ref().expect(DEREF_ERR).inner.created.elapsed()
    }

    /// Detaches the connection from the pool and closes it, rather than
    /// returning it to the idle queue.
    pub async fn close(mut self) -> crate::Result<()> {
        self.pool.options.metrics.record_connection_use_time(self.checked_out_at.elapsed());
        let (live, guard) = self.live.take().expect(DEREF_ERR).into_parts();
        let result = live.conn.close().await;
        drop(guard);
        result
    }
}

impl Drop for PoolConnection {
    fn drop(&mut self) {
        if let Some(leaked) = &self.leaked {
            leaked.store(false, Ordering::Release);
        }

        if let Some(live) = self.live.take() {
            self.pool.options.metrics.record_connection_use_time(self.checked_out_at.elapsed());
            self.pool.release(live);
        }
    }
}
