use std::cmp;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_std::future::timeout;
use async_std::task;

use crate::connection::Connection;
use crate::error::Error;
use crate::options::MySqlConnectOptions;
use crate::pool::connection::{close_floating, Floating, Live, PoolConnection};
use crate::pool::idle::IdleQueue;
use crate::pool::metrics::{AcquirePhase, PoolGaugeSnapshot};
use crate::pool::options::{PoolConnectionMetadata, PoolOptions};
use crate::pool::size::PoolSize;

pub(super) struct PoolInner {
    pub(super) connect_options: MySqlConnectOptions,
    pub(super) options: PoolOptions,
    size: PoolSize,
    idle: IdleQueue,
    waiting: AtomicU32,
    closed: AtomicBool,
}

impl PoolInner {
    pub(super) fn new_arc(connect_options: MySqlConnectOptions, options: PoolOptions) -> Arc<Self> {
        let max = options.max_connections;

        let inner = Arc::new(Self {
            size: PoolSize::new(max),
            idle: IdleQueue::new(max),
            waiting: AtomicU32::new(0),
            closed: AtomicBool::new(false),
            connect_options,
            options,
        });

        spawn_housekeeper(&inner);

        inner
    }

    pub(super) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(super) fn size(&self) -> u32 {
        self.size.current()
    }

    pub(super) fn num_idle(&self) -> usize {
        self.idle.len()
    }

    pub(super) fn num_waiting(&self) -> u32 {
        self.waiting.load(Ordering::Acquire)
    }

    /// Live occupancy plus configured bounds, in the shape spec.md's gauge
    /// callback wants; used both by [`Pool::metrics`](crate::pool::Pool::metrics)
    /// and the housekeeper's periodic `record_pool_gauges` emission.
    pub(super) fn gauge_snapshot(&self) -> PoolGaugeSnapshot {
        let idle_count = self.num_idle() as u32;
        let used_count = self.size().saturating_sub(idle_count);

        PoolGaugeSnapshot {
            idle_count,
            used_count,
            pending_request_count: self.num_waiting(),
            idle_min: self.options.min_connections,
            idle_max: self.options.max_connections,
            max: self.options.max_connections,
        }
    }

    /// See spec.md's acquire algorithm: prefer an idle connection, then a
    /// fresh slot, then wait in FIFO order; every path is re-tried until
    /// `connection_timeout` elapses.
    pub(super) async fn acquire(self: &Arc<Self>) -> crate::Result<PoolConnection> {
        self.options.metrics.acquire_called();

        let start = Instant::now();
        let deadline = start + self.options.connection_timeout;

        loop {
            if self.is_closed() {
                return Err(Error::PoolClosed);
            }

            if let Some(idle) = self.idle.try_acquire() {
                if let Some(conn) = self.recycle(idle, start).await? {
                    return Ok(conn);
                }
                continue;
            }

            if let Some(guard) = self.size.try_increase() {
                match self.open(deadline).await {
                    Ok(conn) => {
                        guard.commit();
                        self.options.metrics.connection_acquired(start.elapsed());
                        return Ok(PoolConnection::new(
                            Floating::new(conn, self.size.decrease_on_drop()),
                            Arc::clone(self),
                        ));
                    }
                    Err(err) => {
                        drop(guard);

                        if Instant::now() >= deadline {
                            self.options.metrics.acquire_timed_out(AcquirePhase::Connecting);
                            self.options.metrics.record_connection_timeout();
                            return Err(err);
                        }

                        log::warn!("error establishing a pooled connection: {err}");
                        continue;
                    }
                }
            }

            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(remaining) => remaining,
                None => {
                    self.options.metrics.acquire_timed_out(AcquirePhase::Waiting);
                    self.options.metrics.record_connection_timeout();
                    return Err(Error::AcquireTimeout);
                }
            };

            self.waiting.fetch_add(1, Ordering::AcqRel);
            let woken = timeout(remaining, self.idle.acquire()).await;
            self.waiting.fetch_sub(1, Ordering::AcqRel);

            match woken {
                Ok(idle) => {
                    self.options.metrics.permit_wait_time(start.elapsed());
                    self.options.metrics.record_connection_wait_time(start.elapsed());

                    if self.is_closed() {
                        let (idle, guard) = idle.into_parts();
                        close_floating(idle.live.conn, guard).await;
                        return Err(Error::PoolClosed);
                    }

                    if let Some(conn) = self.recycle(idle, start).await? {
                        return Ok(conn);
                    }
                }
                Err(_) => {
                    self.options.metrics.acquire_timed_out(AcquirePhase::Waiting);
                    self.options.metrics.record_connection_timeout();
                    return Err(Error::AcquireTimeout);
                }
            }
        }
    }

    pub(super) fn try_acquire(self: &Arc<Self>) -> Option<PoolConnection> {
        if self.is_closed() {
            return None;
        }

        let idle = self.idle.try_acquire()?;

        if idle.is_expired(self.options.max_lifetime, self.options.idle_timeout) {
            let (idle, guard) = idle.into_parts();
            let pool = Arc::clone(self);
            task::spawn(async move {
                close_floating(idle.live.conn, guard).await;
                pool.idle.notify_all();
            });
            return None;
        }

        Some(PoolConnection::new(idle.into_live(), Arc::clone(self)))
    }

    /// Validates an idle connection (expiry, liveness ping, `before_acquire`
    /// hook) before handing it back. `Ok(None)` means the connection was
    /// discarded and the caller should try again.
    async fn recycle(
        self: &Arc<Self>,
        idle: Floating<crate::pool::connection::Idle>,
        start: Instant,
    ) -> crate::Result<Option<PoolConnection>> {
        if idle.is_expired(self.options.max_lifetime, self.options.idle_timeout) {
            self.options.metrics.acquire_timed_out(AcquirePhase::ClosingInvalidConnection);
            let (idle, guard) = idle.into_parts();
            close_floating(idle.live.conn, guard).await;
            self.idle.notify_all();
            return Ok(None);
        }

        let metadata = idle.metadata();
        let mut floating = idle.into_live();

        if self.options.test_before_acquire {
            if floating.inner.conn.ping().await.is_err() {
                let (live, guard) = floating.into_parts();
                close_floating(live.conn, guard).await;
                self.idle.notify_all();
                return Ok(None);
            }
        }

        if let Some(callback) = &self.options.before_acquire {
            match callback(&mut floating.inner.conn, metadata).await {
                Ok(true) => {}
                _ => {
                    let (live, guard) = floating.into_parts();
                    close_floating(live.conn, guard).await;
                    self.idle.notify_all();
                    return Ok(None);
                }
            }
        }

        self.options.metrics.connection_acquired(start.elapsed());
        Ok(Some(PoolConnection::new(floating, Arc::clone(self))))
    }

    async fn open(&self, deadline: Instant) -> crate::Result<Connection> {
        let remaining = deadline.checked_duration_since(Instant::now()).ok_or(Error::AcquireTimeout)?;

        let start = Instant::now();
        let mut conn = timeout(remaining, Connection::establish(&self.connect_options))
            .await
            .map_err(|_| Error::AcquireTimeout)??;
        self.options.metrics.record_connection_create_time(start.elapsed());
        conn.attach_metrics(Arc::clone(&self.options.metrics));

        if let Some(callback) = &self.options.after_connect {
            let metadata = PoolConnectionMetadata {
                age: Duration::ZERO,
                idle_for: Duration::ZERO,
            };
            callback(&mut conn, metadata).await?;
        }

        Ok(conn)
    }

    /// Releasing can't be done synchronously from `Drop`, so it's handed
    /// off to a detached task; see spec.md's release algorithm.
    pub(super) fn release(self: &Arc<Self>, live: Floating<Live>) {
        let pool = Arc::clone(self);

        task::spawn(async move {
            pool.release_inner(live).await;
        });
    }

    async fn release_inner(self: Arc<Self>, mut floating: Floating<Live>) {
        if self.is_closed() {
            let (live, guard) = floating.into_parts();
            close_floating(live.conn, guard).await;
            return;
        }

        if floating.inner.conn.set_autocommit(true).await.is_err() || floating.inner.conn.rollback().await.is_err() {
            let (live, guard) = floating.into_parts();
            close_floating(live.conn, guard).await;
            self.idle.notify_all();
            return;
        }

        let expired = self
            .options
            .max_lifetime
            .is_some_and(|max| floating.inner.created.elapsed() >= max);

        if expired {
            let (live, guard) = floating.into_parts();
            close_floating(live.conn, guard).await;
            self.idle.notify_all();
            return;
        }

        if let Some(callback) = &self.options.after_release {
            let metadata = floating.metadata();

            match callback(&mut floating.inner.conn, metadata).await {
                Ok(true) => {}
                _ => {
                    let (live, guard) = floating.into_parts();
                    close_floating(live.conn, guard).await;
                    self.idle.notify_all();
                    return;
                }
            }
        }

        self.idle.release(floating.into_idle());
    }

    /// Fails every current and future waiter with `PoolClosed`, closes
    /// idle connections immediately, and leaves in-use connections to be
    /// closed as they're individually released.
    pub(super) async fn close(self: &Arc<Self>) {
        self.closed.store(true, Ordering::Release);
        self.idle.notify_all();

        for idle in self.idle.drain() {
            let (idle, guard) = idle.into_parts();
            close_floating(idle.live.conn, guard).await;
        }
    }
}

fn spawn_housekeeper(pool: &Arc<PoolInner>) {
    let pool = Arc::clone(pool);

    task::spawn(async move {
        let mut quiet_samples = 0u32;

        loop {
            let sleep_for = housekeeper_interval(&pool);
            task::sleep(sleep_for).await;

            if pool.is_closed() {
                break;
            }

            reap_idle(&pool).await;
            maintain_min_connections(&pool).await;

            if pool.options.adaptive_sizing {
                adaptive_sample(&pool, &mut quiet_samples);
            }

            pool.options.metrics.record_pool_gauges(pool.gauge_snapshot());
        }
    });
}

fn housekeeper_interval(pool: &PoolInner) -> Duration {
    let mut interval = Duration::from_secs(30);

    if let Some(idle_timeout) = pool.options.idle_timeout {
        interval = cmp::min(interval, idle_timeout);
    }

    if let Some(max_lifetime) = pool.options.max_lifetime {
        interval = cmp::min(interval, max_lifetime);
    }

    if pool.options.adaptive_sizing {
        interval = cmp::min(interval, pool.options.adaptive_interval);
    }

    cmp::max(interval, Duration::from_secs(1))
}

/// Drains the whole idle queue, closes everything past `idle_timeout` or
/// `max_lifetime`, and pushes the rest straight back.
async fn reap_idle(pool: &Arc<PoolInner>) {
    let drained = pool.idle.drain();

    for idle in drained {
        if idle.is_expired(pool.options.max_lifetime, pool.options.idle_timeout) {
            let (idle, guard) = idle.into_parts();
            close_floating(idle.live.conn, guard).await;
        } else {
            pool.idle.release(idle);
        }
    }
}

async fn maintain_min_connections(pool: &Arc<PoolInner>) {
    let deadline = Instant::now() + pool.options.connection_timeout;

    while pool.size() < pool.options.min_connections.min(pool.options.max_connections) {
        let Some(guard) = pool.size.try_increase() else { break };

        match pool.open(deadline).await {
            Ok(conn) => {
                guard.commit();
                pool.idle.release(Floating::new(conn, pool.size.decrease_on_drop()).into_idle());
            }
            Err(err) => {
                drop(guard);
                log::warn!("error maintaining min_connections: {err}");
                break;
            }
        }
    }
}

/// Grows the pool by one when waiters are queued and there's room; shrinks
/// it by one when nothing has waited for several consecutive samples and
/// there's idle slack above `min_connections`. Never crosses either bound.
fn adaptive_sample(pool: &Arc<PoolInner>, quiet_samples: &mut u32) {
    const QUIET_SAMPLES_BEFORE_SHRINK: u32 = 3;

    let waiting = pool.num_waiting();
    let idle = pool.num_idle() as u32;
    let size = pool.size();

    if waiting > 0 {
        *quiet_samples = 0;

        if size < pool.options.max_connections {
            let pool = Arc::clone(pool);
            task::spawn(async move {
                let deadline = Instant::now() + pool.options.connection_timeout;
                if let Some(guard) = pool.size.try_increase() {
                    match pool.open(deadline).await {
                        Ok(conn) => {
                            guard.commit();
                            pool.idle.release(Floating::new(conn, pool.size.decrease_on_drop()).into_idle());
                        }
                        Err(_) => drop(guard),
                    }
                }
            });
        }

        return;
    }

    *quiet_samples += 1;

    if *quiet_samples >= QUIET_SAMPLES_BEFORE_SHRINK && idle > 0 && size > pool.options.min_connections {
        if let Some(idle_conn) = pool.idle.try_acquire() {
            *quiet_samples = 0;
            let pool = Arc::clone(pool);
            task::spawn(async move {
                let (idle_conn, guard) = idle_conn.into_parts();
                close_floating(idle_conn.live.conn, guard).await;
            });
        }
    }
}
