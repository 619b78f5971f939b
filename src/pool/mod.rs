//! A connection pool over [`crate::connection::Connection`].
//!
//! [`Pool::acquire`] follows spec.md's acquire algorithm: pop an idle
//! connection if one exists, else open a new one if under
//! `max_connections`, else queue FIFO-fair behind the other waiters. A
//! background housekeeper reaps expired idle connections, tops up
//! `min_connections`, and optionally adapts pool size to recent demand.

mod connection;
mod idle;
mod inner;
pub mod metrics;
mod options;
mod size;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::options::MySqlConnectOptions;

pub use connection::PoolConnection;
pub use metrics::PoolGaugeSnapshot;
pub use options::{PoolConnectionMetadata, PoolOptions};

use inner::PoolInner;

/// A pool of [`Connection`](crate::connection::Connection)s.
///
/// Cheaply `Clone`-able; every clone shares the same underlying pool, and
/// the pool is torn down only once the last clone is dropped (or
/// [`Pool::close`] is called).
#[derive(Clone)]
pub struct Pool(Arc<PoolInner>);

/// A snapshot of [`Pool`]'s current occupancy, returned by [`Pool::status`].
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct PoolStatus {
    /// Connections currently open, idle or in use.
    pub total: u32,
    /// Connections currently checked out.
    pub active: u32,
    /// Connections currently idle.
    pub idle: u32,
    /// Tasks currently blocked in [`Pool::acquire`].
    pub waiting: u32,
}

impl Pool {
    /// Connects with [`PoolOptions::new`]'s defaults, opening one
    /// connection eagerly to surface configuration errors immediately.
    pub async fn connect(url: &str) -> crate::Result<Self> {
        PoolOptions::new().connect(url).await
    }

    /// Returns a [`PoolOptions`] builder for a pool with custom settings.
    pub fn options() -> PoolOptions {
        PoolOptions::new()
    }

    pub(crate) async fn with_options(connect_options: MySqlConnectOptions, options: PoolOptions) -> crate::Result<Self> {
        let min_connections = options.min_connections;
        let inner = PoolInner::new_arc(connect_options, options);

        if min_connections > 0 {
            // Establishing one connection (even with `min_connections == 0`
            // this would be skipped) also validates the connect options.
            let conn = inner.acquire().await?;
            drop(conn);
        }

        Ok(Pool(inner))
    }

    pub(crate) fn lazy_with_options(connect_options: MySqlConnectOptions, options: PoolOptions) -> Self {
        Pool(PoolInner::new_arc(connect_options, options))
    }

    /// Acquires a connection, waiting up to
    /// [`PoolOptions::connection_timeout`] for one to become available.
    pub async fn acquire(&self) -> crate::Result<PoolConnection> {
        self.0.acquire().await
    }

    /// Returns an idle connection immediately, or `None` without waiting.
    pub fn try_acquire(&self) -> Option<PoolConnection> {
        self.0.try_acquire()
    }

    /// Closes the pool: every current and future waiter fails with
    /// [`Error::PoolClosed`], idle connections are closed immediately, and
    /// in-use connections are closed as they're released. Resolves once
    /// the idle connections have finished closing.
    pub async fn close(&self) {
        self.0.close().await;
    }

    /// Whether [`Pool::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }

    /// Total connections currently open (idle + in use).
    pub fn size(&self) -> u32 {
        self.0.size()
    }

    /// Connections currently sitting idle.
    pub fn idle(&self) -> usize {
        self.0.num_idle()
    }

    /// A point-in-time occupancy snapshot.
    pub fn status(&self) -> PoolStatus {
        let total = self.0.size();
        let idle = self.0.num_idle() as u32;

        PoolStatus {
            total,
            active: total.saturating_sub(idle),
            idle,
            waiting: self.0.num_waiting(),
        }
    }

    /// A gauges-shaped occupancy snapshot, independent of whichever
    /// [`PoolMetricsCollector`](metrics::PoolMetricsCollector) is
    /// registered; this is sampled directly from the pool's own counters,
    /// the same ones fed to `record_pool_gauges` on each housekeeper tick.
    pub fn metrics(&self) -> PoolGaugeSnapshot {
        self.0.gauge_snapshot()
    }

    pub fn max_connections(&self) -> u32 {
        self.0.options.max_connections
    }

    pub fn min_connections(&self) -> u32 {
        self.0.options.min_connections
    }

    pub fn connection_timeout(&self) -> Duration {
        self.0.options.connection_timeout
    }

    pub fn max_lifetime(&self) -> Option<Duration> {
        self.0.options.max_lifetime
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.0.options.idle_timeout
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("size", &self.0.size())
            .field("num_idle", &self.0.num_idle())
            .field("is_closed", &self.0.is_closed())
            .finish()
    }
}
