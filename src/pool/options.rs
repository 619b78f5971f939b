use std::fmt::{self, Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use log::LevelFilter;

use crate::connection::Connection;
use crate::error::Error;
use crate::options::MySqlConnectOptions;
use crate::pool::metrics::PoolMetricsCollector;
use crate::pool::Pool;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type ConnectCallback =
    Arc<dyn Fn(&mut Connection, PoolConnectionMetadata) -> BoxFuture<'_, crate::Result<()>> + Send + Sync>;

type AcceptCallback =
    Arc<dyn Fn(&mut Connection, PoolConnectionMetadata) -> BoxFuture<'_, crate::Result<bool>> + Send + Sync>;

/// Configuration for a [`Pool`].
///
/// See each setter for defaults; [`PoolOptions::new`] documents the full
/// set.
pub struct PoolOptions {
    pub(crate) min_connections: u32,
    pub(crate) max_connections: u32,
    pub(crate) connection_timeout: Duration,
    pub(crate) idle_timeout: Option<Duration>,
    pub(crate) max_lifetime: Option<Duration>,
    pub(crate) validation_timeout: Duration,
    pub(crate) leak_detection_threshold: Option<Duration>,
    pub(crate) adaptive_sizing: bool,
    pub(crate) adaptive_interval: Duration,
    pub(crate) test_before_acquire: bool,
    pub(crate) acquire_slow_threshold: Duration,
    pub(crate) acquire_slow_level: LevelFilter,

    pub(crate) after_connect: Option<ConnectCallback>,
    pub(crate) before_acquire: Option<AcceptCallback>,
    pub(crate) after_release: Option<AcceptCallback>,

    pub(crate) metrics: Arc<dyn PoolMetricsCollector>,
}

impl Clone for PoolOptions {
    fn clone(&self) -> Self {
        PoolOptions {
            min_connections: self.min_connections,
            max_connections: self.max_connections,
            connection_timeout: self.connection_timeout,
            idle_timeout: self.idle_timeout,
            max_lifetime: self.max_lifetime,
            validation_timeout: self.validation_timeout,
            leak_detection_threshold: self.leak_detection_threshold,
            adaptive_sizing: self.adaptive_sizing,
            adaptive_interval: self.adaptive_interval,
            test_before_acquire: self.test_before_acquire,
            acquire_slow_threshold: self.acquire_slow_threshold,
            acquire_slow_level: self.acquire_slow_level,
            after_connect: self.after_connect.clone(),
            before_acquire: self.before_acquire.clone(),
            after_release: self.after_release.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Metadata handed to a [`PoolOptions`] callback alongside the connection.
#[derive(Debug)]
#[non_exhaustive]
pub struct PoolConnectionMetadata {
    /// Time since the connection was first established. `Duration::ZERO`
    /// for `after_connect`.
    pub age: Duration,

    /// Time the connection spent in the idle queue. `Duration::ZERO` for
    /// `after_connect`/`after_release`.
    pub idle_for: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolOptions {
    /// A "sane" default configuration, suitable for light-duty applications
    /// and tests. Production applications will likely want to revisit at
    /// least [`max_connections`][Self::max_connections].
    pub fn new() -> Self {
        Self {
            min_connections: 0,
            max_connections: 10,
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(10 * 60)),
            max_lifetime: Some(Duration::from_secs(30 * 60)),
            validation_timeout: Duration::from_secs(5),
            leak_detection_threshold: None,
            adaptive_sizing: false,
            adaptive_interval: Duration::from_secs(30),
            test_before_acquire: true,
            acquire_slow_threshold: Duration::from_secs(2),
            acquire_slow_level: LevelFilter::Warn,
            after_connect: None,
            before_acquire: None,
            after_release: None,
            metrics: Arc::new(crate::pool::metrics::NoopMetrics),
        }
    }

    /// Sets the maximum number of connections the pool will open.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn get_max_connections(&self) -> u32 {
        self.max_connections
    }

    /// Sets the minimum number of idle connections to maintain; the
    /// housekeeper opens connections to make up any deficit on a
    /// best-effort basis. Clamped internally to `max_connections`.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn get_min_connections(&self) -> u32 {
        self.min_connections
    }

    /// Caps the total time [`Pool::acquire`](crate::pool::Pool::acquire) may spend waiting
    /// for a permit, validating an idle connection, and opening a new one.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn get_connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    /// Closes idle connections that have sat in the idle queue longer than
    /// this. `None` disables idle reaping.
    pub fn idle_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.idle_timeout = timeout.into();
        self
    }

    pub fn get_idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    /// Closes connections older than this, regardless of activity.
    /// `None` lets connections live until idle-reaped or explicitly closed.
    pub fn max_lifetime(mut self, lifetime: impl Into<Option<Duration>>) -> Self {
        self.max_lifetime = lifetime.into();
        self
    }

    pub fn get_max_lifetime(&self) -> Option<Duration> {
        self.max_lifetime
    }

    /// How long an idle connection may go between liveness pings before
    /// `test_before_acquire` re-validates it with a fresh one.
    pub fn validation_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout = timeout;
        self
    }

    pub fn get_validation_timeout(&self) -> Duration {
        self.validation_timeout
    }

    /// If set, a connection checked out longer than this without being
    /// returned logs a leak warning exactly once.
    pub fn leak_detection_threshold(mut self, threshold: impl Into<Option<Duration>>) -> Self {
        self.leak_detection_threshold = threshold.into();
        self
    }

    pub fn get_leak_detection_threshold(&self) -> Option<Duration> {
        self.leak_detection_threshold
    }

    /// Enables the adaptive sizer: the housekeeper opportunistically opens
    /// a connection when waiters are queued and closes an idle one when
    /// there has been no demand for several samples, never leaving the
    /// `[min_connections, max_connections]` band.
    pub fn adaptive_sizing(mut self, enabled: bool) -> Self {
        self.adaptive_sizing = enabled;
        self
    }

    pub fn get_adaptive_sizing(&self) -> bool {
        self.adaptive_sizing
    }

    /// How often the adaptive sizer samples pool demand.
    pub fn adaptive_interval(mut self, interval: Duration) -> Self {
        self.adaptive_interval = interval;
        self
    }

    pub fn get_adaptive_interval(&self) -> Duration {
        self.adaptive_interval
    }

    /// If `true` (the default), [`Connection::ping`] is called on an idle
    /// connection before it's handed back from `acquire()`.
    pub fn test_before_acquire(mut self, test: bool) -> Self {
        self.test_before_acquire = test;
        self
    }

    pub fn get_test_before_acquire(&self) -> bool {
        self.test_before_acquire
    }

    /// Threshold past which a slow `acquire()` is logged at
    /// `acquire_slow_level` rather than treated as routine.
    pub fn acquire_slow_threshold(mut self, threshold: Duration) -> Self {
        self.acquire_slow_threshold = threshold;
        self
    }

    pub fn get_acquire_slow_threshold(&self) -> Duration {
        self.acquire_slow_threshold
    }

    /// Log level used for `acquire()` calls exceeding `acquire_slow_threshold`.
    pub fn acquire_slow_level(mut self, level: LevelFilter) -> Self {
        self.acquire_slow_level = level;
        self
    }

    pub fn get_acquire_slow_level(&self) -> LevelFilter {
        self.acquire_slow_level
    }

    /// Registers a metrics collector; see [`PoolMetricsCollector`].
    pub fn metrics_collector(mut self, collector: Arc<dyn PoolMetricsCollector>) -> Self {
        self.metrics = collector;
        self
    }

    /// Runs after a new connection is established, before it is returned
    /// to any caller. If it errors, the connection is dropped and the
    /// error is surfaced to the `acquire()` (or `min_connections`
    /// maintenance) that triggered the connect.
    pub fn after_connect<F>(mut self, callback: F) -> Self
    where
        for<'c> F: Fn(&'c mut Connection, PoolConnectionMetadata) -> BoxFuture<'c, crate::Result<()>>
            + Send
            + Sync
            + 'static,
    {
        self.after_connect = Some(Arc::new(callback));
        self
    }

    /// Runs on a previously-idle connection before it's handed back from
    /// `acquire()`. Returning `Ok(false)` or an error discards the
    /// connection and `acquire()` tries the next one.
    pub fn before_acquire<F>(mut self, callback: F) -> Self
    where
        for<'c> F: Fn(&'c mut Connection, PoolConnectionMetadata) -> BoxFuture<'c, crate::Result<bool>>
            + Send
            + Sync
            + 'static,
    {
        self.before_acquire = Some(Arc::new(callback));
        self
    }

    /// Runs on a connection before it's returned to the idle queue.
    /// Returning `Ok(false)` or an error closes the connection instead.
    pub fn after_release<F>(mut self, callback: F) -> Self
    where
        for<'c> F: Fn(&'c mut Connection, PoolConnectionMetadata) -> BoxFuture<'c, crate::Result<bool>>
            + Send
            + Sync
            + 'static,
    {
        self.after_release = Some(Arc::new(callback));
        self
    }

    /// Builds the pool, opening `max(1, min_connections)` connections
    /// eagerly so configuration errors surface immediately.
    pub async fn connect(self, url: &str) -> Result<Pool, Error> {
        self.connect_with(url.parse()?).await
    }

    /// Like [`connect`](Self::connect), taking already-built connect options.
    pub async fn connect_with(self, options: MySqlConnectOptions) -> Result<Pool, Error> {
        Pool::with_options(options, self).await
    }

    /// Builds the pool without opening any connections synchronously; if
    /// `min_connections` is set, the housekeeper opens them in the
    /// background.
    pub fn connect_lazy(self, url: &str) -> Result<Pool, Error> {
        Ok(self.connect_lazy_with(url.parse()?))
    }

    /// Like [`connect_lazy`](Self::connect_lazy), taking already-built connect options.
    pub fn connect_lazy_with(self, options: MySqlConnectOptions) -> Pool {
        Pool::lazy_with_options(options, self)
    }
}

impl Debug for PoolOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolOptions")
            .field("min_connections", &self.min_connections)
            .field("max_connections", &self.max_connections)
            .field("connection_timeout", &self.connection_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .field("max_lifetime", &self.max_lifetime)
            .field("validation_timeout", &self.validation_timeout)
            .field("leak_detection_threshold", &self.leak_detection_threshold)
            .field("adaptive_sizing", &self.adaptive_sizing)
            .field("test_before_acquire", &self.test_before_acquire)
            .finish()
    }
}
