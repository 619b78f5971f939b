//! Metrics collection for [`Pool`](crate::pool::Pool).
//!
//! A no-op collector (the default, `None`) costs nothing; plug in
//! [`SimplePoolMetrics`] for an in-process, allocation-free implementation,
//! or implement [`PoolMetricsCollector`] yourself to forward into an
//! external telemetry backend.

mod simple;

use std::time::Duration;

pub use simple::{AcquireTimeoutsPerPhase, SimplePoolMetrics, SimplePoolMetricsSnapshot, SimpleTimingStats};

/// Describes a type that can collect metrics from [`Pool`](crate::pool::Pool).
///
/// Set it with [`PoolOptions::metrics_collector`](crate::pool::PoolOptions::metrics_collector).
/// All methods have empty default bodies, so a collector only needs to
/// override what it cares about.
pub trait PoolMetricsCollector: Send + Sync + 'static {
    /// Called once per [`Pool::acquire()`](crate::pool::Pool::acquire).
    fn acquire_called(&self) {}

    /// How long `acquire()` spent waiting for a size-slot permit or an idle
    /// connection to appear, before one became available. Not called if
    /// `acquire()` timed out during this wait; see `acquire_timed_out`.
    fn permit_wait_time(&self, duration: Duration) {
        drop(duration);
    }

    /// `acquire()` exceeded its configured timeout while in `phase`.
    fn acquire_timed_out(&self, phase: AcquirePhase) {
        drop(phase);
    }

    /// A connection was successfully handed back from `acquire()`, having
    /// taken `total_wait` from the initial call.
    fn connection_acquired(&self, total_wait: Duration) {
        drop(total_wait);
    }

    /// A single `query`/`execute` round trip completed, from writing the
    /// request to the initial response (column count, or an immediate
    /// `OK`/`ERR`) arriving; draining the resulting row stream is not
    /// included, since a caller can pause between `next()` calls
    /// indefinitely.
    fn record_operation_duration(&self, duration: Duration) {
        drop(duration);
    }

    /// A row was decoded off a [`RowStream`](crate::connection::RowStream).
    /// Called once per row as the stream is drained, not once per
    /// completed operation.
    fn record_returned_rows(&self, rows: u64) {
        drop(rows);
    }

    /// A new connection finished `Connection::establish` (including TLS
    /// and authentication), having taken `duration`.
    fn record_connection_create_time(&self, duration: Duration) {
        drop(duration);
    }

    /// Same wait accounted for by [`permit_wait_time`](Self::permit_wait_time),
    /// reported under the name spec.md's metrics facade uses.
    fn record_connection_wait_time(&self, duration: Duration) {
        drop(duration);
    }

    /// How long a connection was checked out of the pool before being
    /// returned or closed.
    fn record_connection_use_time(&self, duration: Duration) {
        drop(duration);
    }

    /// `acquire()` timed out; called alongside `acquire_timed_out`, without
    /// the phase breakdown, under the name spec.md's metrics facade uses.
    fn record_connection_timeout(&self) {}

    /// A batched snapshot of pool occupancy, published once per
    /// housekeeper tick rather than as individual gauge calls.
    fn record_pool_gauges(&self, gauges: PoolGaugeSnapshot) {
        drop(gauges);
    }
}

/// A batched snapshot of pool occupancy and configured bounds, passed to
/// [`PoolMetricsCollector::record_pool_gauges`].
///
/// `idle_min`/`idle_max`/`max` are this pool's static configuration
/// (`min_connections`/`max_connections` twice over, named the way OTel's
/// `db.client.connections.idle.min`/`.idle.max`/`.max` semantic
/// conventions do); `idle_count`/`used_count`/`pending_request_count` are
/// the live sample taken at emission time.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct PoolGaugeSnapshot {
    pub idle_count: u32,
    pub used_count: u32,
    pub pending_request_count: u32,
    pub idle_min: u32,
    pub idle_max: u32,
    pub max: u32,
}

/// A no-op collector; the default when [`PoolOptions::metrics_collector`](crate::pool::PoolOptions::metrics_collector) is unset.
pub(crate) struct NoopMetrics;

impl PoolMetricsCollector for NoopMetrics {}

/// The phase [`Pool::acquire()`](crate::pool::Pool::acquire) was in when it timed out.
///
/// `acquire()` passes through several asynchronous stages; which ones run
/// depends on the pool's configuration and whether an idle connection was
/// available.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum AcquirePhase {
    /// Waiting for a size-slot permit or an idle connection.
    Waiting,

    /// An idle connection was found; pinging it to confirm it's alive.
    /// Only runs if [`PoolOptions::test_before_acquire`](crate::pool::PoolOptions::test_before_acquire) is set.
    TestBeforeAcquire,

    /// Running the user-supplied `before_acquire` callback on an idle
    /// connection that passed `TestBeforeAcquire` (or skipped it).
    BeforeAcquireCallback,

    /// An idle connection was rejected (expired, failed its ping, or its
    /// `before_acquire` callback declined it) and is being closed.
    ClosingInvalidConnection,

    /// No usable idle connection was available; opening a new one.
    Connecting,

    /// A new connection was opened; running the user-supplied
    /// `after_connect` callback.
    AfterConnectCallback,

    /// Opening a new connection failed, or its `after_connect` callback
    /// errored; waiting before retrying.
    Backoff,
}

pub(super) const ACQUIRE_PHASE_COUNT: usize = 7;

impl AcquirePhase {
    pub(super) fn index(self) -> usize {
        match self {
            AcquirePhase::Waiting => 0,
            AcquirePhase::TestBeforeAcquire => 1,
            AcquirePhase::BeforeAcquireCallback => 2,
            AcquirePhase::ClosingInvalidConnection => 3,
            AcquirePhase::Connecting => 4,
            AcquirePhase::AfterConnectCallback => 5,
            AcquirePhase::Backoff => 6,
        }
    }

    const ALL: [AcquirePhase; ACQUIRE_PHASE_COUNT] = [
        AcquirePhase::Waiting,
        AcquirePhase::TestBeforeAcquire,
        AcquirePhase::BeforeAcquireCallback,
        AcquirePhase::ClosingInvalidConnection,
        AcquirePhase::Connecting,
        AcquirePhase::AfterConnectCallback,
        AcquirePhase::Backoff,
    ];

    pub(super) fn iter() -> impl Iterator<Item = AcquirePhase> {
        Self::ALL.into_iter()
    }
}
