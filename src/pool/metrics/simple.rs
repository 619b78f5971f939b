use std::cmp;
use std::fmt::{self, Formatter};
use std::ops::Index;
use std::sync::atomic::{self, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::pool::metrics::{AcquirePhase, PoolMetricsCollector, ACQUIRE_PHASE_COUNT};

/// A simple but useful metrics collector for [`Pool`](crate::pool::Pool): in-process,
/// allocation-free after construction, with exponentially-smoothed timing
/// stats. Pass [`SimplePoolMetrics::collector`] to
/// [`PoolOptions::metrics_collector`](crate::pool::PoolOptions::metrics_collector) and read
/// [`SimplePoolMetrics::snapshot`] on whatever interval suits your
/// application.
#[derive(Clone)]
pub struct SimplePoolMetrics {
    inner: Arc<SimpleMetricsInner>,
}

/// A point-in-time snapshot taken by [`SimplePoolMetrics::snapshot`].
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct SimplePoolMetricsSnapshot {
    /// Total calls to `acquire()`.
    pub acquire_calls: u64,

    /// Time spent waiting for a size-slot permit or idle connection.
    pub permit_wait_time: SimpleTimingStats,

    /// Total time `acquire()` took to return a connection.
    pub acquire_time: SimpleTimingStats,

    /// Total number of `acquire()` timeouts.
    pub acquire_timeouts: u64,

    /// `acquire()` timeouts broken down by the phase they occurred in.
    pub acquire_timeouts_per_phase: AcquireTimeoutsPerPhase,
}

/// Timing statistics for one metric tracked by [`SimplePoolMetrics`].
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct SimpleTimingStats {
    /// Number of samples folded into this statistic.
    pub sample_count: u64,
    /// Minimum observed duration, or [`Duration::ZERO`] if no samples yet.
    pub min: Duration,
    /// Exponential moving average of observed durations.
    pub average: Duration,
    /// Maximum observed duration.
    pub max: Duration,
}

/// Counts of `acquire()` timeouts, indexable by [`AcquirePhase`].
#[derive(Debug, Clone)]
pub struct AcquireTimeoutsPerPhase([u64; ACQUIRE_PHASE_COUNT]);

impl Index<AcquirePhase> for AcquireTimeoutsPerPhase {
    type Output = u64;

    fn index(&self, phase: AcquirePhase) -> &u64 {
        &self.0[phase.index()]
    }
}

struct SimpleMetricsInner {
    ema_coefficient: f64,
    acquire_calls: AtomicU64,
    permit_wait_time: AtomicTimingStats,
    acquire_time: AtomicTimingStats,
    acquire_timeouts: AtomicU64,
    acquire_timeouts_per_phase: [AtomicU64; ACQUIRE_PHASE_COUNT],
}

#[derive(Default)]
struct AtomicTimingStats {
    sample_count: AtomicU64,
    min_nanos: AtomicU64,
    average_nanos: AtomicU64,
    max_nanos: AtomicU64,
}

impl Default for SimplePoolMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SimplePoolMetrics {
    /// Constructs with a default smoothing coefficient of `0.01`.
    pub fn new() -> SimplePoolMetrics {
        Self::with_ema_coefficient(0.01)
    }

    /// Constructs with the given [exponential moving average] coefficient
    /// `α`: larger values make `average` track recent samples more closely
    /// at the cost of stability.
    ///
    /// ### Panics
    /// If `ema_coefficient` is not a normal number in `(0, 1)`.
    ///
    /// [exponential moving average]: https://en.wikipedia.org/wiki/Moving_average#Exponential_moving_average
    pub fn with_ema_coefficient(ema_coefficient: f64) -> Self {
        assert!(ema_coefficient.is_normal());
        assert!(ema_coefficient > 0.0 && ema_coefficient < 1.0);

        SimplePoolMetrics {
            inner: Arc::new(SimpleMetricsInner {
                ema_coefficient,
                acquire_calls: AtomicU64::new(0),
                permit_wait_time: AtomicTimingStats::default(),
                acquire_time: AtomicTimingStats::default(),
                acquire_timeouts: AtomicU64::new(0),
                acquire_timeouts_per_phase: Default::default(),
            }),
        }
    }

    /// The collector instance to pass to
    /// [`PoolOptions::metrics_collector`](crate::pool::PoolOptions::metrics_collector).
    pub fn collector(&self) -> Arc<dyn PoolMetricsCollector> {
        Arc::clone(&self.inner) as Arc<dyn PoolMetricsCollector>
    }

    /// Current count of `acquire()` calls.
    pub fn acquire_calls(&self) -> u64 {
        self.inner.acquire_calls.load(Ordering::Acquire)
    }

    /// Loads every metric at once; cheaper than calling the individual
    /// getters separately.
    pub fn snapshot(&self) -> SimplePoolMetricsSnapshot {
        atomic::fence(Ordering::Acquire);

        SimplePoolMetricsSnapshot {
            acquire_calls: self.inner.acquire_calls.load(Ordering::Relaxed),
            permit_wait_time: self.inner.permit_wait_time.get(),
            acquire_time: self.inner.acquire_time.get(),
            acquire_timeouts: self.inner.acquire_timeouts.load(Ordering::Relaxed),
            acquire_timeouts_per_phase: AcquireTimeoutsPerPhase(std::array::from_fn(|i| {
                self.inner.acquire_timeouts_per_phase[i].load(Ordering::Relaxed)
            })),
        }
    }
}

impl fmt::Debug for SimplePoolMetrics {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimplePoolMetrics")
            .field("current", &self.snapshot())
            .finish()
    }
}

impl PoolMetricsCollector for SimpleMetricsInner {
    fn acquire_called(&self) {
        self.acquire_calls.fetch_add(1, Ordering::AcqRel);
    }

    fn permit_wait_time(&self, duration: Duration) {
        self.permit_wait_time.update(self.ema_coefficient, duration);
    }

    fn acquire_timed_out(&self, phase: AcquirePhase) {
        self.acquire_timeouts.fetch_add(1, Ordering::AcqRel);
        self.acquire_timeouts_per_phase[phase.index()].fetch_add(1, Ordering::AcqRel);
    }

    fn connection_acquired(&self, total_wait: Duration) {
        self.acquire_time.update(self.ema_coefficient, total_wait);
    }
}

impl AtomicTimingStats {
    fn update(&self, ema_coefficient: f64, sample: Duration) {
        use Ordering::Relaxed;

        let nanos: u64 = sample.as_nanos().try_into().expect("duration too large to record");

        atomic::fence(Ordering::Acquire);

        self.sample_count.fetch_add(1, Relaxed);

        let _ = self.min_nanos.fetch_update(Relaxed, Relaxed, |prev| {
            Some(if prev == 0 { nanos } else { cmp::min(prev, nanos) })
        });

        let _ = self.average_nanos.fetch_update(Relaxed, Relaxed, |average| {
            Some(if average == 0 {
                nanos
            } else {
                ((nanos as f64 * ema_coefficient) + (average as f64 * (1.0 - ema_coefficient))) as u64
            })
        });

        let _ = self.max_nanos.fetch_update(Relaxed, Relaxed, |prev| Some(cmp::max(prev, nanos)));

        atomic::fence(Ordering::Release);
    }

    /// Assumes the caller has already issued an acquiring fence.
    fn get(&self) -> SimpleTimingStats {
        use Ordering::Relaxed;

        SimpleTimingStats {
            sample_count: self.sample_count.load(Relaxed),
            min: Duration::from_nanos(self.min_nanos.load(Relaxed)),
            average: Duration::from_nanos(self.average_nanos.load(Relaxed)),
            max: Duration::from_nanos(self.max_nanos.load(Relaxed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::metrics::AcquirePhase;

    #[test]
    fn snapshot_tracks_calls_and_timeouts_per_phase() {
        let metrics = SimplePoolMetrics::new();
        let collector = metrics.collector();

        collector.acquire_called();
        collector.acquire_called();
        collector.acquire_timed_out(AcquirePhase::Waiting);
        collector.acquire_timed_out(AcquirePhase::Connecting);
        collector.acquire_timed_out(AcquirePhase::Waiting);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.acquire_calls, 2);
        assert_eq!(snapshot.acquire_timeouts, 3);
        assert_eq!(snapshot.acquire_timeouts_per_phase[AcquirePhase::Waiting], 2);
        assert_eq!(snapshot.acquire_timeouts_per_phase[AcquirePhase::Connecting], 1);
        assert_eq!(snapshot.acquire_timeouts_per_phase[AcquirePhase::Backoff], 0);
    }

    #[test]
    fn timing_stats_track_min_and_max_across_samples() {
        let metrics = SimplePoolMetrics::new();
        let collector = metrics.collector();

        collector.connection_acquired(Duration::from_millis(10));
        collector.connection_acquired(Duration::from_millis(50));
        collector.connection_acquired(Duration::from_millis(5));

        let stats = metrics.snapshot().acquire_time;
        assert_eq!(stats.sample_count, 3);
        assert_eq!(stats.min, Duration::from_millis(5));
        assert_eq!(stats.max, Duration::from_millis(50));
        // the EMA average sits strictly between the smallest and largest sample.
        assert!(stats.average > Duration::ZERO);
        assert!(stats.average <= stats.max);
    }

    #[test]
    #[should_panic]
    fn ema_coefficient_out_of_range_panics() {
        SimplePoolMetrics::with_ema_coefficient(1.5);
    }
}
