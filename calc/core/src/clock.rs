//! Clock and Elapsed-Time Measurement
//!
//! The engine never calls `Instant::now()` directly. Everything that needs
//! time goes through [`Clock`], so tests can drive elapsed-time behavior with
//! a [`ManualClock`] instead of sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic time source
pub trait Clock: Send + Sync + 'static {
    /// Time elapsed since the clock's origin
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`]
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose origin is now
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to
///
/// Millisecond resolution, shareable across threads.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    /// Create a clock at time zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let ms = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.millis.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jump to an absolute time
    pub fn set(&self, to: Duration) {
        let ms = u64::try_from(to.as_millis()).unwrap_or(u64::MAX);
        self.millis.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

/// Absolute tolerance band around the target constant
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConvergenceBand {
    /// Value the approximation converges to
    pub target: f64,
    /// Maximum absolute distance counted as converged
    pub tolerance: f64,
}

impl ConvergenceBand {
    /// Band around pi with the given tolerance
    #[must_use]
    pub fn around_pi(tolerance: f64) -> Self {
        Self {
            target: crate::series::TARGET,
            tolerance,
        }
    }

    /// Whether a value lies inside the band
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        (value - self.target).abs() < self.tolerance
    }
}

impl Default for ConvergenceBand {
    fn default() -> Self {
        // 3.14159 as displayed on the reference LCD
        Self::around_pi(1e-5)
    }
}

/// Elapsed running time with a write-once convergence latch
///
/// Time only accumulates between [`Stopwatch::start`] and
/// [`Stopwatch::stop`]; suspended intervals are excluded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stopwatch {
    accumulated: Duration,
    running_since: Option<Duration>,
    latched: Option<Duration>,
}

impl Stopwatch {
    /// A stopped stopwatch at zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin accumulating from `now`; no-op if already running
    pub fn start(&mut self, now: Duration) {
        if self.running_since.is_none() {
            self.running_since = Some(now);
        }
    }

    /// Fold the current run into the total; no-op if not running
    pub fn stop(&mut self, now: Duration) {
        if let Some(since) = self.running_since.take() {
            self.accumulated += now.saturating_sub(since);
        }
    }

    /// Whether the stopwatch is accumulating
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    /// Total running time as of `now`
    #[must_use]
    pub fn elapsed(&self, now: Duration) -> Duration {
        match self.running_since {
            Some(since) => self.accumulated + now.saturating_sub(since),
            None => self.accumulated,
        }
    }

    /// Record the elapsed time at `now` unless a value is already latched
    ///
    /// Returns `true` only for the call that set the latch.
    pub fn latch(&mut self, now: Duration) -> bool {
        if self.latched.is_some() {
            return false;
        }
        self.latched = Some(self.elapsed(now));
        true
    }

    /// The latched convergence time, if any
    #[must_use]
    pub fn latched(&self) -> Option<Duration> {
        self.latched
    }

    /// Zero everything, including the latch
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
