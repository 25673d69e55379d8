//! Accumulator State and the Handoff Cell
//!
//! An [`Accumulator`] bundles everything a computation mutates while it runs:
//! the approximation, the series recurrence and the stopwatch. It lives in a
//! [`HandoffCell`], which is shared between a worker thread and the
//! presentation side without a lock. Which side may touch it is decided by
//! the quiescence handshake in [`crate::quiescence`].

use std::cell::UnsafeCell;
use std::time::Duration;

use crate::clock::{ConvergenceBand, Stopwatch};
use crate::series::{Algorithm, SeriesState, StepOutcome, Termination, TARGET};

/// Mutable per-computation state
#[derive(Clone, Debug, PartialEq)]
pub struct Accumulator {
    /// Current value of the series sum
    pub approximation: f64,
    /// Recurrence state
    pub series: SeriesState,
    /// Running time and convergence latch
    pub stopwatch: Stopwatch,
}

impl Accumulator {
    /// Fresh accumulator for an algorithm
    #[must_use]
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            approximation: 0.0,
            series: SeriesState::new(algorithm),
            stopwatch: Stopwatch::new(),
        }
    }

    /// One worker iteration: add a term, then check the convergence band
    ///
    /// `now` is only sampled when the band is entered for the first time or
    /// when the series exhausts, which also stops the stopwatch.
    pub fn advance(
        &mut self,
        termination: &Termination,
        band: &ConvergenceBand,
        now: impl FnOnce() -> Duration,
    ) -> StepOutcome {
        let outcome = self.series.step(&mut self.approximation, termination);
        match outcome {
            StepOutcome::Advanced
                if self.stopwatch.latched().is_none() && band.contains(self.approximation) =>
            {
                self.stopwatch.latch(now());
            }
            StepOutcome::Exhausted if self.stopwatch.is_running() => {
                self.stopwatch.stop(now());
            }
            _ => {}
        }
        outcome
    }

    /// Zero the approximation, the series and the stopwatch
    pub fn reset(&mut self) {
        self.approximation = 0.0;
        self.series.reset();
        self.stopwatch.reset();
    }

    /// Absolute distance from pi
    #[must_use]
    pub fn error(&self) -> f64 {
        (self.approximation - TARGET).abs()
    }
}

/// Shared cell whose exclusive owner changes over time
///
/// No runtime borrow tracking: the quiescence handshake guarantees that at
/// any instant either the owning worker or the holder of a
/// [`QuiescenceWindow`](crate::quiescence::QuiescenceWindow) accesses the
/// value, never both.
pub(crate) struct HandoffCell<T> {
    value: UnsafeCell<T>,
}

// SAFETY: access is serialized by the quiescence handshake; the value moves
// between threads, so `T: Send` is required.
unsafe impl<T: Send> Sync for HandoffCell<T> {}

impl<T> HandoffCell<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            value: UnsafeCell::new(value),
        }
    }

    /// Run `f` with exclusive access to the value
    ///
    /// # Safety
    ///
    /// The caller must currently own the cell under the handshake: either it
    /// is the slot's worker and has observed no pause request since checking
    /// its run state, or it holds the quiescence window.
    pub(crate) unsafe fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut *self.value.get())
    }

    /// Raw pointer for window accessors that tie the borrow to the window
    pub(crate) fn as_ptr(&self) -> *mut T {
        self.value.get()
    }
}

/// Value copy of one computation, taken inside a window
#[derive(Clone, Debug, PartialEq)]
pub struct ComputationSnapshot {
    /// Which series
    pub algorithm: Algorithm,
    /// Whether the computation is scheduled to run
    pub run_state: crate::computation::RunState,
    /// Approximation at snapshot time
    pub approximation: f64,
    /// Terms contributed
    pub iteration: u64,
    /// Finite termination reached
    pub exhausted: bool,
    /// Running time, suspended intervals excluded
    pub elapsed: Duration,
    /// Running time when the convergence band was first entered
    pub converged_after: Option<Duration>,
}

impl ComputationSnapshot {
    pub(crate) fn capture(
        accumulator: &Accumulator,
        run_state: crate::computation::RunState,
        now: Duration,
    ) -> Self {
        Self {
            algorithm: accumulator.series.algorithm(),
            run_state,
            approximation: accumulator.approximation,
            iteration: accumulator.series.iteration(),
            exhausted: accumulator.series.is_exhausted(),
            elapsed: accumulator.stopwatch.elapsed(now),
            converged_after: accumulator.stopwatch.latched(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_latches_on_entering_band() {
        let mut acc = Accumulator::new(Algorithm::Nilakantha);
        acc.stopwatch.start(Duration::ZERO);
        let band = ConvergenceBand::around_pi(1e-3);

        let mut tick = 0u64;
        while acc.stopwatch.latched().is_none() {
            tick += 1;
            acc.advance(&Termination::Unbounded, &band, || Duration::from_millis(tick));
            assert!(tick < 100);
        }

        let latched = acc.stopwatch.latched();
        assert!(band.contains(acc.approximation));

        // Later steps never overwrite the latch
        for _ in 0..10 {
            acc.advance(&Termination::Unbounded, &band, || Duration::from_secs(60));
        }
        assert_eq!(acc.stopwatch.latched(), latched);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let mut acc = Accumulator::new(Algorithm::Leibniz);
        acc.stopwatch.start(Duration::ZERO);
        for _ in 0..100 {
            acc.advance(&Termination::Unbounded, &ConvergenceBand::default(), || {
                Duration::from_millis(5)
            });
        }
        acc.stopwatch.latch(Duration::from_millis(5));

        acc.reset();
        assert_eq!(acc, Accumulator::new(Algorithm::Leibniz));
        assert_eq!(acc.approximation, 0.0);
    }

    #[test]
    fn test_exhaustion_stops_stopwatch() {
        let mut acc = Accumulator::new(Algorithm::Nilakantha);
        acc.stopwatch.start(Duration::ZERO);
        let termination = Termination::BelowEpsilon(1e-2);

        let mut tick = 0u64;
        while acc.advance(&termination, &ConvergenceBand::default(), || {
            Duration::from_millis(tick)
        }) == StepOutcome::Advanced
        {
            tick += 1;
        }

        assert!(!acc.stopwatch.is_running());
        assert_eq!(
            acc.stopwatch.elapsed(Duration::from_secs(3600)),
            Duration::from_millis(tick)
        );
    }

    #[test]
    fn test_handoff_cell_with_mut() {
        let cell = HandoffCell::new(Accumulator::new(Algorithm::Leibniz));
        // SAFETY: single-threaded test, no other accessor exists.
        let value = unsafe {
            cell.with_mut(|acc| {
                acc.approximation = 1.5;
                acc.approximation
            })
        };
        assert_eq!(value, 1.5);
    }
}
