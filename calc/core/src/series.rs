//! Series Evaluation
//!
//! Incremental, resumable evaluation of the two pi series. Each call to
//! [`SeriesState::step`] contributes exactly one term to an approximation
//! and advances the recurrence, so a computation can be parked between any
//! two iterations and resumed later without losing progress.
//!
//! # Series
//!
//! - **Leibniz**: `pi = 4 * (1 - 1/3 + 1/5 - 1/7 + ...)`
//! - **Nilakantha-Somayaji**: `pi = 3 + 4/(2*3*4) - 4/(4*5*6) + 4/(6*7*8) - ...`
//!
//! The Nilakantha offset of 3 is contributed as iteration 0, so a freshly
//! reset state always pairs with an approximation of `0.0` regardless of the
//! algorithm.

use serde::{Deserialize, Serialize};

/// The constant both series converge to.
pub const TARGET: f64 = std::f64::consts::PI;

/// Which series a computation evaluates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// Leibniz series (slow, alternating harmonic-like terms)
    Leibniz,
    /// Nilakantha-Somayaji series (cubic denominators, fast)
    Nilakantha,
}

impl Algorithm {
    /// Both algorithms, in slot order
    pub const ALL: [Algorithm; 2] = [Algorithm::Leibniz, Algorithm::Nilakantha];

    /// Slot index used by the computation pool
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Leibniz => 0,
            Self::Nilakantha => 1,
        }
    }

    /// Human-readable label (fits a 20 column display)
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Leibniz => "Leibniz",
            Self::Nilakantha => "Nilakantha",
        }
    }

    /// The other algorithm
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::Leibniz => Self::Nilakantha,
            Self::Nilakantha => Self::Leibniz,
        }
    }

    /// Parse an algorithm name (case-insensitive, accepts short forms)
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "leibniz" | "l" => Some(Self::Leibniz),
            "nilakantha" | "nilakantha-somayaji" | "nil-som" | "n" => Some(Self::Nilakantha),
            _ => None,
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Termination predicate shared by both series
///
/// `Unbounded` keeps refining until externally suspended. `BelowEpsilon`
/// freezes the approximation once the next term would contribute less than
/// the given magnitude.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Termination {
    /// Never stop on our own
    #[default]
    Unbounded,
    /// Stop once the next term's magnitude drops below this value
    BelowEpsilon(f64),
}

impl Termination {
    /// Whether a term of this magnitude should still be added
    #[must_use]
    pub fn should_continue(&self, term_magnitude: f64) -> bool {
        match self {
            Self::Unbounded => true,
            Self::BelowEpsilon(epsilon) => term_magnitude >= *epsilon,
        }
    }
}

/// Result of a single step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// A term was added
    Advanced,
    /// The termination predicate declined the next term; nothing changed
    Exhausted,
}

/// Recurrence state for one series
#[derive(Clone, Debug, PartialEq)]
pub struct SeriesState {
    algorithm: Algorithm,
    /// Number of terms contributed so far
    iteration: u64,
    /// Magnitude of the last contributed term
    last_term: f64,
    /// Sign of the next term
    negative: bool,
    /// Running denominator base: `2k+1` for Leibniz, `2k` for Nilakantha
    base: f64,
    exhausted: bool,
}

impl SeriesState {
    /// Starting state for an algorithm
    #[must_use]
    pub fn new(algorithm: Algorithm) -> Self {
        let base = match algorithm {
            Algorithm::Leibniz => 1.0,
            Algorithm::Nilakantha => 2.0,
        };
        Self {
            algorithm,
            iteration: 0,
            last_term: 0.0,
            negative: false,
            base,
            exhausted: false,
        }
    }

    /// Return to the starting state
    pub fn reset(&mut self) {
        *self = Self::new(self.algorithm);
    }

    /// Which series this state evaluates
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Terms contributed so far
    #[must_use]
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Magnitude of the most recently contributed term
    #[must_use]
    pub fn last_term(&self) -> f64 {
        self.last_term
    }

    /// Whether the termination predicate has frozen this series
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Signed contribution of the next term, without advancing
    #[must_use]
    pub fn next_contribution(&self) -> f64 {
        let magnitude = match self.algorithm {
            Algorithm::Leibniz => 4.0 / self.base,
            Algorithm::Nilakantha if self.iteration == 0 => 3.0,
            Algorithm::Nilakantha => 4.0 / (self.base * (self.base + 1.0) * (self.base + 2.0)),
        };
        if self.negative {
            -magnitude
        } else {
            magnitude
        }
    }

    /// Add the next term into `approximation` and advance the recurrence
    ///
    /// Leibniz declines a term whose unscaled magnitude `1/(2k+1)` is below
    /// the threshold. Nilakantha adds the first term below the threshold
    /// and stops after it. Once exhausted, every later call is a no-op until
    /// [`SeriesState::reset`].
    pub fn step(&mut self, approximation: &mut f64, termination: &Termination) -> StepOutcome {
        if self.exhausted {
            return StepOutcome::Exhausted;
        }

        let contribution = self.next_contribution();
        let magnitude = self.termination_magnitude(contribution);
        if self.algorithm == Algorithm::Leibniz && !termination.should_continue(magnitude) {
            self.exhausted = true;
            return StepOutcome::Exhausted;
        }

        *approximation += contribution;
        self.last_term = contribution.abs();
        self.advance();

        if self.algorithm == Algorithm::Nilakantha && !termination.should_continue(magnitude) {
            self.exhausted = true;
        }
        StepOutcome::Advanced
    }

    /// Magnitude the termination predicate judges a term by
    fn termination_magnitude(&self, contribution: f64) -> f64 {
        match self.algorithm {
            // Threshold applies before the factor of 4
            Algorithm::Leibniz => contribution.abs() / 4.0,
            Algorithm::Nilakantha => contribution.abs(),
        }
    }

    fn advance(&mut self) {
        match self.algorithm {
            Algorithm::Leibniz => {
                self.base += 2.0;
                self.negative = !self.negative;
            }
            // Iteration 0 is the offset; the first fractional term is positive.
            Algorithm::Nilakantha if self.iteration == 0 => {}
            Algorithm::Nilakantha => {
                self.base += 2.0;
                self.negative = !self.negative;
            }
        }
        self.iteration += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(algorithm: Algorithm, iterations: u64) -> (f64, SeriesState) {
        let mut state = SeriesState::new(algorithm);
        let mut approximation = 0.0;
        for _ in 0..iterations {
            state.step(&mut approximation, &Termination::Unbounded);
        }
        (approximation, state)
    }

    #[test]
    fn test_leibniz_first_terms() {
        let (one, _) = run(Algorithm::Leibniz, 1);
        assert!((one - 4.0).abs() < 1e-12);

        let (two, _) = run(Algorithm::Leibniz, 2);
        assert!((two - (4.0 - 4.0 / 3.0)).abs() < 1e-12);

        let (three, state) = run(Algorithm::Leibniz, 3);
        assert!((three - (4.0 - 4.0 / 3.0 + 4.0 / 5.0)).abs() < 1e-12);
        assert_eq!(state.iteration(), 3);
        assert!((state.last_term() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_nilakantha_offset_then_terms() {
        let (offset, _) = run(Algorithm::Nilakantha, 1);
        assert!((offset - 3.0).abs() < 1e-12);

        let (first, _) = run(Algorithm::Nilakantha, 2);
        assert!((first - (3.0 + 4.0 / 24.0)).abs() < 1e-12);

        let (second, _) = run(Algorithm::Nilakantha, 3);
        assert!((second - (3.0 + 4.0 / 24.0 - 4.0 / 120.0)).abs() < 1e-12);
    }

    #[test]
    fn test_leibniz_error_shrinks_between_checkpoints() {
        let mut state = SeriesState::new(Algorithm::Leibniz);
        let mut approximation = 0.0;
        let mut previous_error = f64::INFINITY;

        for _ in 0..50 {
            for _ in 0..1000 {
                state.step(&mut approximation, &Termination::Unbounded);
            }
            let error = (approximation - TARGET).abs();
            assert!(
                error < previous_error,
                "error grew at iteration {}: {error} >= {previous_error}",
                state.iteration()
            );
            previous_error = error;
        }
    }

    #[test]
    fn test_nilakantha_error_shrinks_every_step() {
        let mut state = SeriesState::new(Algorithm::Nilakantha);
        let mut approximation = 0.0;
        state.step(&mut approximation, &Termination::Unbounded);
        let mut previous_error = (approximation - TARGET).abs();

        for _ in 0..60 {
            state.step(&mut approximation, &Termination::Unbounded);
            let error = (approximation - TARGET).abs();
            assert!(error < previous_error);
            previous_error = error;
        }
    }

    #[test]
    fn test_leibniz_hundred_thousand_iterations() {
        let (approximation, _) = run(Algorithm::Leibniz, 100_000);
        assert!((approximation - 3.141_592_65).abs() < 1e-4);
    }

    #[test]
    fn test_nilakantha_converges_fast() {
        let (approximation, _) = run(Algorithm::Nilakantha, 1_000);
        assert!((approximation - TARGET).abs() < 1e-9);
    }

    #[test]
    fn test_epsilon_termination_freezes() {
        let termination = Termination::BelowEpsilon(1e-3);
        let mut state = SeriesState::new(Algorithm::Nilakantha);
        let mut approximation = 0.0;

        let mut steps = 0;
        while state.step(&mut approximation, &termination) == StepOutcome::Advanced {
            steps += 1;
            assert!(steps < 1_000, "finite policy never terminated");
        }

        assert!(state.is_exhausted());
        let frozen = approximation;
        assert_eq!(state.step(&mut approximation, &termination), StepOutcome::Exhausted);
        assert_eq!(approximation, frozen);
        assert!(state.next_contribution().abs() < 1e-3);
    }

    fn steps_until_exhausted(algorithm: Algorithm, epsilon: f64) -> (f64, SeriesState) {
        let termination = Termination::BelowEpsilon(epsilon);
        let mut state = SeriesState::new(algorithm);
        let mut approximation = 0.0;
        while state.step(&mut approximation, &termination) == StepOutcome::Advanced {}
        (approximation, state)
    }

    #[test]
    fn test_leibniz_threshold_applies_to_unscaled_term() {
        // Terms 1/(2k+1) >= 5e-6 for k = 0..=99_999
        let (approximation, state) =
            steps_until_exhausted(Algorithm::Leibniz, crate::config::DEFAULT_LEIBNIZ_EPSILON);
        assert_eq!(state.iteration(), 100_000);
        assert!((state.last_term() - 4.0 / 199_999.0).abs() < 1e-15);
        assert!((approximation - TARGET).abs() < 1e-4);
    }

    #[test]
    fn test_nilakantha_adds_first_term_below_threshold() {
        let (approximation, state) = steps_until_exhausted(
            Algorithm::Nilakantha,
            crate::config::DEFAULT_NILAKANTHA_EPSILON,
        );

        // Offset plus terms n = 1..=37; 4/(74*75*76) is the first below 1e-5
        assert_eq!(state.iteration(), 38);
        assert!(state.last_term() < 1e-5);
        assert!((state.last_term() - 4.0 / (74.0 * 75.0 * 76.0)).abs() < 1e-15);

        let mut expected = 3.0;
        for n in 1..=37_u32 {
            let base = 2.0 * f64::from(n);
            let term = 4.0 / (base * (base + 1.0) * (base + 2.0));
            if n % 2 == 1 {
                expected += term;
            } else {
                expected -= term;
            }
        }
        assert!((approximation - expected).abs() < 1e-12);
    }

    #[test]
    fn test_reset_restores_start() {
        let (_, mut state) = run(Algorithm::Leibniz, 10);
        state.reset();
        assert_eq!(state, SeriesState::new(Algorithm::Leibniz));
    }

    #[test]
    fn test_termination_predicate() {
        assert!(Termination::Unbounded.should_continue(0.0));
        assert!(Termination::BelowEpsilon(1e-5).should_continue(2e-5));
        assert!(!Termination::BelowEpsilon(1e-5).should_continue(5e-6));
    }

    #[test]
    fn test_algorithm_parse() {
        assert_eq!(Algorithm::parse("Leibniz"), Some(Algorithm::Leibniz));
        assert_eq!(Algorithm::parse(" n "), Some(Algorithm::Nilakantha));
        assert_eq!(Algorithm::parse("machin"), None);
        assert_eq!(Algorithm::Leibniz.other(), Algorithm::Nilakantha);
    }
}
