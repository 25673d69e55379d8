//! Series Computations
//!
//! A [`SeriesComputation`] is a free-running worker that owns one
//! [`Accumulator`] and refines it as fast as the CPU allows. Workers run on
//! dedicated OS threads because they never yield on their own; the only
//! points where a worker stops touching shared state are the pause-check at
//! the top of every iteration and idle parking while suspended.
//!
//! # Worker iteration
//!
//! ```text
//!   load request word ──paused──▶ acknowledge epoch, park until word changes
//!         │
//!   load run state ──suspended/exhausted──▶ park
//!         │
//!   reload request word ──changed──▶ retry
//!         │
//!   step the series (exclusive access to the accumulator)
//! ```
//!
//! Reading the request word on both sides of the run-state load means a
//! worker can only step with a run state that was current when the last
//! window was released.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, Thread};

use thiserror::Error;
use tracing::{debug, info, trace};

use crate::accumulator::{Accumulator, HandoffCell};
use crate::clock::{Clock, ConvergenceBand};
use crate::quiescence::{QuiescenceSignal, RequestWord};
use crate::series::{Algorithm, StepOutcome, Termination};

/// Whether a computation is scheduled to run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Parked until started
    Suspended,
    /// Iterating whenever no pause is requested
    Running,
}

impl RunState {
    fn from_u8(value: u8) -> Self {
        if value == 1 {
            Self::Running
        } else {
            Self::Suspended
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Suspended => 0,
            Self::Running => 1,
        }
    }

    /// Short label for a 20 column display
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Suspended => "STOP",
            Self::Running => "RUN",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Suspended => write!(f, "suspended"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// Errors from creating or joining workers
#[derive(Debug, Error)]
pub enum ComputationError {
    /// A worker already owns this slot
    #[error("{0} computation already has a worker")]
    AlreadyClaimed(Algorithm),

    /// The OS refused to spawn the worker thread
    #[error("failed to spawn {algorithm} worker: {source}")]
    Spawn {
        /// Which worker
        algorithm: Algorithm,
        /// Underlying error
        source: std::io::Error,
    },

    /// The worker thread panicked
    #[error("{0} worker panicked")]
    Panicked(Algorithm),
}

/// Shared per-computation state
///
/// Everything here except the accumulator cell is atomic and may be read
/// at any time. The cell follows the handshake.
pub struct ComputationSlot {
    algorithm: Algorithm,
    run_state: AtomicU8,
    exhausted: AtomicBool,
    /// Epoch of the most recent acknowledged pause request
    acknowledged: AtomicU64,
    claimed: AtomicBool,
    thread: OnceLock<Thread>,
    pub(crate) cell: HandoffCell<Accumulator>,
}

impl ComputationSlot {
    fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            run_state: AtomicU8::new(RunState::Suspended.as_u8()),
            exhausted: AtomicBool::new(false),
            acknowledged: AtomicU64::new(0),
            claimed: AtomicBool::new(false),
            thread: OnceLock::new(),
            cell: HandoffCell::new(Accumulator::new(algorithm)),
        }
    }

    /// Which series this slot holds
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Current run state
    #[must_use]
    pub fn run_state(&self) -> RunState {
        RunState::from_u8(self.run_state.load(Ordering::SeqCst))
    }

    /// Only called with a quiescence window held
    pub(crate) fn set_run_state(&self, state: RunState) {
        self.run_state.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Whether the finite termination policy froze this computation
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::SeqCst)
    }

    pub(crate) fn clear_exhausted(&self) {
        self.exhausted.store(false, Ordering::SeqCst);
    }

    /// Whether a pause request must wait for this worker
    #[must_use]
    pub fn needs_acknowledgement(&self) -> bool {
        self.run_state() == RunState::Running && !self.is_exhausted()
    }

    /// Whether the worker acknowledged the given epoch (or a later one)
    #[must_use]
    pub fn has_acknowledged(&self, epoch: u64) -> bool {
        self.acknowledged.load(Ordering::SeqCst) >= epoch
    }

    pub(crate) fn acknowledge(&self, epoch: u64) {
        self.acknowledged.store(epoch, Ordering::SeqCst);
    }

    fn register_thread(&self, thread: Thread) {
        // A slot is claimed once, so the first registration wins.
        let _ = self.thread.set(thread);
    }

    fn wake(&self) {
        if let Some(thread) = self.thread.get() {
            thread.unpark();
        }
    }
}

/// The computations and the signal they share with the coordinator
pub struct ComputationPool {
    pub(crate) signal: QuiescenceSignal,
    slots: [ComputationSlot; 2],
    shutdown: AtomicBool,
    pub(crate) coordinator_claimed: AtomicBool,
}

impl ComputationPool {
    /// Both computations suspended at their starting state
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            signal: QuiescenceSignal::new(),
            slots: Algorithm::ALL.map(ComputationSlot::new),
            shutdown: AtomicBool::new(false),
            coordinator_claimed: AtomicBool::new(false),
        })
    }

    /// Slot for an algorithm
    #[must_use]
    pub fn slot(&self, algorithm: Algorithm) -> &ComputationSlot {
        &self.slots[algorithm.index()]
    }

    /// The pause-request signal
    #[must_use]
    pub fn signal(&self) -> &QuiescenceSignal {
        &self.signal
    }

    /// Whether every computation is suspended
    #[must_use]
    pub fn all_suspended(&self) -> bool {
        self.slots
            .iter()
            .all(|slot| slot.run_state() == RunState::Suspended)
    }

    pub(crate) fn wake(&self, algorithm: Algorithm) {
        self.slot(algorithm).wake();
    }

    pub(crate) fn wake_all(&self) {
        for slot in &self.slots {
            slot.wake();
        }
    }

    /// Ask all workers to exit and wake them
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.wake_all();
    }

    /// Whether shutdown was requested
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// What one worker iteration did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerPoll {
    /// The series was stepped
    Stepped(StepOutcome),
    /// A pause request was observed and acknowledged; nothing was mutated
    Acknowledged(RequestWord),
    /// Suspended or exhausted; nothing to do
    Idle,
    /// The request word moved while checking the run state; retry
    Raced,
    /// The pool is shutting down
    Shutdown,
}

/// Free-running evaluator for one series
pub struct SeriesComputation {
    pool: Arc<ComputationPool>,
    algorithm: Algorithm,
    termination: Termination,
    band: ConvergenceBand,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SeriesComputation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeriesComputation")
            .field("algorithm", &self.algorithm)
            .field("termination", &self.termination)
            .field("band", &self.band)
            .finish_non_exhaustive()
    }
}

impl SeriesComputation {
    /// Claim the slot for `algorithm`
    ///
    /// # Errors
    ///
    /// Returns [`ComputationError::AlreadyClaimed`] if another computation
    /// already owns the slot.
    pub fn new(
        pool: Arc<ComputationPool>,
        algorithm: Algorithm,
        termination: Termination,
        band: ConvergenceBand,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ComputationError> {
        if pool.slot(algorithm).claimed.swap(true, Ordering::SeqCst) {
            return Err(ComputationError::AlreadyClaimed(algorithm));
        }
        Ok(Self {
            pool,
            algorithm,
            termination,
            band,
            clock,
        })
    }

    /// Which series this computation evaluates
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Run on a dedicated thread
    ///
    /// # Errors
    ///
    /// Returns [`ComputationError::Spawn`] if the thread cannot be created.
    pub fn spawn(self) -> Result<WorkerHandle, ComputationError> {
        let algorithm = self.algorithm;
        let pool = Arc::clone(&self.pool);
        let name = format!("picalc-{}", algorithm.label().to_lowercase());

        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || self.run())
            .map_err(|source| ComputationError::Spawn { algorithm, source })?;

        // Registered before the coordinator exists, so no unpark is lost.
        pool.slot(algorithm).register_thread(handle.thread().clone());
        debug!(%algorithm, "Worker thread spawned");

        Ok(WorkerHandle { algorithm, handle })
    }

    fn run(mut self) {
        info!(algorithm = %self.algorithm, termination = ?self.termination, "Computation started");
        loop {
            match self.poll_once() {
                WorkerPoll::Stepped(_) | WorkerPoll::Raced => {}
                WorkerPoll::Acknowledged(request) => self.park_while(request),
                WorkerPoll::Idle => thread::park(),
                WorkerPoll::Shutdown => break,
            }
        }
        info!(algorithm = %self.algorithm, "Computation stopped");
    }

    /// One loop iteration, including the pause-check
    pub fn poll_once(&mut self) -> WorkerPoll {
        let pool = &*self.pool;
        if pool.is_shutting_down() {
            return WorkerPoll::Shutdown;
        }

        let slot = pool.slot(self.algorithm);
        let before = pool.signal.load();
        if before.is_pause_requested() {
            slot.acknowledge(before.epoch());
            pool.signal.notify_acknowledged();
            trace!(algorithm = %self.algorithm, epoch = before.epoch(), "Pause acknowledged");
            return WorkerPoll::Acknowledged(before);
        }

        if slot.run_state() != RunState::Running || slot.is_exhausted() {
            return WorkerPoll::Idle;
        }

        if pool.signal.load() != before {
            return WorkerPoll::Raced;
        }

        let termination = &self.termination;
        let band = &self.band;
        let clock = &self.clock;
        // SAFETY: this worker is the slot's only claimant, it observed no
        // pause request on both sides of reading `Running`, and any request
        // issued from here on waits for our acknowledgement before touching
        // the cell.
        let (outcome, iteration) = unsafe {
            slot.cell.with_mut(|acc| {
                let outcome = acc.advance(termination, band, || clock.now());
                (outcome, acc.series.iteration())
            })
        };

        if outcome == StepOutcome::Exhausted {
            slot.exhausted.store(true, Ordering::SeqCst);
            info!(algorithm = %self.algorithm, iteration, "Series reached its termination threshold");
        }
        WorkerPoll::Stepped(outcome)
    }

    fn park_while(&self, request: RequestWord) {
        while self.pool.signal.load() == request && !self.pool.is_shutting_down() {
            thread::park();
        }
    }
}

/// Join handle for a spawned worker
#[derive(Debug)]
pub struct WorkerHandle {
    algorithm: Algorithm,
    handle: JoinHandle<()>,
}

impl WorkerHandle {
    /// Which series the worker evaluates
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Wait for the worker to exit (call after [`ComputationPool::shutdown`])
    ///
    /// # Errors
    ///
    /// Returns [`ComputationError::Panicked`] if the worker panicked.
    pub fn join(self) -> Result<(), ComputationError> {
        self.handle
            .join()
            .map_err(|_| ComputationError::Panicked(self.algorithm))
    }
}
