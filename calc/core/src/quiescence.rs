//! Quiescence Handshake
//!
//! Lets the presentation side obtain a window in which no computation is
//! mutating its accumulator, without locks and with at most one loop
//! iteration of added latency for the workers.
//!
//! # Protocol
//!
//! 1. [`QuiescenceCoordinator::acquire`] publishes a new request epoch with
//!    the pause bit set.
//! 2. Every computation that is `Running` (and not exhausted) is woken and
//!    awaited until it acknowledges that epoch. If every computation is
//!    suspended the wait is skipped entirely; nothing would ever answer.
//! 3. The returned [`QuiescenceWindow`] grants exclusive access to the
//!    accumulators and run states.
//! 4. Dropping the window clears the pause bit and wakes the workers.
//!
//! Acknowledgements carry the epoch they answer, so a worker that observed
//! an older request can never satisfy a newer one while it is about to
//! resume stepping.
//!
//! The wait is unbounded unless an acknowledgement timeout is configured.
//! On timeout the request is withdrawn, the silent computations are marked
//! faulted and [`QuiescenceError::Unconfirmed`] is returned; callers must
//! then skip anything that would read shared state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

use crate::accumulator::{Accumulator, ComputationSnapshot};
use crate::computation::{ComputationPool, RunState};
use crate::series::Algorithm;

const PAUSE_BIT: u64 = 1;

/// Snapshot of the request word: an epoch and a pause bit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestWord(u64);

impl RequestWord {
    /// Monotonic request counter; 0 before the first request
    #[must_use]
    pub fn epoch(self) -> u64 {
        self.0 >> 1
    }

    /// Whether workers must stop mutating shared state
    #[must_use]
    pub fn is_pause_requested(self) -> bool {
        self.0 & PAUSE_BIT == PAUSE_BIT
    }
}

/// PauseRequested plus the wake-up for PauseAcknowledged
///
/// Only the coordinator writes the request word. Workers write their
/// acknowledged epoch into their own slot and then notify.
#[derive(Debug)]
pub struct QuiescenceSignal {
    word: AtomicU64,
    acknowledged: Notify,
}

impl QuiescenceSignal {
    pub(crate) fn new() -> Self {
        Self {
            word: AtomicU64::new(0),
            acknowledged: Notify::new(),
        }
    }

    /// Current request word
    #[must_use]
    pub fn load(&self) -> RequestWord {
        RequestWord(self.word.load(Ordering::SeqCst))
    }

    /// Publish the next epoch with the pause bit set
    pub(crate) fn request(&self) -> RequestWord {
        let next = ((self.load().epoch() + 1) << 1) | PAUSE_BIT;
        self.word.store(next, Ordering::SeqCst);
        RequestWord(next)
    }

    /// Clear the pause bit, keeping the epoch
    pub(crate) fn release(&self) {
        let current = self.load();
        self.word.store(current.epoch() << 1, Ordering::SeqCst);
    }

    pub(crate) fn notify_acknowledged(&self) {
        self.acknowledged.notify_one();
    }
}

/// How a window was confirmed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confirmation {
    /// No computation was stepping (all suspended or exhausted), so no
    /// acknowledgement was awaited
    AllSuspended,
    /// Every running computation acknowledged the request
    Acknowledged,
}

/// Quiescence errors
#[derive(Debug, Error)]
pub enum QuiescenceError {
    /// The bounded wait expired before every running computation answered
    #[error("quiescence not confirmed after {waited:?}: {pending:?} did not acknowledge epoch {epoch}")]
    Unconfirmed {
        /// Epoch that went unanswered
        epoch: u64,
        /// Computations that stayed silent
        pending: Vec<Algorithm>,
        /// How long we waited
        waited: Duration,
    },

    /// Only one coordinator may exist per pool
    #[error("a quiescence coordinator already exists for this pool")]
    CoordinatorExists,
}

/// Counters kept across windows
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QuiescenceStats {
    /// Windows granted
    pub windows: u64,
    /// Windows that waited for at least one acknowledgement
    pub acknowledged_waits: u64,
    /// Windows granted without waiting because everything was suspended
    pub skipped_waits: u64,
    /// Requests withdrawn after the acknowledgement timeout
    pub faults: u64,
    /// Longest time spent waiting for acknowledgements
    pub longest_wait: Duration,
}

/// Requests and releases quiescence windows
///
/// There is exactly one coordinator per [`ComputationPool`]; acquiring a
/// window borrows it mutably, so windows never overlap.
pub struct QuiescenceCoordinator {
    pool: Arc<ComputationPool>,
    ack_timeout: Option<Duration>,
    faulted: [bool; 2],
    stats: QuiescenceStats,
}

impl std::fmt::Debug for QuiescenceCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuiescenceCoordinator")
            .field("ack_timeout", &self.ack_timeout)
            .field("faulted", &self.faulted)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl QuiescenceCoordinator {
    /// Create the pool's coordinator
    ///
    /// `ack_timeout = None` waits for acknowledgements indefinitely.
    ///
    /// # Errors
    ///
    /// Returns [`QuiescenceError::CoordinatorExists`] on a second call for
    /// the same pool.
    pub fn new(
        pool: Arc<ComputationPool>,
        ack_timeout: Option<Duration>,
    ) -> Result<Self, QuiescenceError> {
        if pool.coordinator_claimed.swap(true, Ordering::SeqCst) {
            return Err(QuiescenceError::CoordinatorExists);
        }
        Ok(Self {
            pool,
            ack_timeout,
            faulted: [false; 2],
            stats: QuiescenceStats::default(),
        })
    }

    /// The pool this coordinator controls
    #[must_use]
    pub fn pool(&self) -> &Arc<ComputationPool> {
        &self.pool
    }

    /// Counters so far
    #[must_use]
    pub fn stats(&self) -> QuiescenceStats {
        self.stats
    }

    /// Computations that missed the last bounded wait and have not
    /// acknowledged since
    #[must_use]
    pub fn faulted(&self) -> Vec<Algorithm> {
        Algorithm::ALL
            .into_iter()
            .filter(|algorithm| self.faulted[algorithm.index()])
            .collect()
    }

    /// Request quiescence and wait until it is confirmed
    ///
    /// Cancel-safe: if the returned future is dropped mid-wait, the request
    /// is withdrawn.
    ///
    /// # Errors
    ///
    /// Returns [`QuiescenceError::Unconfirmed`] if an acknowledgement
    /// timeout is configured and expires.
    pub async fn acquire(&mut self) -> Result<QuiescenceWindow<'_>, QuiescenceError> {
        let pool = Arc::clone(&self.pool);
        let request = pool.signal.request();
        let mut pending = PendingRequest {
            pool: &pool,
            armed: true,
        };

        let awaited: Vec<Algorithm> = Algorithm::ALL
            .into_iter()
            .filter(|algorithm| pool.slot(*algorithm).needs_acknowledgement())
            .collect();
        trace!(epoch = request.epoch(), awaiting = ?awaited, "Quiescence requested");

        let confirmation = if awaited.is_empty() {
            self.stats.skipped_waits += 1;
            Confirmation::AllSuspended
        } else {
            // Idle-parked workers (e.g. just exhausted) must see the request.
            for algorithm in &awaited {
                pool.wake(*algorithm);
            }

            let started = Instant::now();
            let confirmed = match self.ack_timeout {
                None => {
                    await_acknowledgements(&pool, request, &awaited).await;
                    true
                }
                Some(limit) => {
                    tokio::time::timeout(limit, await_acknowledgements(&pool, request, &awaited))
                        .await
                        .is_ok()
                }
            };
            let waited = started.elapsed();

            if !confirmed {
                let silent: Vec<Algorithm> = awaited
                    .iter()
                    .copied()
                    .filter(|algorithm| !pool.slot(*algorithm).has_acknowledged(request.epoch()))
                    .collect();
                for algorithm in &silent {
                    self.faulted[algorithm.index()] = true;
                }
                self.stats.faults += 1;
                warn!(
                    epoch = request.epoch(),
                    pending = ?silent,
                    waited_ms = waited.as_millis(),
                    "Quiescence not confirmed, withdrawing request"
                );
                // `pending` withdraws the request on drop.
                return Err(QuiescenceError::Unconfirmed {
                    epoch: request.epoch(),
                    pending: silent,
                    waited,
                });
            }

            for algorithm in &awaited {
                if std::mem::take(&mut self.faulted[algorithm.index()]) {
                    debug!(%algorithm, "Computation acknowledged again, fault cleared");
                }
            }
            self.stats.acknowledged_waits += 1;
            self.stats.longest_wait = self.stats.longest_wait.max(waited);
            Confirmation::Acknowledged
        };

        pending.armed = false;
        self.stats.windows += 1;
        Ok(QuiescenceWindow {
            coordinator: self,
            request,
            confirmation,
        })
    }
}

async fn await_acknowledgements(
    pool: &ComputationPool,
    request: RequestWord,
    awaited: &[Algorithm],
) {
    loop {
        // Created before the check so an acknowledgement landing in between
        // leaves a permit instead of being lost.
        let notified = pool.signal.acknowledged.notified();
        if awaited
            .iter()
            .all(|algorithm| pool.slot(*algorithm).has_acknowledged(request.epoch()))
        {
            return;
        }
        notified.await;
    }
}

/// Withdraws a request unless disarmed (error and cancellation paths)
struct PendingRequest<'a> {
    pool: &'a ComputationPool,
    armed: bool,
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.pool.signal.release();
            self.pool.wake_all();
        }
    }
}

/// Exclusive access to all accumulators until dropped
///
/// Accessors hand out references tied to the window's lifetime, so nothing
/// read or written here can outlive the quiescent period.
pub struct QuiescenceWindow<'a> {
    coordinator: &'a mut QuiescenceCoordinator,
    request: RequestWord,
    confirmation: Confirmation,
}

impl std::fmt::Debug for QuiescenceWindow<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuiescenceWindow")
            .field("epoch", &self.request.epoch())
            .field("confirmation", &self.confirmation)
            .finish_non_exhaustive()
    }
}

impl QuiescenceWindow<'_> {
    fn pool(&self) -> &ComputationPool {
        &self.coordinator.pool
    }

    /// Epoch of the request this window answers
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.request.epoch()
    }

    /// How the window was confirmed
    #[must_use]
    pub fn confirmation(&self) -> Confirmation {
        self.confirmation
    }

    /// Run state of a computation
    #[must_use]
    pub fn run_state(&self, algorithm: Algorithm) -> RunState {
        self.pool().slot(algorithm).run_state()
    }

    /// Change a computation's run state; takes effect on release
    pub fn set_run_state(&mut self, algorithm: Algorithm, state: RunState) {
        self.pool().slot(algorithm).set_run_state(state);
    }

    /// Read a computation's accumulator
    #[must_use]
    pub fn accumulator(&self, algorithm: Algorithm) -> &Accumulator {
        // SAFETY: the window exists only while every running worker has
        // acknowledged (or none runs), and it is released on drop, after
        // this borrow ends.
        unsafe { &*self.pool().slot(algorithm).cell.as_ptr() }
    }

    /// Mutate a computation's accumulator
    pub fn accumulator_mut(&mut self, algorithm: Algorithm) -> &mut Accumulator {
        // SAFETY: as in `accumulator`; `&mut self` keeps this unique.
        unsafe { &mut *self.pool().slot(algorithm).cell.as_ptr() }
    }

    /// Zero a computation's accumulator and lift its exhausted state
    pub fn reset(&mut self, algorithm: Algorithm) {
        self.accumulator_mut(algorithm).reset();
        self.pool().slot(algorithm).clear_exhausted();
    }

    /// Value copy of a computation's state
    #[must_use]
    pub fn snapshot(&self, algorithm: Algorithm, now: Duration) -> ComputationSnapshot {
        ComputationSnapshot::capture(
            self.accumulator(algorithm),
            self.run_state(algorithm),
            now,
        )
    }
}

impl Drop for QuiescenceWindow<'_> {
    fn drop(&mut self) {
        let pool = &self.coordinator.pool;
        pool.signal.release();
        pool.wake_all();
        trace!(epoch = self.request.epoch(), "Quiescence released");
    }
}
