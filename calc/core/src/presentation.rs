//! Presentation Loop
//!
//! The periodic observer. Each cycle it:
//!
//! 1. acquires a quiescence window,
//! 2. snapshots the computation shown by the current [`UiMode`],
//! 3. renders that snapshot into the display buffer,
//! 4. applies the input events collected since the last cycle,
//! 5. releases the window,
//! 6. flushes the display, outside the window.
//!
//! When the window cannot be confirmed, rendering and input handling are
//! skipped and the collected events wait for the next cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::accumulator::ComputationSnapshot;
use crate::clock::Clock;
use crate::events::{InputEvent, UiMode};
use crate::lifecycle::{LifecycleController, Transition};
use crate::quiescence::{QuiescenceCoordinator, QuiescenceStats};
use crate::series::Algorithm;
use crate::surface::{DisplaySink, SurfaceError};

/// Display rows
pub const SCREEN_ROWS: usize = 4;
/// Display columns
pub const SCREEN_COLS: usize = 20;

/// One frame of text, one string per display row
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Screen {
    lines: [String; SCREEN_ROWS],
}

impl Screen {
    /// Welcome screen
    #[must_use]
    pub fn welcome() -> Self {
        Self {
            lines: [
                "PI-Calc HS2023".to_string(),
                "Left : Leibniz".to_string(),
                "Right: Nilakantha".to_string(),
                "Select algorithm".to_string(),
            ],
        }
    }

    /// Screen for one computation
    #[must_use]
    pub fn computation(snapshot: &ComputationSnapshot) -> Self {
        let status = match (snapshot.exhausted, snapshot.run_state) {
            (true, _) => "DONE",
            (false, state) => state.label(),
        };
        let time = match snapshot.converged_after {
            Some(converged) => format!("Conv: {}", format_duration(converged)),
            None => format!("Time: {}", format_duration(snapshot.elapsed)),
        };
        Self {
            lines: [
                format!("{:<14}{:>6}", snapshot.algorithm.label(), status),
                format!("PI: {:.8}", snapshot.approximation),
                time,
                format!("Iter: {}", snapshot.iteration),
            ],
        }
    }

    /// Screen for a mode; `snapshot` must belong to the mode's algorithm
    #[must_use]
    pub fn for_mode(mode: UiMode, snapshot: Option<&ComputationSnapshot>) -> Self {
        match (mode.algorithm(), snapshot) {
            (Some(_), Some(snapshot)) => Self::computation(snapshot),
            _ => Self::welcome(),
        }
    }

    /// Row text
    #[must_use]
    pub fn lines(&self) -> &[String; SCREEN_ROWS] {
        &self.lines
    }

    fn draw(&self, display: &mut dyn DisplaySink) -> Result<(), SurfaceError> {
        display.clear()?;
        for (row, line) in (0u16..).zip(self.lines.iter()) {
            display.write_at(row, 0, line)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{line}")?;
        }
        Ok(())
    }
}

/// `12.345 s`
fn format_duration(duration: Duration) -> String {
    format!("{}.{:03} s", duration.as_secs(), duration.subsec_millis())
}

/// What one cycle did
#[derive(Clone, Debug, PartialEq)]
pub struct CycleOutcome {
    /// Whether a frame was drawn (false when quiescence was not confirmed)
    pub rendered: bool,
    /// Transitions applied this cycle, in event order
    pub transitions: Vec<Transition>,
    /// The input channel disconnected
    pub input_closed: bool,
}

/// Summary returned when the loop ends
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PresentationReport {
    /// Cycles run
    pub cycles: u64,
    /// Cycles that drew a frame
    pub rendered: u64,
    /// Cycles skipped because quiescence was not confirmed
    pub skipped: u64,
    /// Events accepted by the lifecycle controller
    pub accepted: u64,
    /// Events rejected by the lifecycle controller
    pub rejected: u64,
    /// Mode at exit
    pub final_mode: UiMode,
    /// Last frame drawn
    pub last_screen: Option<Screen>,
    /// Both computations at exit, if a final window could be confirmed
    pub snapshots: Vec<ComputationSnapshot>,
    /// Coordinator counters at exit
    pub quiescence: QuiescenceStats,
}

impl PresentationReport {
    /// Final snapshot of one computation
    #[must_use]
    pub fn snapshot(&self, algorithm: Algorithm) -> Option<&ComputationSnapshot> {
        self.snapshots.iter().find(|s| s.algorithm == algorithm)
    }
}

/// The periodic observer and the sole owner of [`UiMode`]
pub struct PresentationLoop {
    coordinator: QuiescenceCoordinator,
    controller: LifecycleController,
    display: Box<dyn DisplaySink>,
    events: mpsc::Receiver<InputEvent>,
    pending: Vec<InputEvent>,
    clock: Arc<dyn Clock>,
    period: Duration,
    mode: UiMode,
    report: PresentationReport,
}

impl std::fmt::Debug for PresentationLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresentationLoop")
            .field("coordinator", &self.coordinator)
            .field("period", &self.period)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl PresentationLoop {
    /// Wire up a loop; nothing runs until [`PresentationLoop::run`]
    #[must_use]
    pub fn new(
        coordinator: QuiescenceCoordinator,
        controller: LifecycleController,
        display: Box<dyn DisplaySink>,
        events: mpsc::Receiver<InputEvent>,
        clock: Arc<dyn Clock>,
        period: Duration,
    ) -> Self {
        Self {
            coordinator,
            controller,
            display,
            events,
            pending: Vec::new(),
            clock,
            period,
            mode: UiMode::Init,
            report: PresentationReport::default(),
        }
    }

    /// Current mode
    #[must_use]
    pub fn mode(&self) -> UiMode {
        self.mode
    }

    /// Run cycles at the configured period until the input channel
    /// disconnects
    ///
    /// # Errors
    ///
    /// Returns the first display error.
    pub async fn run(mut self) -> Result<PresentationReport, SurfaceError> {
        info!(period_ms = self.period.as_millis(), "Presentation loop started");
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if self.cycle().await?.input_closed {
                break;
            }
        }

        self.finish().await
    }

    /// One acquire / render / apply / release / flush pass
    ///
    /// # Errors
    ///
    /// Returns display errors; the window is released first.
    pub async fn cycle(&mut self) -> Result<CycleOutcome, SurfaceError> {
        let input_closed = self.collect_events();
        self.report.cycles += 1;

        let mut mode = self.mode;
        let mut transitions = Vec::new();
        {
            let mut window = match self.coordinator.acquire().await {
                Ok(window) => window,
                Err(err) => {
                    warn!(error = %err, pending_events = self.pending.len(), "Skipping presentation cycle");
                    self.report.skipped += 1;
                    return Ok(CycleOutcome {
                        rendered: false,
                        transitions,
                        input_closed,
                    });
                }
            };

            let now = self.clock.now();
            let snapshot = mode
                .algorithm()
                .map(|algorithm| window.snapshot(algorithm, now));
            let screen = Screen::for_mode(mode, snapshot.as_ref());
            screen.draw(self.display.as_mut())?;

            for event in self.pending.drain(..) {
                let transition = self.controller.apply(mode, event, &mut window);
                mode = transition.next_mode(mode);
                transitions.push(transition);
            }
            self.report.last_screen = Some(screen);
        }

        self.display.flush()?;

        if mode != self.mode {
            debug!(from = ?self.mode, to = ?mode, "UI mode changed");
            self.mode = mode;
        }
        self.report.rendered += 1;
        for transition in &transitions {
            if transition.is_accepted() {
                self.report.accepted += 1;
            } else if matches!(transition, Transition::Rejected { .. }) {
                self.report.rejected += 1;
            }
        }

        Ok(CycleOutcome {
            rendered: true,
            transitions,
            input_closed,
        })
    }

    /// Move queued events into `pending`; true once the sender is gone
    fn collect_events(&mut self) -> bool {
        loop {
            match self.events.try_recv() {
                Ok(event) => self.pending.push(event),
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => return true,
            }
        }
    }

    async fn finish(mut self) -> Result<PresentationReport, SurfaceError> {
        let now = self.clock.now();
        match self.coordinator.acquire().await {
            Ok(window) => {
                self.report.snapshots = Algorithm::ALL
                    .into_iter()
                    .map(|algorithm| window.snapshot(algorithm, now))
                    .collect();
            }
            Err(err) => warn!(error = %err, "No final snapshot"),
        }

        self.report.final_mode = self.mode;
        self.report.quiescence = self.coordinator.stats();
        info!(
            cycles = self.report.cycles,
            skipped = self.report.skipped,
            accepted = self.report.accepted,
            rejected = self.report.rejected,
            "Presentation loop finished"
        );
        Ok(self.report)
    }
}
