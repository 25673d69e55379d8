//! Lifecycle Controller
//!
//! Turns input events into run-state changes, resets and screen switches.
//! Every mutation happens through a [`QuiescenceWindow`], so the controller
//! can only act while the computations are quiescent.
//!
//! # Rules
//!
//! | Mode        | Event                 | Displayed state | Result                     |
//! |-------------|-----------------------|-----------------|----------------------------|
//! | Init        | SelectLeft/Right      | -               | show the chosen algorithm  |
//! | Init        | StartStop/Reset       | -               | ignored                    |
//! | Showing(a)  | StartStop             | Suspended       | start a                    |
//! | Showing(a)  | StartStop             | Running         | stop a                     |
//! | Showing(a)  | Reset                 | Suspended       | zero a                     |
//! | Showing(a)  | Reset                 | Running         | rejected                   |
//! | Showing(a)  | select b != a         | Suspended       | switch to b (reset a)      |
//! | Showing(a)  | select b != a         | Running         | rejected                   |
//! | Showing(a)  | select a              | -               | ignored                    |

use std::sync::Arc;

use tracing::{debug, info};

use crate::clock::Clock;
use crate::computation::RunState;
use crate::events::{InputEvent, UiMode};
use crate::quiescence::QuiescenceWindow;
use crate::series::Algorithm;

/// Why an event was refused
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// Switching away from a running computation
    SwitchWhileRunning,
    /// Resetting a running computation
    ResetWhileRunning,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SwitchWhileRunning => write!(f, "stop the computation before switching"),
            Self::ResetWhileRunning => write!(f, "stop the computation before resetting"),
        }
    }
}

/// Outcome of applying one event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// First algorithm chosen from the welcome screen
    Selected(Algorithm),
    /// Screen moved to another algorithm
    Switched {
        /// Algorithm shown before
        from: Algorithm,
        /// Algorithm shown now
        to: Algorithm,
    },
    /// Computation moved to `Running`
    Started(Algorithm),
    /// Computation moved to `Suspended`
    Stopped(Algorithm),
    /// Computation zeroed
    Reset(Algorithm),
    /// Event refused; nothing changed
    Rejected {
        /// The refused event
        event: InputEvent,
        /// Why
        reason: Rejection,
    },
    /// Event has no meaning in this mode
    Ignored(InputEvent),
}

impl Transition {
    /// Mode after this transition
    #[must_use]
    pub fn next_mode(self, current: UiMode) -> UiMode {
        match self {
            Self::Selected(algorithm) => UiMode::showing(algorithm),
            Self::Switched { to, .. } => UiMode::showing(to),
            _ => current,
        }
    }

    /// Whether anything changed
    #[must_use]
    pub fn is_accepted(self) -> bool {
        !matches!(self, Self::Rejected { .. } | Self::Ignored(_))
    }
}

/// Applies input events inside quiescence windows
pub struct LifecycleController {
    clock: Arc<dyn Clock>,
    reset_on_switch: bool,
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("reset_on_switch", &self.reset_on_switch)
            .finish_non_exhaustive()
    }
}

impl LifecycleController {
    /// Create a controller
    ///
    /// With `reset_on_switch` the computation switched away from is zeroed.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, reset_on_switch: bool) -> Self {
        Self {
            clock,
            reset_on_switch,
        }
    }

    /// Apply one event
    ///
    /// The caller feeds the returned transition's [`Transition::next_mode`]
    /// into the next call.
    pub fn apply(
        &self,
        mode: UiMode,
        event: InputEvent,
        window: &mut QuiescenceWindow<'_>,
    ) -> Transition {
        let transition = match mode.algorithm() {
            None => match event.selected_algorithm() {
                Some(algorithm) => Transition::Selected(algorithm),
                None => Transition::Ignored(event),
            },
            Some(shown) => self.apply_to(shown, event, window),
        };

        if transition.is_accepted() {
            info!(?mode, ?event, ?transition, "Lifecycle transition");
        } else {
            debug!(?mode, ?event, ?transition, "Lifecycle event not applied");
        }
        transition
    }

    fn apply_to(
        &self,
        shown: Algorithm,
        event: InputEvent,
        window: &mut QuiescenceWindow<'_>,
    ) -> Transition {
        let running = window.run_state(shown) == RunState::Running;

        match event {
            InputEvent::StartStop if running => {
                window.set_run_state(shown, RunState::Suspended);
                window
                    .accumulator_mut(shown)
                    .stopwatch
                    .stop(self.clock.now());
                Transition::Stopped(shown)
            }
            InputEvent::StartStop => {
                window.set_run_state(shown, RunState::Running);
                let accumulator = window.accumulator_mut(shown);
                // An exhausted series does no work, so its time stays frozen.
                if !accumulator.series.is_exhausted() {
                    accumulator.stopwatch.start(self.clock.now());
                }
                Transition::Started(shown)
            }
            InputEvent::Reset if running => Transition::Rejected {
                event,
                reason: Rejection::ResetWhileRunning,
            },
            InputEvent::Reset => {
                window.reset(shown);
                Transition::Reset(shown)
            }
            InputEvent::SelectLeft | InputEvent::SelectRight => {
                match event.selected_algorithm() {
                    Some(target) if target != shown => {
                        if running {
                            return Transition::Rejected {
                                event,
                                reason: Rejection::SwitchWhileRunning,
                            };
                        }
                        if self.reset_on_switch {
                            window.reset(shown);
                        }
                        Transition::Switched {
                            from: shown,
                            to: target,
                        }
                    }
                    _ => Transition::Ignored(event),
                }
            }
        }
    }
}
