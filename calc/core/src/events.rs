//! Input Events and UI Mode
//!
//! Surfaces only report which button was pressed. What a press means
//! depends on the current [`UiMode`] and the run state of the displayed
//! computation, and is decided by the lifecycle controller.

use serde::{Deserialize, Serialize};

use crate::series::Algorithm;

/// Discrete user input, consumed once per presentation cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputEvent {
    /// Left button: select (or switch to) Leibniz
    SelectLeft,
    /// Right button: select (or switch to) Nilakantha
    SelectRight,
    /// Toggle the displayed computation between running and suspended
    StartStop,
    /// Zero the displayed computation
    Reset,
}

impl InputEvent {
    /// Algorithm a select event points at
    #[must_use]
    pub fn selected_algorithm(self) -> Option<Algorithm> {
        match self {
            Self::SelectLeft => Some(Algorithm::Leibniz),
            Self::SelectRight => Some(Algorithm::Nilakantha),
            Self::StartStop | Self::Reset => None,
        }
    }
}

/// Which screen is shown; owned by the presentation loop
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UiMode {
    /// Welcome screen, no algorithm selected yet
    #[default]
    Init,
    /// Showing the Leibniz computation
    ShowingLeibniz,
    /// Showing the Nilakantha computation
    ShowingNilakantha,
}

impl UiMode {
    /// Mode that shows an algorithm
    #[must_use]
    pub fn showing(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Leibniz => Self::ShowingLeibniz,
            Algorithm::Nilakantha => Self::ShowingNilakantha,
        }
    }

    /// Algorithm on screen, `None` on the welcome screen
    #[must_use]
    pub fn algorithm(self) -> Option<Algorithm> {
        match self {
            Self::Init => None,
            Self::ShowingLeibniz => Some(Algorithm::Leibniz),
            Self::ShowingNilakantha => Some(Algorithm::Nilakantha),
        }
    }
}
