//! Surface Collaborators
//!
//! The engine talks to the outside world through two small traits: a
//! character display it writes rows into and an input source it polls for
//! button presses. Terminal, LCD and headless implementations live in the
//! surface crates; the engine never knows which one it drives.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::events::InputEvent;

/// Errors raised by surface implementations
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// Terminal or stream I/O failed
    #[error("surface I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Write outside the display geometry
    #[error("position ({row}, {col}) is outside the {rows}x{cols} display")]
    OutOfBounds {
        /// Requested row
        row: u16,
        /// Requested column
        col: u16,
        /// Display rows
        rows: u16,
        /// Display columns
        cols: u16,
    },
}

/// Character-addressed output
pub trait DisplaySink: Send {
    /// Blank the whole display
    ///
    /// # Errors
    ///
    /// Implementation-specific I/O failures.
    fn clear(&mut self) -> Result<(), SurfaceError>;

    /// Write `text` starting at `(row, col)`; text past the last column is
    /// dropped
    ///
    /// # Errors
    ///
    /// Implementation-specific I/O failures or an out-of-range row.
    fn write_at(&mut self, row: u16, col: u16, text: &str) -> Result<(), SurfaceError>;

    /// Push buffered writes to the device
    ///
    /// Called after the quiescence window is released, so slow devices never
    /// extend the pause.
    ///
    /// # Errors
    ///
    /// Implementation-specific I/O failures.
    fn flush(&mut self) -> Result<(), SurfaceError> {
        Ok(())
    }
}

/// Result of polling an input source
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputPoll {
    /// Events since the last poll (possibly none)
    Events(Vec<InputEvent>),
    /// The source is finished; the engine shuts down
    Closed,
}

/// Button input, polled without blocking
pub trait InputSource: Send {
    /// Collect pending events
    ///
    /// # Errors
    ///
    /// Implementation-specific I/O failures.
    fn poll(&mut self) -> Result<InputPoll, SurfaceError>;
}

/// Poll `source` every `period` and forward events until it closes
///
/// Returns when the source reports [`InputPoll::Closed`] or the receiving
/// side is gone. Dropping the sender on return is what ends the
/// presentation loop.
///
/// # Errors
///
/// Returns the first error reported by the source.
pub async fn pump_input(
    mut source: Box<dyn InputSource>,
    period: Duration,
    events: mpsc::Sender<InputEvent>,
) -> Result<(), SurfaceError> {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match source.poll()? {
            InputPoll::Events(batch) => {
                for event in batch {
                    trace!(?event, "Input event");
                    if events.send(event).await.is_err() {
                        debug!("Event receiver dropped, stopping input pump");
                        return Ok(());
                    }
                }
            }
            InputPoll::Closed => {
                debug!("Input source closed");
                return Ok(());
            }
        }
    }
}
