//! Application Wiring
//!
//! Connects a surface to the engine. The terminal run reads the keyboard
//! and draws the LCD panel; the headless run scripts one algorithm and
//! prints frames as text.

use std::io::Write;
use std::time::Duration;

use ratatui::backend::Backend;
use ratatui::Terminal;
use tracing::info;

use picalc_core::{Algorithm, Engine, PiCalcConfig, PresentationReport};

use crate::display::{LineDisplay, TerminalDisplay};
use crate::input::{KeyboardInput, ScriptedInput};

/// Run interactively until the user quits
///
/// The terminal must already be in raw mode.
pub async fn run_terminal<B>(
    terminal: Terminal<B>,
    config: PiCalcConfig,
) -> anyhow::Result<PresentationReport>
where
    B: Backend + Send + 'static,
{
    info!(source = %config.source(), "Starting terminal surface");
    let report = Engine::new(config)
        .run(
            Box::new(KeyboardInput::new()),
            Box::new(TerminalDisplay::new(terminal)),
        )
        .await?;
    Ok(report)
}

/// Run `algorithm` for `run_for`, printing each changed frame to `out`
pub async fn run_headless<W>(
    out: W,
    config: PiCalcConfig,
    algorithm: Algorithm,
    run_for: Duration,
) -> anyhow::Result<PresentationReport>
where
    W: Write + Send + 'static,
{
    info!(%algorithm, run_ms = run_for.as_millis(), "Starting headless surface");
    let report = Engine::new(config)
        .run(
            Box::new(ScriptedInput::new(algorithm, run_for)),
            Box::new(LineDisplay::new(out)),
        )
        .await?;
    Ok(report)
}

/// One line per computation that made progress
pub fn summary(report: &PresentationReport) -> Vec<String> {
    report
        .snapshots
        .iter()
        .filter(|snapshot| snapshot.iteration > 0)
        .map(|snapshot| {
            let mut line = format!(
                "{}: {:.10} after {} iterations in {:.3} s",
                snapshot.algorithm,
                snapshot.approximation,
                snapshot.iteration,
                snapshot.elapsed.as_secs_f64()
            );
            if let Some(converged) = snapshot.converged_after {
                line.push_str(&format!(" (converged at {:.3} s)", converged.as_secs_f64()));
            }
            line
        })
        .collect()
}
