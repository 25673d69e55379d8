//! PiCalc TUI Entry Point
//!
//! Usage:
//!   picalc-tui [OPTIONS]
//!
//! Keys:
//!   Left / 1     show Leibniz
//!   Right / 2    show Nilakantha
//!   Space / s    start or stop the shown series
//!   r            reset the shown series (only while stopped)
//!   q / Esc      quit
//!
//! Without a terminal, or with `--headless`, one series is started
//! automatically and frames are printed as text.

use std::fs;
use std::io::{self, IsTerminal};
use std::panic;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use picalc_core::{
    load_config_from_path, Algorithm, ConfigOverrides, PiCalcConfig, PresentationReport,
};
use picalc_tui::{run_headless, run_terminal, summary};

/// PiCalc - approximate pi with the Leibniz and Nilakantha series
#[derive(Parser, Debug)]
#[command(name = "picalc-tui")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long, env = "PICALC_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print frames as text instead of drawing the LCD
    #[arg(long)]
    headless: bool,

    /// Series started by a headless run
    #[arg(short = 'a', long, default_value = "nilakantha", value_parser = parse_algorithm)]
    algorithm: Algorithm,

    /// How long a headless run lasts
    #[arg(long, default_value_t = 3_000, value_name = "MS")]
    run_ms: u64,

    /// Presentation refresh period
    #[arg(long, value_name = "MS")]
    refresh_ms: Option<u64>,

    /// Give up on a pause request after this long (0 waits forever)
    #[arg(long, value_name = "MS")]
    ack_timeout_ms: Option<u64>,

    /// Stop each series once its terms fall below epsilon
    #[arg(long)]
    finite: bool,

    /// Keep a stopped series' progress when switching away from it
    #[arg(long)]
    keep_on_switch: bool,

    /// Width of the convergence band around pi
    #[arg(long, value_name = "TOLERANCE")]
    tolerance: Option<f64>,

    /// Log file for the terminal surface
    #[arg(long, env = "PICALC_LOG_FILE", value_name = "FILE")]
    log_file: Option<PathBuf>,
}

fn parse_algorithm(s: &str) -> Result<Algorithm, String> {
    Algorithm::parse(s).ok_or_else(|| format!("unknown algorithm '{s}' (leibniz, nilakantha)"))
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(ms) = self.refresh_ms {
            overrides = overrides.with_refresh_ms(ms);
        }
        if let Some(ms) = self.ack_timeout_ms {
            overrides = overrides.with_ack_timeout_ms(ms);
        }
        if let Some(tolerance) = self.tolerance {
            overrides = overrides.with_convergence_tolerance(tolerance);
        }
        if self.finite {
            overrides = overrides.with_finite(true);
        }
        if self.keep_on_switch {
            overrides = overrides.with_reset_on_switch(false);
        }
        overrides
    }

    fn is_headless(&self) -> bool {
        self.headless || !io::stdin().is_terminal() || !io::stdout().is_terminal()
    }
}

fn load_config(cli: &Cli) -> Result<PiCalcConfig> {
    let mut config = load_config_from_path(cli.config.clone())?;
    cli.overrides().apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Log to a file; stdout belongs to the LCD
fn init_file_logging(path: Option<PathBuf>) -> Result<()> {
    let path = path
        .or_else(|| dirs::cache_dir().map(|dir| dir.join("picalc").join("picalc.log")))
        .context("No log file given and no cache directory available")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {parent:?}"))?;
    }
    let file = fs::File::create(&path)
        .with_context(|| format!("Failed to create log file: {path:?}"))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .with(EnvFilter::from_default_env().add_directive("picalc_core=info".parse()?))
        .init();
    Ok(())
}

fn init_stderr_logging() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .with(EnvFilter::from_default_env().add_directive("picalc_core=info".parse()?))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let headless = cli.is_headless();

    if headless {
        init_stderr_logging()?;
    } else {
        init_file_logging(cli.log_file.clone())?;
    }

    let config = load_config(&cli)?;
    info!(source = %config.source(), ?config, "Configuration loaded");

    let report = if headless {
        run_headless(
            io::stdout(),
            config,
            cli.algorithm,
            Duration::from_millis(cli.run_ms),
        )
        .await?
    } else {
        run_interactive(config).await?
    };

    for line in summary(&report) {
        println!("{line}");
    }
    Ok(())
}

async fn run_interactive(config: PiCalcConfig) -> Result<PresentationReport> {
    // Set up panic hook to restore terminal
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    terminal.clear()?;
    terminal.hide_cursor()?;

    let result = run_terminal(terminal, config).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show)?;

    result
}
