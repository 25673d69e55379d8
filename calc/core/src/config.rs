//! TOML Configuration File Support
//!
//! Centralized configuration loading for the engine, backed by a TOML file at
//! `~/.config/picalc/picalc.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (applied by the caller through [`ConfigOverrides`])
//! 2. Environment variables (`PICALC_*`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [presentation]
//! refresh_ms = 500
//! input_poll_ms = 10
//! reset_on_switch = true
//!
//! [quiescence]
//! ack_timeout_ms = 0          # 0 waits forever
//!
//! [series]
//! convergence_tolerance = 1e-5
//! finite = false
//! leibniz_epsilon = 5e-6
//! nilakantha_epsilon = 1e-5
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::ConvergenceBand;
use crate::series::{Algorithm, Termination};

/// Default finite threshold for Leibniz, compared against `1/(2k+1)`
pub const DEFAULT_LEIBNIZ_EPSILON: f64 = 5e-6;
/// Default finite threshold for Nilakantha; the first term below it is still added
pub const DEFAULT_NILAKANTHA_EPSILON: f64 = 1e-5;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Presentation section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationToml {
    /// Presentation cycle period in milliseconds
    pub refresh_ms: Option<u64>,

    /// Input polling period in milliseconds
    pub input_poll_ms: Option<u64>,

    /// Whether switching algorithms zeroes the one left behind
    pub reset_on_switch: Option<bool>,
}

/// Quiescence section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuiescenceToml {
    /// Acknowledgement timeout in milliseconds (0 = wait forever)
    pub ack_timeout_ms: Option<u64>,
}

/// Series section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesToml {
    /// Distance from pi at which convergence time is latched
    pub convergence_tolerance: Option<f64>,

    /// Stop each series once its terms drop below its epsilon
    pub finite: Option<bool>,

    /// Leibniz term threshold when `finite` is set
    pub leibniz_epsilon: Option<f64>,

    /// Nilakantha term threshold when `finite` is set
    pub nilakantha_epsilon: Option<f64>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PiCalcToml {
    /// Presentation configuration section
    pub presentation: PresentationToml,

    /// Quiescence configuration section
    pub quiescence: QuiescenceToml,

    /// Series configuration section
    pub series: SeriesToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved engine configuration
///
/// Use [`load_config`] to build one with proper priority handling.
#[derive(Clone, Debug, PartialEq)]
pub struct PiCalcConfig {
    /// Presentation cycle period
    pub refresh_period: Duration,

    /// Input polling period
    pub input_poll_period: Duration,

    /// Bound on waiting for acknowledgements (`None` waits forever)
    pub ack_timeout: Option<Duration>,

    /// Whether switching algorithms zeroes the one left behind
    pub reset_on_switch: bool,

    /// Distance from pi at which convergence time is latched
    pub convergence_tolerance: f64,

    /// Use the finite termination thresholds
    pub finite: bool,

    /// Leibniz term threshold
    pub leibniz_epsilon: f64,

    /// Nilakantha term threshold
    pub nilakantha_epsilon: f64,

    /// Capacity of the input event channel
    pub input_buffer: usize,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for PiCalcConfig {
    fn default() -> Self {
        Self {
            refresh_period: Duration::from_millis(500),
            input_poll_period: Duration::from_millis(10),
            ack_timeout: None,
            reset_on_switch: true,
            convergence_tolerance: 1e-5,
            finite: false,
            leibniz_epsilon: DEFAULT_LEIBNIZ_EPSILON,
            nilakantha_epsilon: DEFAULT_NILAKANTHA_EPSILON,
            input_buffer: 64,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl PiCalcConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Termination policy for an algorithm
    #[must_use]
    pub fn termination(&self, algorithm: Algorithm) -> Termination {
        if !self.finite {
            return Termination::Unbounded;
        }
        match algorithm {
            Algorithm::Leibniz => Termination::BelowEpsilon(self.leibniz_epsilon),
            Algorithm::Nilakantha => Termination::BelowEpsilon(self.nilakantha_epsilon),
        }
    }

    /// Band used for the convergence latch
    #[must_use]
    pub fn convergence_band(&self) -> ConvergenceBand {
        ConvergenceBand::around_pi(self.convergence_tolerance)
    }

    /// Reject values the engine cannot run with
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_period.is_zero() {
            return Err(ConfigError::ValidationError(
                "refresh period must be greater than zero".to_string(),
            ));
        }
        if self.input_poll_period.is_zero() {
            return Err(ConfigError::ValidationError(
                "input poll period must be greater than zero".to_string(),
            ));
        }
        if self.input_buffer == 0 {
            return Err(ConfigError::ValidationError(
                "input buffer must hold at least one event".to_string(),
            ));
        }
        for (name, value) in [
            ("convergence_tolerance", self.convergence_tolerance),
            ("leibniz_epsilon", self.leibniz_epsilon),
            ("nilakantha_epsilon", self.nilakantha_epsilon),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/picalc/picalc.toml` or
/// `~/.config/picalc/picalc.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("picalc").join("picalc.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or the
/// result does not validate. A missing config file is not an error.
pub fn load_config() -> Result<PiCalcConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or the result does not validate.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<PiCalcConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// [`load_config_from_path`] with an explicit environment lookup
///
/// # Errors
///
/// Same as [`load_config_from_path`].
pub fn load_config_with_env(
    path: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<PiCalcConfig, ConfigError> {
    let mut config = PiCalcConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: PiCalcToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);
    config.validate()?;

    Ok(config)
}

fn ack_timeout_from_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then_some(Duration::from_millis(ms))
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut PiCalcConfig, toml: &PiCalcToml) {
    // Presentation settings
    if let Some(ms) = toml.presentation.refresh_ms {
        config.refresh_period = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.presentation.input_poll_ms {
        config.input_poll_period = Duration::from_millis(ms);
    }
    if let Some(reset) = toml.presentation.reset_on_switch {
        config.reset_on_switch = reset;
    }

    // Quiescence settings
    if let Some(ms) = toml.quiescence.ack_timeout_ms {
        config.ack_timeout = ack_timeout_from_ms(ms);
    }

    // Series settings
    if let Some(tolerance) = toml.series.convergence_tolerance {
        config.convergence_tolerance = tolerance;
    }
    if let Some(finite) = toml.series.finite {
        config.finite = finite;
    }
    if let Some(epsilon) = toml.series.leibniz_epsilon {
        config.leibniz_epsilon = epsilon;
    }
    if let Some(epsilon) = toml.series.nilakantha_epsilon {
        config.nilakantha_epsilon = epsilon;
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut PiCalcConfig, env: impl Fn(&str) -> Option<String>) {
    if let Some(ms) = env("PICALC_REFRESH_MS").and_then(|v| v.parse::<u64>().ok()) {
        config.refresh_period = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = env("PICALC_INPUT_POLL_MS").and_then(|v| v.parse::<u64>().ok()) {
        config.input_poll_period = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = env("PICALC_ACK_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok()) {
        config.ack_timeout = ack_timeout_from_ms(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(reset) = env("PICALC_RESET_ON_SWITCH") {
        config.reset_on_switch = reset != "0" && reset.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }
    if let Some(tolerance) = env("PICALC_TOLERANCE").and_then(|v| v.parse::<f64>().ok()) {
        config.convergence_tolerance = tolerance;
        config.source = ConfigSource::Env;
    }
    if let Some(finite) = env("PICALC_FINITE") {
        config.finite = finite != "0" && finite.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Refresh period override (milliseconds)
    pub refresh_ms: Option<u64>,

    /// Acknowledgement timeout override (milliseconds, 0 = forever)
    pub ack_timeout_ms: Option<u64>,

    /// Reset-on-switch override
    pub reset_on_switch: Option<bool>,

    /// Convergence tolerance override
    pub convergence_tolerance: Option<f64>,

    /// Finite termination override
    pub finite: Option<bool>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set refresh period override
    #[must_use]
    pub fn with_refresh_ms(mut self, ms: u64) -> Self {
        self.refresh_ms = Some(ms);
        self
    }

    /// Set acknowledgement timeout override
    #[must_use]
    pub fn with_ack_timeout_ms(mut self, ms: u64) -> Self {
        self.ack_timeout_ms = Some(ms);
        self
    }

    /// Set reset-on-switch override
    #[must_use]
    pub fn with_reset_on_switch(mut self, reset: bool) -> Self {
        self.reset_on_switch = Some(reset);
        self
    }

    /// Set convergence tolerance override
    #[must_use]
    pub fn with_convergence_tolerance(mut self, tolerance: f64) -> Self {
        self.convergence_tolerance = Some(tolerance);
        self
    }

    /// Set finite termination override
    #[must_use]
    pub fn with_finite(mut self, finite: bool) -> Self {
        self.finite = Some(finite);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut PiCalcConfig) {
        if self.refresh_ms.is_some()
            || self.ack_timeout_ms.is_some()
            || self.reset_on_switch.is_some()
            || self.convergence_tolerance.is_some()
            || self.finite.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ms) = self.refresh_ms {
            config.refresh_period = Duration::from_millis(ms);
        }
        if let Some(ms) = self.ack_timeout_ms {
            config.ack_timeout = ack_timeout_from_ms(ms);
        }
        if let Some(reset) = self.reset_on_switch {
            config.reset_on_switch = reset;
        }
        if let Some(tolerance) = self.convergence_tolerance {
            config.convergence_tolerance = tolerance;
        }
        if let Some(finite) = self.finite {
            config.finite = finite;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
