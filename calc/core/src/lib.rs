//! PiCalc Core - Headless Pi Series Engine
//!
//! This crate approximates pi with two infinite series that run as
//! independently pausable computations, while a slow periodic observer reads
//! their progress and applies user input. No UI framework is involved; the
//! terminal surface lives in its own crate.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Surfaces (tui)                          │
//! │     InputSource ──▶ pump_input ──▶ mpsc ──┐   DisplaySink ◀─┐ │
//! └───────────────────────────────────────────┼─────────────────┼─┘
//!                                             ▼                 │
//! ┌──────────────────────────────────────────────────────────────┐
//! │  PresentationLoop (tokio task, owns UiMode)                   │
//! │    acquire ─▶ snapshot ─▶ render ─▶ LifecycleController ─▶    │
//! │    release ─▶ flush                                           │
//! │        │                                                      │
//! │  QuiescenceCoordinator ◀── epoch / pause bit / acks ──┐       │
//! │        │                                              │       │
//! │        ▼                                              │       │
//! │  ComputationPool: [Leibniz slot] [Nilakantha slot]    │       │
//! │        ▲                    ▲                         │       │
//! │  SeriesComputation    SeriesComputation (OS threads) ─┘       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Overview
//!
//! - [`series`]: incremental Leibniz and Nilakantha evaluation
//! - [`clock`]: clock abstraction, stopwatch and convergence band
//! - [`accumulator`]: per-computation mutable state and its handoff cell
//! - [`computation`]: worker threads and the shared computation pool
//! - [`quiescence`]: the pause-request / acknowledge handshake
//! - [`lifecycle`]: start, stop, reset and switch rules
//! - [`presentation`]: the periodic observer and screen rendering
//! - [`surface`]: display and input collaborator traits
//! - [`engine`]: wiring and teardown
//! - [`config`]: TOML, environment and CLI configuration
//!
//! # No TUI Dependencies
//!
//! This crate has **zero** dependencies on ratatui, crossterm, or any other
//! UI framework.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod accumulator;
pub mod clock;
pub mod computation;
pub mod config;
pub mod engine;
pub mod events;
pub mod lifecycle;
pub mod presentation;
pub mod quiescence;
pub mod series;
pub mod surface;

// Re-exports for convenience
pub use accumulator::{Accumulator, ComputationSnapshot};
pub use clock::{Clock, ConvergenceBand, ManualClock, Stopwatch, SystemClock};
pub use computation::{
    ComputationError, ComputationPool, ComputationSlot, RunState, SeriesComputation, WorkerHandle,
    WorkerPoll,
};
pub use engine::{Engine, EngineError};
pub use events::{InputEvent, UiMode};
pub use lifecycle::{LifecycleController, Rejection, Transition};
pub use presentation::{CycleOutcome, PresentationLoop, PresentationReport, Screen};
pub use quiescence::{
    Confirmation, QuiescenceCoordinator, QuiescenceError, QuiescenceSignal, QuiescenceStats,
    QuiescenceWindow, RequestWord,
};
pub use series::{Algorithm, SeriesState, StepOutcome, Termination, TARGET};
pub use surface::{pump_input, DisplaySink, InputPoll, InputSource, SurfaceError};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, PiCalcConfig, PiCalcToml,
};
