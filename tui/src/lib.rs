//! PiCalc TUI - Terminal surface for the pi calculator
//!
//! Emulates the 4x20 character LCD and four push buttons of the reference
//! device in a terminal.
//!
//! # Architecture
//!
//! - **Display**: character grid plus terminal and plain-text sinks
//! - **Input**: keyboard mapping and a scripted headless source
//! - **Widgets**: the LCD panel
//! - **App**: wiring a surface to the engine

pub mod app;
pub mod display;
pub mod input;
pub mod theme;
pub mod widgets;

pub use app::{run_headless, run_terminal, summary};
pub use display::{LcdGrid, LineDisplay, TerminalDisplay};
pub use input::{KeyboardInput, ScriptedInput};
