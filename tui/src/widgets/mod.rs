//! Widgets

mod lcd;

pub use lcd::LcdPanel;
