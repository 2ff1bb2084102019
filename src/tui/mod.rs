//! Front panel for the UE1 emulator.
//!
//! Provides an interactive terminal front panel with:
//! - Lamps for every register and flag
//! - Input switches IR1-IR7 toggled from the keyboard
//! - Step/run/pause/reset controls
//! - Program listing

mod app;
mod ui;

pub use app::{run_panel, PanelApp};
