//! Terminal UI module using ratatui.
//!
//! - `render`: Main frame rendering, layout and overlays
//! - `input`: Keyboard event handling
//! - `styles`: Color scheme and text styling
//! - `views`: Per-screen content (auth forms, package list, package detail)

pub mod input;
pub mod render;
pub mod styles;
pub mod views;
