//! Per-screen rendering.

pub mod auth;
pub mod dashboard;
pub mod detail;
