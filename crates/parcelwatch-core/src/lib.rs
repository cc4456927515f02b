//! Core library for parcelwatch.
//!
//! - `api`: typed HTTP client for the package-tracking REST API
//! - `auth`: session store holding the bearer credential
//! - `models`: packages, tracking events, carriers
//! - `config`: user configuration and directory layout

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod utils;

pub use api::{ApiClient, ApiError, ApiResult, ErrorKind};
pub use auth::{Session, TokenSlot};
pub use config::{Config, TokenStorage};
