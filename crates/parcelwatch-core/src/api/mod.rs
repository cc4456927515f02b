//! REST API client module for the package-tracking service.
//!
//! This module provides the `ApiClient` for registering, logging in and
//! managing tracked packages on the remote API.
//!
//! Authenticated endpoints use a bearer token taken from the shared
//! `Session`. A 401 on any of them clears the session.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::{ApiError, ApiResult, ErrorKind};
