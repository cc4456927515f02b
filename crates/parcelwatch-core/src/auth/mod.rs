//! Authentication module for managing the bearer credential.
//!
//! This module provides:
//! - `Session`: the in-process session store shared with the API client
//! - `TokenSlot`: the single storage slot the credential persists to
//! - `FileSlot`, `KeyringSlot`, `MemorySlot`: slot implementations
//!
//! There is no expiry tracking: a credential stays until logout or until the
//! server rejects it with a 401.

pub mod credentials;
pub mod session;
pub mod slot;

pub use credentials::KeyringSlot;
pub use session::{Session, SessionData};
pub use slot::{FileSlot, MemorySlot, TokenSlot};
