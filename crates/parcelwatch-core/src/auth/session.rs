use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::slot::TokenSlot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub token: String,
    #[serde(default)]
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    pub fn new(token: impl Into<String>, username: Option<&str>) -> Self {
        Self {
            token: token.into(),
            username: username.map(str::to_string),
            created_at: Utc::now(),
        }
    }
}

/// Holder of the single active bearer credential.
///
/// Shared as `Arc<Session>` between the API client and the UI. The lock is
/// never held across an await point.
pub struct Session {
    slot: Box<dyn TokenSlot>,
    data: RwLock<Option<SessionData>>,
}

impl Session {
    pub fn new(slot: Box<dyn TokenSlot>) -> Self {
        Self {
            slot,
            data: RwLock::new(None),
        }
    }

    /// Load a persisted credential from the slot. Returns true if one was found.
    pub fn load(&self) -> Result<bool> {
        let stored = self.slot.read()?;
        let found = stored.is_some();
        debug!(slot = self.slot.name(), found, "Session loaded");
        *self.write_guard() = stored;
        Ok(found)
    }

    /// Replace the active credential and persist it.
    ///
    /// The in-memory credential is updated even if persisting fails, so the
    /// current process stays logged in.
    pub fn set_credential(&self, token: &str, username: Option<&str>) -> Result<()> {
        let data = SessionData::new(token, username);
        // Held across the slot write so a concurrent clear cannot interleave.
        let mut guard = self.write_guard();
        *guard = Some(data.clone());
        self.slot.write(&data)?;
        drop(guard);
        info!(slot = self.slot.name(), "Credential stored");
        Ok(())
    }

    /// Current bearer token, if any.
    pub fn credential(&self) -> Option<String> {
        self.read_guard().as_ref().map(|d| d.token.clone())
    }

    /// Username the credential was issued for, if known.
    pub fn username(&self) -> Option<String> {
        self.read_guard().as_ref().and_then(|d| d.username.clone())
    }

    /// Drop the credential from memory and from the slot.
    pub fn clear_credential(&self) -> Result<()> {
        let mut guard = self.write_guard();
        *guard = None;
        self.slot.remove()?;
        drop(guard);
        info!(slot = self.slot.name(), "Credential cleared");
        Ok(())
    }

    /// Clear the credential only if it is still `token`.
    ///
    /// Returns false and leaves the session alone when a newer credential has
    /// replaced it in the meantime.
    pub fn clear_if_current(&self, token: &str) -> Result<bool> {
        let mut guard = self.write_guard();
        if guard.as_ref().map(|d| d.token.as_str()) != Some(token) {
            debug!("Ignoring stale credential rejection");
            return Ok(false);
        }
        *guard = None;
        self.slot.remove()?;
        drop(guard);
        info!(slot = self.slot.name(), "Credential cleared");
        Ok(true)
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_guard().is_some()
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, Option<SessionData>> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Option<SessionData>> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
