//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the API base URL, request timeout, where the session token is kept and
//! the last used username.
//!
//! Configuration is stored at `~/.config/parcelwatch/config.json`. A few
//! values can be overridden from the environment (see `apply_env`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::{FileSlot, KeyringSlot, MemorySlot, Session, TokenSlot};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "parcelwatch";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default API address, matching the service's development server
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_URL: &str = "PARCELWATCH_API_URL";
pub const ENV_TOKEN_STORAGE: &str = "PARCELWATCH_TOKEN_STORAGE";
pub const ENV_USERNAME: &str = "PARCELWATCH_USERNAME";
pub const ENV_PASSWORD: &str = "PARCELWATCH_PASSWORD";

/// Where the session credential is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenStorage {
    #[default]
    File,
    Keyring,
    Memory,
}

impl TokenStorage {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Some(TokenStorage::File),
            "keyring" | "keychain" => Some(TokenStorage::Keyring),
            "memory" | "none" => Some(TokenStorage::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub token_storage: TokenStorage,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            token_storage: TokenStorage::default(),
            last_username: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(serde_json::from_str(&contents).context("Failed to parse config file")?)
        } else {
            Ok(Self::default())
        }
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Record the last used username and persist it.
    ///
    /// Only `last_username` is written back. Environment overrides applied to
    /// `self` stay out of the file.
    pub fn remember_username(&mut self, username: &str) -> Result<()> {
        self.remember_username_in(&Self::config_path()?, username)
    }

    fn remember_username_in(&mut self, path: &Path, username: &str) -> Result<()> {
        self.last_username = Some(username.to_string());
        let mut on_disk = Self::load_from(path)?;
        on_disk.last_username = Some(username.to_string());
        on_disk.save_to(path)
    }

    /// Apply environment overrides on top of the file config.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_TOKEN_STORAGE) {
            match TokenStorage::parse(&raw) {
                Some(storage) => self.token_storage = storage,
                None => warn!(value = %raw, "Unknown token storage, keeping configured value"),
            }
        }
    }

    /// Base URL without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Build the token slot selected by `token_storage`.
    pub fn token_slot(&self) -> Result<Box<dyn TokenSlot>> {
        Ok(match self.token_storage {
            TokenStorage::File => Box::new(FileSlot::new(self.cache_dir()?)),
            TokenStorage::Keyring => Box::new(KeyringSlot::new()),
            TokenStorage::Memory => Box::new(MemorySlot::default()),
        })
    }

    /// Create the session store and load any persisted credential.
    ///
    /// A slot that cannot be read is treated as logged out.
    pub fn open_session(&self) -> Result<Arc<Session>> {
        let session = Session::new(self.token_slot()?);
        if let Err(e) = session.load() {
            warn!(error = %e, "Failed to load stored session, starting logged out");
        }
        Ok(Arc::new(session))
    }
}
