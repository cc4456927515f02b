use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};

use super::session::SessionData;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// The single well-known place a credential is persisted to.
pub trait TokenSlot: Send + Sync {
    fn read(&self) -> Result<Option<SessionData>>;
    fn write(&self, data: &SessionData) -> Result<()>;
    fn remove(&self) -> Result<()>;
    /// Short label for logs.
    fn name(&self) -> &'static str;
}

/// JSON file in the application cache directory.
pub struct FileSlot {
    cache_dir: PathBuf,
}

impl FileSlot {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}

impl TokenSlot for FileSlot {
    fn read(&self) -> Result<Option<SessionData>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        let data: SessionData =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(data))
    }

    fn write(&self, data: &SessionData) -> Result<()> {
        let path = self.session_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(data)?;

        // Owner-only: the file holds a bearer token
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
            options.mode(0o600);
            if path.exists() {
                std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                    .context("Failed to restrict session file")?;
            }
        }
        let mut file = options.open(&path).context("Failed to write session file")?;
        file.write_all(contents.as_bytes())
            .context("Failed to write session file")?;
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove session file")?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Process-local slot. Nothing outlives the process.
#[derive(Default)]
pub struct MemorySlot {
    data: Mutex<Option<SessionData>>,
}

impl TokenSlot for MemorySlot {
    fn read(&self) -> Result<Option<SessionData>> {
        Ok(self.data.lock().unwrap_or_else(|p| p.into_inner()).clone())
    }

    fn write(&self, data: &SessionData) -> Result<()> {
        *self.data.lock().unwrap_or_else(|p| p.into_inner()) = Some(data.clone());
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        *self.data.lock().unwrap_or_else(|p| p.into_inner()) = None;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
