use anyhow::{Context, Result};
use keyring::Entry;

use super::session::SessionData;
use super::slot::TokenSlot;

const SERVICE_NAME: &str = "parcelwatch";

/// Keychain account the session is stored under
const SESSION_ACCOUNT: &str = "session";

/// Stores the session in the OS keychain instead of a plain file.
pub struct KeyringSlot {
    account: String,
}

impl KeyringSlot {
    pub fn new() -> Self {
        Self {
            account: SESSION_ACCOUNT.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &self.account).context("Failed to create keyring entry")
    }
}

impl Default for KeyringSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenSlot for KeyringSlot {
    fn read(&self) -> Result<Option<SessionData>> {
        match self.entry()?.get_password() {
            Ok(secret) => {
                let data = serde_json::from_str(&secret)
                    .context("Failed to parse session stored in keychain")?;
                Ok(Some(data))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve session from keychain"),
        }
    }

    fn write(&self, data: &SessionData) -> Result<()> {
        let secret = serde_json::to_string(data)?;
        self.entry()?
            .set_password(&secret)
            .context("Failed to store session in keychain")?;
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete session from keychain"),
        }
    }

    fn name(&self) -> &'static str {
        "keyring"
    }
}
