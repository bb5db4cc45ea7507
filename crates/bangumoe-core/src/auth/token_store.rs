//! Persistent slot holding at most one bearer token.
//!
//! Three backends: the OS keychain (default), a JSON file in the data
//! directory, and process memory. None of them validate the token; the
//! server is the only authority on whether it still works.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{Config, TokenStorage, APP_NAME};

/// Keychain account name the token is stored under
const KEYRING_ACCOUNT: &str = "token";

/// Token file name in the data directory
const TOKEN_FILE: &str = "token.json";

pub trait TokenStore: Send + Sync {
    fn get(&self) -> Option<String>;

    fn set(&self, token: &str) -> Result<()>;

    /// Removing an absent token is not an error.
    fn clear(&self) -> Result<()>;

    fn has_token(&self) -> bool {
        self.get().is_some()
    }
}

/// Build the store selected in the config.
pub fn open_token_store(config: &Config) -> Result<Box<dyn TokenStore>> {
    let store: Box<dyn TokenStore> = match config.token_storage {
        TokenStorage::Keyring => Box::new(KeyringTokenStore::new()?),
        TokenStorage::File => Box::new(FileTokenStore::new(config.data_dir()?)),
        TokenStorage::Memory => Box::new(MemoryTokenStore::default()),
    };
    debug!(storage = ?config.token_storage, "Token store opened");
    Ok(store)
}

pub struct KeyringTokenStore {
    entry: Entry,
}

impl KeyringTokenStore {
    pub fn new() -> Result<Self> {
        let entry =
            Entry::new(APP_NAME, KEYRING_ACCOUNT).context("Failed to create keyring entry")?;
        Ok(Self { entry })
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self) -> Option<String> {
        match self.entry.get_password() {
            Ok(token) if !token.is_empty() => Some(token),
            Ok(_) | Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read token from keychain");
                None
            }
        }
    }

    fn set(&self, token: &str) -> Result<()> {
        self.entry
            .set_password(token)
            .context("Failed to store token in keychain")
    }

    fn clear(&self) -> Result<()> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenFile {
    token: String,
    saved_at: DateTime<Utc>,
}

pub struct FileTokenStore {
    data_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn token_path(&self) -> PathBuf {
        self.data_dir.join(TOKEN_FILE)
    }

    fn load(&self) -> Result<Option<TokenFile>> {
        let path = self.token_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read token file")?;
        let file = serde_json::from_str(&contents).context("Failed to parse token file")?;
        Ok(Some(file))
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<String> {
        match self.load() {
            Ok(file) => file.map(|f| f.token).filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable token file");
                None
            }
        }
    }

    fn set(&self, token: &str) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        let file = TokenFile {
            token: token.to_string(),
            saved_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&file)?;
        std::fs::write(self.token_path(), contents).context("Failed to write token file")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let path = self.token_path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove token file")?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<String> {
        self.token.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set(&self, token: &str) -> Result<()> {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}
