//! Local key/value persistence.
//!
//! Each slot is one JSON file under the cache directory
//! (`~/.recipe-bridge/<key>.json` by default). Missing or corrupt slots read
//! back as absent; callers decide whether that is worth a warning.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Slot holding the bounded autosave list.
pub const AUTOSAVE_SLOT: &str = "autosave";

/// Slot holding the cached repository snapshot.
pub const SNAPSHOT_SLOT: &str = "repository_snapshot";

/// Directory-backed key/value store
pub struct LocalStorage {
    base_dir: PathBuf,
}

impl LocalStorage {
    /// Create a store rooted at `base_dir`, creating the directory if needed.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)
            .with_context(|| format!("Failed to create storage directory: {:?}", base_dir))?;
        Ok(Self { base_dir })
    }

    /// Default location: `~/.recipe-bridge`
    pub fn default_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir()
            .context("Could not determine home directory")?
            .join(".recipe-bridge"))
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", key))
    }

    /// Read a slot. Corrupt content is logged and treated as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.slot_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read storage slot: {:?}", path))?;

        match serde_json::from_str(&content) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Discarding corrupt storage slot '{}': {}", key, e);
                Ok(None)
            }
        }
    }

    /// Write a slot, replacing any previous value. The new content goes to a
    /// temp file first and is renamed over the slot, so an interrupted write
    /// never leaves a truncated slot behind.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let path = self.slot_path(key);
        let content = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize storage slot '{}'", key))?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write storage slot: {:?}", tmp_path))?;
        std::fs::rename(&tmp_path, &path)
            .with_context(|| format!("Failed to replace storage slot: {:?}", path))?;
        debug!("Storage slot '{}' written to {:?}", key, path);
        Ok(())
    }

    /// Remove a slot. Removing an absent slot is not an error.
    pub fn remove(&self, key: &str) -> Result<()> {
        let path = self.slot_path(key);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove storage slot: {:?}", path))?;
        }
        Ok(())
    }
}
