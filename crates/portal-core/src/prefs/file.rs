//! JSON-file backed preference store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::PreferenceStore;
use crate::error::{Error, Result};

/// Preferences persisted as a flat JSON object on disk.
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_map(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let raw = std::fs::read_to_string(&self.path).map_err(|error| {
            Error::Storage(format!(
                "failed to read preferences at {}: {error}",
                self.path.display()
            ))
        })?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|error| {
            Error::Storage(format!(
                "failed to parse preferences at {}: {error}",
                self.path.display()
            ))
        })
    }

    fn save_map(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let serialized = serde_json::to_string_pretty(values)?;
        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, serialized)?;
        std::fs::rename(&staging, &self.path)?;
        Ok(())
    }

    fn try_set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.load_map()?;
        values.insert(key.to_string(), value.to_string());
        self.save_map(&values)
    }

    fn try_remove(&self, key: &str) -> Result<()> {
        let mut values = self.load_map()?;
        if values.remove(key).is_some() {
            self.save_map(&values)?;
        }
        Ok(())
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.load_map() {
            Ok(mut values) => values.remove(key),
            Err(error) => {
                tracing::warn!("Error reading preference '{}': {}", key, error);
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> bool {
        match self.try_set(key, value) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!("Error writing preference '{}': {}", key, error);
                false
            }
        }
    }

    fn remove(&self, key: &str) -> bool {
        match self.try_remove(key) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!("Error removing preference '{}': {}", key, error);
                false
            }
        }
    }
}
