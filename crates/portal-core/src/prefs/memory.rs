//! In-memory preference store (tests and ephemeral sessions).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::PreferenceStore;

/// Shared in-memory preferences. Clones see the same values.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferenceStore {
    values: Arc<Mutex<HashMap<String, String>>>,
    disabled: Arc<AtomicBool>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate unavailable storage (quota exceeded, storage disabled).
    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::SeqCst);
    }

    fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        if self.is_disabled() {
            tracing::warn!("Error reading preference '{}': storage disabled", key);
            return None;
        }
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> bool {
        if self.is_disabled() {
            tracing::warn!("Error writing preference '{}': storage disabled", key);
            return false;
        }
        self.values.lock().is_ok_and(|mut values| {
            values.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove(&self, key: &str) -> bool {
        if self.is_disabled() {
            tracing::warn!("Error removing preference '{}': storage disabled", key);
            return false;
        }
        self.values.lock().is_ok_and(|mut values| {
            values.remove(key);
            true
        })
    }
}
