//! Local preference storage with fail-soft semantics.
//!
//! Losing a preference is always recoverable (the user is prompted again),
//! so every failure here is logged and reported as "no saved value" rather
//! than propagated.

mod file;
mod memory;

pub use file::FilePreferenceStore;
pub use memory::MemoryPreferenceStore;

/// Key holding the active portal code
pub const PORTAL_ID_KEY: &str = "portalId";
/// Key holding the countdown target (RFC 3339)
pub const MEETING_DATE_KEY: &str = "meetingDate";

/// String-keyed persistent storage that never fails loudly.
pub trait PreferenceStore {
    /// Read a value; `None` when missing or when storage is unavailable.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value; returns whether it was persisted.
    fn set(&self, key: &str, value: &str) -> bool;

    /// Remove a value; returns whether storage acknowledged the removal.
    fn remove(&self, key: &str) -> bool;
}

impl<T: PreferenceStore + ?Sized> PreferenceStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> bool {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> bool {
        (**self).remove(key)
    }
}
