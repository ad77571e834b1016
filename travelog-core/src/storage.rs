//! Key/value persistence seam and the guarded `SafeStorage` wrapper.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use thiserror::Error;

use crate::constants::STORAGE_PROBE_KEY;
use crate::error::{ErrorContext, ErrorHandler, Severity};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage quota exceeded")]
    QuotaExceeded,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Origin-scoped string storage, modelled on the browser's `localStorage`.
/// Implementations use interior mutability; every call may fail.
pub trait KeyValueStore {
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// Returns an error if the value cannot be stored (quota, disabled storage).
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns an error if the backend rejects the removal.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns an error if the backend cannot be enumerated.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Rc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        (**self).keys()
    }
}

/// In-memory store with optional quota and failure injection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RefCell<BTreeMap<String, String>>,
    quota: Cell<Option<usize>>,
    disabled: Cell<bool>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes that would push usage (UTF-16 units of keys and values)
    /// past `bytes`.
    #[must_use]
    pub fn with_quota(bytes: usize) -> Self {
        let store = Self::default();
        store.quota.set(Some(bytes));
        store
    }

    #[must_use]
    pub fn from_items(items: BTreeMap<String, String>) -> Self {
        Self {
            items: RefCell::new(items),
            ..Self::default()
        }
    }

    /// Simulate storage that exists but throws on every call.
    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.set(disabled);
    }

    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.items.borrow().clone()
    }

    fn check_enabled(&self) -> Result<(), StorageError> {
        if self.disabled.get() {
            Err(StorageError::Unavailable("storage is disabled".into()))
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check_enabled()?;
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_enabled()?;
        if let Some(limit) = self.quota.get() {
            let items = self.items.borrow();
            let others: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| utf16_len(k) + utf16_len(v))
                .sum();
            if others + utf16_len(key) + utf16_len(value) > limit {
                return Err(StorageError::QuotaExceeded);
            }
        }
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_enabled()?;
        self.items.borrow_mut().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.check_enabled()?;
        Ok(self.items.borrow().keys().cloned().collect())
    }
}

/// Length as the browser counts it.
pub(crate) fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Guarded storage: failures are reported to the [`ErrorHandler`] and turned
/// into fallbacks. The `try_*` forms expose the raw result.
#[derive(Debug, Clone)]
pub struct SafeStorage<S> {
    store: S,
    errors: ErrorHandler,
}

impl<S: KeyValueStore> SafeStorage<S> {
    pub const fn new(store: S, errors: ErrorHandler) -> Self {
        Self { store, errors }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// # Errors
    ///
    /// Returns the backend error unchanged.
    pub fn try_get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.store.get(key)
    }

    /// # Errors
    ///
    /// Returns the backend error unchanged.
    pub fn try_set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.store.set(key, value)
    }

    /// Stored value, or `None` when missing or unreadable.
    pub fn get_item(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(err) => {
                self.report(&err, "getItem", key, Severity::Medium);
                None
            }
        }
    }

    pub fn get_item_or(&self, key: &str, default: &str) -> String {
        self.get_item(key).unwrap_or_else(|| default.to_string())
    }

    pub fn set_item(&self, key: &str, value: &str) -> bool {
        match self.store.set(key, value) {
            Ok(()) => true,
            Err(err) => {
                self.report(&err, "setItem", key, Severity::Medium);
                false
            }
        }
    }

    pub fn remove_item(&self, key: &str) -> bool {
        match self.store.remove(key) {
            Ok(()) => true,
            Err(err) => {
                self.report(&err, "removeItem", key, Severity::Low);
                false
            }
        }
    }

    /// Write-then-remove probe; storage can exist and still refuse writes.
    pub fn is_storage_available(&self) -> bool {
        let probe = self
            .store
            .set(STORAGE_PROBE_KEY, STORAGE_PROBE_KEY)
            .and_then(|()| self.store.remove(STORAGE_PROBE_KEY));
        match probe {
            Ok(()) => true,
            Err(err) => {
                self.report(&err, "availabilityProbe", STORAGE_PROBE_KEY, Severity::Low);
                false
            }
        }
    }

    /// Sum of key and value lengths over every stored key. Diagnostic only.
    pub fn get_storage_usage(&self) -> usize {
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(err) => {
                self.report(&err, "storageUsage", "*", Severity::Low);
                return 0;
            }
        };
        keys.iter()
            .map(|key| {
                let value_len = self
                    .store
                    .get(key)
                    .ok()
                    .flatten()
                    .map_or(0, |value| utf16_len(&value));
                utf16_len(key) + value_len
            })
            .sum()
    }

    fn report(&self, err: &StorageError, operation: &str, key: &str, severity: Severity) {
        let ctx = ErrorContext::new()
            .with("operation", operation)
            .with("key", key);
        self.errors.handle_error(err, ctx, severity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TravelLogConfig;
    use crate::error::ErrorKind;
    use crate::platform::Platform;

    fn safe(store: MemoryStore) -> (SafeStorage<MemoryStore>, ErrorHandler) {
        let errors = ErrorHandler::new(Platform::headless(), &TravelLogConfig::default());
        (SafeStorage::new(store, errors.clone()), errors)
    }

    #[test]
    fn reads_fall_back_to_default() {
        let (storage, errors) = safe(MemoryStore::new());
        assert_eq!(storage.get_item("missing"), None);
        assert_eq!(storage.get_item_or("missing", "[]"), "[]");
        assert!(errors.get_error_log().is_empty());
    }

    #[test]
    fn disabled_store_never_panics_and_reports() {
        let store = MemoryStore::new();
        store.set_disabled(true);
        let (storage, errors) = safe(store);
        assert!(!storage.set_item("travelEntries", "[]"));
        assert_eq!(storage.get_item_or("travelEntries", "fallback"), "fallback");
        assert!(!storage.remove_item("travelEntries"));
        assert!(!storage.is_storage_available());
        assert_eq!(storage.get_storage_usage(), 0);

        let log = errors.get_error_log();
        assert_eq!(log.len(), 5);
        assert!(log.iter().all(|r| r.kind == ErrorKind::Storage));
        assert_eq!(
            log[0].context.get("operation").and_then(|v| v.as_str()),
            Some("setItem")
        );
    }

    #[test]
    fn quota_rejects_oversized_writes() {
        let (storage, errors) = safe(MemoryStore::with_quota(16));
        assert!(storage.set_item("k", "short"));
        assert!(!storage.set_item("k", "a value far larger than sixteen units"));
        assert_eq!(storage.get_item("k").as_deref(), Some("short"));
        assert_eq!(
            errors.get_error_log()[0].message,
            StorageError::QuotaExceeded.to_string()
        );
    }

    #[test]
    fn usage_counts_keys_and_values() {
        let (storage, _) = safe(MemoryStore::new());
        storage.set_item("ab", "cde");
        storage.set_item("f", "여행");
        assert_eq!(storage.get_storage_usage(), 2 + 3 + 1 + 2);
        assert!(storage.is_storage_available());
        assert_eq!(storage.get_item(STORAGE_PROBE_KEY), None);
    }
}
