//! Identity-namespaced load/save of entries, residence and preferences.

use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::config::TravelLogConfig;
use crate::constants::{
    APP_SETTINGS_KEY, CURRENT_USER_KEY, ENTRIES_KEY, RESIDENCE_KEY, SORT_SETTINGS_KEY,
};
use crate::entry::{AppSettings, Entry, Identity, Residence, SortSettings};
use crate::error::{ErrorContext, ErrorHandler, Severity, ValidationError};
use crate::json::{JsonError, SafeJson};
use crate::migration::migrate_entries;
use crate::platform::Clock;
use crate::storage::{KeyValueStore, SafeStorage, StorageError};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error(transparent)]
    Json(#[from] JsonError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Storage keys for one identity namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub entries: String,
    pub residence: String,
    pub sort_settings: String,
}

impl StorageKeys {
    #[must_use]
    pub fn for_identity(identity: &Identity) -> Self {
        if identity.is_logged_in && !identity.id.is_empty() {
            let id = &identity.id;
            Self {
                entries: format!("user_{id}_{ENTRIES_KEY}"),
                residence: format!("user_{id}_residence"),
                sort_settings: format!("user_{id}_{SORT_SETTINGS_KEY}"),
            }
        } else {
            Self {
                entries: ENTRIES_KEY.to_string(),
                residence: RESIDENCE_KEY.to_string(),
                sort_settings: SORT_SETTINGS_KEY.to_string(),
            }
        }
    }
}

/// Writer of record for everything the application persists.
#[derive(Clone)]
pub struct Persistence<S> {
    storage: SafeStorage<S>,
    json: SafeJson,
    errors: ErrorHandler,
    clock: Rc<dyn Clock>,
}

impl<S: KeyValueStore> Persistence<S> {
    pub fn new(
        store: S,
        errors: ErrorHandler,
        clock: Rc<dyn Clock>,
        config: &TravelLogConfig,
    ) -> Self {
        Self {
            storage: SafeStorage::new(store, errors.clone()),
            json: SafeJson::new(errors.clone(), config.json_preview_len),
            errors,
            clock,
        }
    }

    pub const fn storage(&self) -> &SafeStorage<S> {
        &self.storage
    }

    pub const fn json(&self) -> &SafeJson {
        &self.json
    }

    /// Load and migrate the entry list. Unreadable or non-list payloads
    /// yield an empty list; a list the migration pass changed is written
    /// back immediately.
    pub fn load_entries(&self, keys: &StorageKeys) -> Vec<Entry> {
        let Some(text) = self.storage.get_item(&keys.entries) else {
            return Vec::new();
        };
        let raw = match self.json.parse(&text, Value::Array(Vec::new())) {
            Value::Array(items) => items,
            _ => {
                let err = ValidationError::NotAnArray {
                    key: keys.entries.clone(),
                };
                self.errors.handle_error(
                    &err,
                    ErrorContext::new().with("operation", "loadEntries"),
                    Severity::Medium,
                );
                return Vec::new();
            }
        };

        let report = migrate_entries(raw, self.clock.now_millis());
        if report.needs_save() {
            log::info!(
                "migrated {} entries ({} dropped) under {}",
                report.changed,
                report.dropped,
                keys.entries
            );
            // Failure is already reported; the migrated list stays in memory.
            let _ = self.save_entries(keys, &report.entries);
        }
        report.entries
    }

    /// Serialise and store the list. Failures are reported at high severity
    /// and returned; the caller's in-memory list stays authoritative.
    ///
    /// # Errors
    ///
    /// Returns the serialisation or storage failure.
    pub fn save_entries(&self, keys: &StorageKeys, entries: &[Entry]) -> Result<(), PersistError> {
        self.write(&keys.entries, entries, "saveEntries")
    }

    /// Stored residence, or the unset default when missing or malformed.
    pub fn load_residence(&self, keys: &StorageKeys) -> Residence {
        let Some(text) = self.storage.get_item(&keys.residence) else {
            return Residence::default();
        };
        match self.json.parse(&text, Value::Null) {
            Value::Null => Residence::default(),
            value @ Value::Object(_) => serde_json::from_value(value).unwrap_or_else(|_| {
                self.malformed_residence(keys);
                Residence::default()
            }),
            _ => {
                self.malformed_residence(keys);
                Residence::default()
            }
        }
    }

    fn malformed_residence(&self, keys: &StorageKeys) {
        let err = ValidationError::MalformedResidence {
            key: keys.residence.clone(),
        };
        self.errors.handle_error(
            &err,
            ErrorContext::new().with("operation", "loadResidence"),
            Severity::Medium,
        );
    }

    /// # Errors
    ///
    /// Returns the serialisation or storage failure (already reported).
    pub fn save_residence(
        &self,
        keys: &StorageKeys,
        residence: &Residence,
    ) -> Result<(), PersistError> {
        self.write(&keys.residence, residence, "saveResidence")
    }

    pub fn load_sort_settings(&self, keys: &StorageKeys) -> SortSettings {
        self.read_or_default(&keys.sort_settings)
    }

    /// # Errors
    ///
    /// Returns the serialisation or storage failure (already reported).
    pub fn save_sort_settings(
        &self,
        keys: &StorageKeys,
        settings: &SortSettings,
    ) -> Result<(), PersistError> {
        self.write(&keys.sort_settings, settings, "saveSortSettings")
    }

    pub fn load_app_settings(&self) -> AppSettings {
        self.read_or_default(APP_SETTINGS_KEY)
    }

    /// # Errors
    ///
    /// Returns the serialisation or storage failure (already reported).
    pub fn save_app_settings(&self, settings: &AppSettings) -> Result<(), PersistError> {
        self.write(APP_SETTINGS_KEY, settings, "saveAppSettings")
    }

    /// Identity saved by the login stub, or anonymous.
    pub fn load_identity(&self) -> Identity {
        let identity: Identity = self.read_or_default(CURRENT_USER_KEY);
        if identity.is_logged_in && !identity.id.is_empty() {
            identity
        } else {
            Identity::anonymous()
        }
    }

    /// Persist `identity`; anonymous identities clear the key.
    ///
    /// # Errors
    ///
    /// Returns the serialisation or storage failure (already reported).
    pub fn save_identity(&self, identity: &Identity) -> Result<(), PersistError> {
        if identity.is_logged_in {
            self.write(CURRENT_USER_KEY, identity, "saveIdentity")
        } else {
            self.storage.remove_item(CURRENT_USER_KEY);
            Ok(())
        }
    }

    fn read_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        self.storage
            .get_item(key)
            .map(|text| self.json.parse(&text, T::default()))
            .unwrap_or_default()
    }

    fn write<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        operation: &str,
    ) -> Result<(), PersistError> {
        let result = self
            .json
            .try_stringify(value)
            .map_err(PersistError::from)
            .and_then(|text| {
                self.storage
                    .try_set_item(key, &text)
                    .map_err(PersistError::from)
            });
        if let Err(err) = &result {
            let ctx = ErrorContext::new()
                .with("operation", operation)
                .with("key", key);
            match err {
                PersistError::Json(inner) => self.errors.handle_error(inner, ctx, Severity::High),
                PersistError::Storage(inner) => {
                    self.errors.handle_error(inner, ctx, Severity::High)
                }
            };
        }
        result
    }
}

impl<S> std::fmt::Debug for Persistence<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence").finish_non_exhaustive()
    }
}
