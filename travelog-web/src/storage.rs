//! `localStorage` backend for the core's [`KeyValueStore`].

use travelog_core::{KeyValueStore, StorageError};
use wasm_bindgen::JsValue;
use web_sys::Storage;

use crate::dom;

/// Origin-scoped browser storage. Construction never fails; a missing or
/// blocked `localStorage` surfaces as `Unavailable` on each call so the
/// safe wrappers can report and fall back.
#[derive(Debug, Clone)]
pub struct BrowserStorage {
    inner: Result<Storage, String>,
}

impl BrowserStorage {
    #[must_use]
    pub fn local() -> Self {
        Self {
            inner: dom::local_storage().map_err(|err| dom::js_error_message(&err)),
        }
    }

    fn storage(&self) -> Result<&Storage, StorageError> {
        self.inner
            .as_ref()
            .map_err(|reason| StorageError::Unavailable(reason.clone()))
    }
}

/// Map a thrown storage exception onto the core taxonomy.
#[must_use]
pub fn storage_error(name: Option<&str>, message: String) -> StorageError {
    match name {
        // Firefox used its own name before standardising.
        Some("QuotaExceededError" | "NS_ERROR_DOM_QUOTA_REACHED") => StorageError::QuotaExceeded,
        Some("SecurityError") => StorageError::Unavailable(message),
        _ => StorageError::Backend(message),
    }
}

fn from_js(err: &JsValue) -> StorageError {
    storage_error(dom::js_error_name(err).as_deref(), dom::js_error_message(err))
}

impl KeyValueStore for BrowserStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage()?.get_item(key).map_err(|e| from_js(&e))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage()?.set_item(key, value).map_err(|e| from_js(&e))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.storage()?.remove_item(key).map_err(|e| from_js(&e))
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let storage = self.storage()?;
        let len = storage.length().map_err(|e| from_js(&e))?;
        let mut keys = Vec::with_capacity(len as usize);
        for index in 0..len {
            if let Some(key) = storage.key(index).map_err(|e| from_js(&e))? {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}
