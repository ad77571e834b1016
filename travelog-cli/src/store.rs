//! A storage dump on disk: a JSON object mapping `localStorage` keys to
//! their string values, as produced by `JSON.stringify(localStorage)`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use travelog_core::{KeyValueStore, MemoryStore, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not a storage dump (object of strings)", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode storage dump")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reads go to an in-memory copy; nothing reaches the file until
/// [`FileStore::persist`].
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    items: MemoryStore,
}

impl FileStore {
    /// Load `path`. A missing file is an empty store.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or is not a
    /// string-to-string JSON object.
    pub fn open(path: &Path) -> Result<Self, DumpError> {
        let items = if path.exists() {
            let text = fs::read_to_string(path).map_err(|source| DumpError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let map: BTreeMap<String, String> =
                serde_json::from_str(&text).map_err(|source| DumpError::Format {
                    path: path.to_path_buf(),
                    source,
                })?;
            MemoryStore::from_items(map)
        } else {
            log::info!("{} does not exist; starting empty", path.display());
            MemoryStore::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            items,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current contents back to the dump file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn persist(&self) -> Result<(), DumpError> {
        let text = serde_json::to_string_pretty(&self.items.snapshot())?;
        fs::write(&self.path, text).map_err(|source| DumpError::Write {
            path: self.path.clone(),
            source,
        })?;
        log::debug!("wrote {}", self.path.display());
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.items.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.items.remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.items.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "travelog-store-{label}-{}.json",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ))
    }

    #[test]
    fn missing_file_is_empty_and_persist_creates_it() {
        let path = temp_path("new");
        let store = FileStore::open(&path).unwrap();
        assert!(store.keys().unwrap().is_empty());
        store.set("travelEntries", "[]").unwrap();
        assert!(!path.exists());
        store.persist().unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("travelEntries").unwrap().as_deref(), Some("[]"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn non_string_values_are_rejected() {
        let path = temp_path("bad");
        fs::write(&path, r#"{"travelEntries": []}"#).unwrap();
        let err = FileStore::open(&path).unwrap_err();
        assert!(matches!(err, DumpError::Format { .. }));
        assert!(err.to_string().contains("not a storage dump"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn unwritable_dump_reports_its_path() {
        let dir = temp_path("dir");
        fs::create_dir_all(&dir).unwrap();
        let store = FileStore::open(&dir.join("missing").join("dump.json")).unwrap();
        let err = store.persist().unwrap_err();
        assert!(matches!(err, DumpError::Write { .. }));
        assert!(err.to_string().contains("dump.json"));
        let _ = fs::remove_dir_all(dir);
    }
}
