//! Whole-state backup documents.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::entry::{Entry, Identity, Residence};
use crate::json::JsonError;
use crate::migration::{MigrationReport, migrate_entries};

/// `{user, entries, residence, exportDate}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub user: Identity,
    pub entries: Vec<Entry>,
    pub residence: Residence,
    pub export_date: String,
}

/// A rendered snapshot ready to hand to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub contents: String,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Json(#[from] JsonError),
    #[error("snapshot has no entries list")]
    MissingEntries,
    #[error("snapshot residence is malformed")]
    MalformedResidence,
}

#[must_use]
pub fn export_file_name(day: NaiveDate) -> String {
    format!("travel_data_{}.json", day.format("%Y-%m-%d"))
}

/// Entries and residence recovered from a snapshot document.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedSnapshot {
    pub migration: MigrationReport,
    pub residence: Residence,
}

/// Parse a snapshot and run its entries through the migration pass, so
/// backups written by older versions load in the current shape.
///
/// # Errors
///
/// Returns an error if the document is not an object, has no entry list, or
/// carries a residence of the wrong shape.
pub fn parse_snapshot(
    document: Value,
    now_millis: i64,
) -> Result<ImportedSnapshot, ImportError> {
    let Value::Object(mut fields) = document else {
        return Err(ImportError::MissingEntries);
    };
    let Some(Value::Array(raw_entries)) = fields.remove("entries") else {
        return Err(ImportError::MissingEntries);
    };
    let residence = match fields.remove("residence") {
        None | Some(Value::Null) => Residence::default(),
        Some(value) => {
            serde_json::from_value(value).map_err(|_| ImportError::MalformedResidence)?
        }
    };
    Ok(ImportedSnapshot {
        migration: migrate_entries(raw_entries, now_millis),
        residence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_name_uses_iso_day() {
        let day = NaiveDate::from_ymd_opt(2024, 7, 3).unwrap();
        assert_eq!(export_file_name(day), "travel_data_2024-07-03.json");
    }

    #[test]
    fn snapshot_entries_are_migrated() {
        let doc = json!({
            "user": {"id": "", "username": "", "isLoggedIn": false},
            "entries": [{"id": "1", "city": "Lisbon", "companions": "동생"}],
            "residence": null,
            "exportDate": "2024-07-03T10:00:00Z"
        });
        let imported = parse_snapshot(doc, 5).unwrap();
        assert_eq!(imported.migration.entries.len(), 1);
        assert_eq!(imported.migration.changed, 1);
        assert!(!imported.residence.is_set());
    }

    #[test]
    fn documents_without_entries_are_rejected() {
        assert!(matches!(
            parse_snapshot(json!({"user": {}}), 0),
            Err(ImportError::MissingEntries)
        ));
        assert!(matches!(
            parse_snapshot(json!({"entries": [], "residence": "Seoul"}), 0),
            Err(ImportError::MalformedResidence)
        ));
    }
}
