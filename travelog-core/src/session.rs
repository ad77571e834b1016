//! The application session: current identity, its entries and residence,
//! and every mutation of them.
//!
//! UI modules receive a `&TravelLog` or `&mut TravelLog`; nothing else
//! writes the persisted state.

use std::collections::HashSet;
use std::rc::Rc;

use serde_json::Value;

use crate::config::TravelLogConfig;
use crate::entry::{AppSettings, Entry, EntryDraft, Identity, Residence, SortSettings};
use crate::error::{ErrorContext, ErrorHandler, Severity, ValidationError};
use crate::export::{ExportFile, ImportError, Snapshot, export_file_name, parse_snapshot};
use crate::ids::IdGenerator;
use crate::persistence::{PersistError, Persistence, StorageKeys};
use crate::platform::{Clock, Platform};
use crate::stats::{self, CityHistory, CountrySummary, Overview};
use crate::storage::KeyValueStore;

pub struct TravelLog<S> {
    persistence: Persistence<S>,
    errors: ErrorHandler,
    clock: Rc<dyn Clock>,
    config: TravelLogConfig,
    identity: Identity,
    keys: StorageKeys,
    entries: Vec<Entry>,
    residence: Residence,
    sort: SortSettings,
    ids: IdGenerator,
}

impl<S: KeyValueStore> TravelLog<S> {
    /// Restore the saved identity and load its namespace.
    pub fn open(store: S, platform: Platform, config: TravelLogConfig) -> Self {
        let errors = ErrorHandler::new(platform.clone(), &config);
        Self::with_error_handler(store, platform.clock, errors, config)
    }

    /// Like [`TravelLog::open`], sharing an existing error log.
    pub fn with_error_handler(
        store: S,
        clock: Rc<dyn Clock>,
        errors: ErrorHandler,
        config: TravelLogConfig,
    ) -> Self {
        let persistence = Persistence::new(store, errors.clone(), Rc::clone(&clock), &config);
        let identity = persistence.load_identity();
        let keys = StorageKeys::for_identity(&identity);
        let mut log = Self {
            persistence,
            errors,
            clock,
            config,
            identity,
            keys,
            entries: Vec::new(),
            residence: Residence::default(),
            sort: SortSettings::default(),
            ids: IdGenerator::new(),
        };
        log.reload_namespace();
        log
    }

    fn reload_namespace(&mut self) {
        self.load_entries();
        self.load_residence();
        self.sort = self.persistence.load_sort_settings(&self.keys);
    }

    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    pub const fn storage_keys(&self) -> &StorageKeys {
        &self.keys
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub const fn residence(&self) -> &Residence {
        &self.residence
    }

    pub const fn sort_settings(&self) -> SortSettings {
        self.sort
    }

    pub const fn errors(&self) -> &ErrorHandler {
        &self.errors
    }

    pub const fn persistence(&self) -> &Persistence<S> {
        &self.persistence
    }

    pub const fn config(&self) -> &TravelLogConfig {
        &self.config
    }

    pub fn entry(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Replace the in-memory list with the stored one (migrated).
    pub fn load_entries(&mut self) -> &[Entry] {
        self.entries = self.persistence.load_entries(&self.keys);
        &self.entries
    }

    /// Persist the in-memory list. Failures are reported and returned; the
    /// in-memory list is kept either way.
    ///
    /// # Errors
    ///
    /// Returns the serialisation or storage failure.
    pub fn save_entries(&self) -> Result<(), PersistError> {
        self.persistence.save_entries(&self.keys, &self.entries)
    }

    pub fn load_residence(&mut self) -> &Residence {
        self.residence = self.persistence.load_residence(&self.keys);
        &self.residence
    }

    /// # Errors
    ///
    /// Returns the serialisation or storage failure (already reported).
    pub fn save_residence(&self) -> Result<(), PersistError> {
        self.persistence.save_residence(&self.keys, &self.residence)
    }

    pub fn set_residence(&mut self, residence: Residence) {
        self.residence = residence;
        let _ = self.save_residence();
    }

    pub fn clear_residence(&mut self) {
        self.set_residence(Residence::default());
    }

    /// Validate `draft`, store it under a fresh id, and save.
    ///
    /// # Errors
    ///
    /// Returns the validation failure; nothing is stored.
    pub fn add_entry(&mut self, draft: EntryDraft) -> Result<&Entry, ValidationError> {
        let id = {
            let taken: HashSet<&str> = self.entries.iter().map(|e| e.id.as_str()).collect();
            self.ids.next_id(self.clock.now_millis(), &taken)
        };
        let entry = draft
            .into_entry(id, self.config.memo_max_len)
            .map_err(|err| self.rejected(err, "addEntry"))?;
        self.entries.push(entry);
        let _ = self.save_entries();
        let index = self.entries.len() - 1;
        Ok(&self.entries[index])
    }

    /// Replace the entry `id` in place, keeping its id and any collaborator
    /// fields.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown ids or invalid drafts.
    pub fn update_entry(&mut self, id: &str, draft: EntryDraft) -> Result<&Entry, ValidationError> {
        let Some(index) = self.entries.iter().position(|e| e.id == id) else {
            return Err(self.rejected(ValidationError::UnknownEntry(id.to_string()), "updateEntry"));
        };
        let mut updated = draft
            .into_entry(id.to_string(), self.config.memo_max_len)
            .map_err(|err| self.rejected(err, "updateEntry"))?;
        updated.extra = std::mem::take(&mut self.entries[index].extra);
        self.entries[index] = updated;
        let _ = self.save_entries();
        Ok(&self.entries[index])
    }

    /// # Errors
    ///
    /// Returns an error if no entry has this id.
    pub fn delete_entry(&mut self, id: &str) -> Result<Entry, ValidationError> {
        let Some(index) = self.entries.iter().position(|e| e.id == id) else {
            return Err(self.rejected(ValidationError::UnknownEntry(id.to_string()), "deleteEntry"));
        };
        let removed = self.entries.remove(index);
        let _ = self.save_entries();
        Ok(removed)
    }

    fn rejected(&self, err: ValidationError, operation: &str) -> ValidationError {
        self.errors.handle_error(
            &err,
            ErrorContext::new().with("operation", operation),
            Severity::Low,
        );
        err
    }

    /// Switch to a per-user namespace. Data is not carried across.
    ///
    /// # Errors
    /// Returns [`ValidationError::MissingField`] for a blank id; the
    /// current namespace is left as it was.
    pub fn login(&mut self, id: &str, username: &str) -> Result<(), ValidationError> {
        if id.trim().is_empty() {
            return Err(ValidationError::MissingField("user id"));
        }
        self.switch_identity(Identity::logged_in(id, username));
        Ok(())
    }

    pub fn logout(&mut self) {
        self.switch_identity(Identity::anonymous());
    }

    fn switch_identity(&mut self, identity: Identity) {
        log::info!(
            "switching identity to {}",
            if identity.is_logged_in {
                identity.username.as_str()
            } else {
                "anonymous"
            }
        );
        let _ = self.persistence.save_identity(&identity);
        self.keys = StorageKeys::for_identity(&identity);
        self.identity = identity;
        self.reload_namespace();
    }

    pub fn set_sort_settings(&mut self, sort: SortSettings) {
        self.sort = sort;
        let _ = self.persistence.save_sort_settings(&self.keys, &sort);
    }

    pub fn app_settings(&self) -> AppSettings {
        self.persistence.load_app_settings()
    }

    pub fn set_app_settings(&self, settings: AppSettings) {
        let _ = self.persistence.save_app_settings(&settings);
    }

    /// Point-in-time backup of the current namespace.
    pub fn export_snapshot(&self) -> ExportFile {
        let now = self.clock.now();
        let snapshot = Snapshot {
            user: self.identity.clone(),
            entries: self.entries.clone(),
            residence: self.residence.clone(),
            export_date: now.to_rfc3339(),
        };
        let contents = serde_json::to_string_pretty(&snapshot)
            .unwrap_or_else(|_| self.persistence.json().stringify(&snapshot, None));
        ExportFile {
            file_name: export_file_name(now.date_naive()),
            contents,
        }
    }

    /// Replace this namespace's entries and residence with a snapshot's.
    /// On error nothing changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a snapshot document.
    pub fn import_snapshot(&mut self, text: &str) -> Result<usize, ImportError> {
        let document: Value = self.persistence.json().try_parse(text).map_err(|err| {
            self.errors.handle_error(
                &err,
                ErrorContext::new().with("operation", "importSnapshot"),
                Severity::Medium,
            );
            ImportError::from(err)
        })?;
        let imported = parse_snapshot(document, self.clock.now_millis())?;
        self.entries = imported.migration.entries;
        self.residence = imported.residence;
        let _ = self.save_entries();
        let _ = self.save_residence();
        Ok(self.entries.len())
    }

    pub fn city_history(&self, id: &str) -> Option<CityHistory> {
        self.entry(id)
            .map(|entry| stats::city_history(entry, &self.entries, Some(&self.residence)))
    }

    pub fn total_overseas_days(&self) -> i64 {
        stats::total_overseas_days(&self.entries, Some(&self.residence))
    }

    pub fn country_summaries(&self) -> Vec<CountrySummary> {
        stats::country_summaries(&self.entries)
    }

    pub fn overview(&self) -> Overview {
        stats::overview(&self.entries, Some(&self.residence))
    }

    pub fn timeline(&self) -> Vec<&Entry> {
        stats::sorted_for_timeline(&self.entries, self.sort.timeline_sort_type)
    }

    pub fn ranked_by_rating(&self) -> Vec<&Entry> {
        stats::sorted_by_rating(&self.entries, self.sort.rating_sort_type)
    }
}

impl<S> std::fmt::Debug for TravelLog<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TravelLog")
            .field("identity", &self.identity)
            .field("entries", &self.entries.len())
            .field("residence", &self.residence)
            .finish_non_exhaustive()
    }
}
