//! Storage keys and fixed limits shared across the crate.

/// Entry list key for anonymous sessions.
pub const ENTRIES_KEY: &str = "travelEntries";
/// Residence key for anonymous sessions.
pub const RESIDENCE_KEY: &str = "userResidence";
/// Sort preference key for anonymous sessions.
pub const SORT_SETTINGS_KEY: &str = "sortSettings";
/// Global (non-namespaced) application settings key.
pub const APP_SETTINGS_KEY: &str = "appSettings";
/// Key holding the logged-in identity, if any.
pub const CURRENT_USER_KEY: &str = "currentUser";
/// Sentinel written and removed by the availability probe.
pub const STORAGE_PROBE_KEY: &str = "__storage_test__";

/// Schema tag written on every entry.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

pub const DEFAULT_ERROR_LOG_CAPACITY: usize = 100;
pub const DEFAULT_NOTIFICATION_TIMEOUT_MS: u32 = 5_000;
pub const DEFAULT_SWEEP_INTERVAL_MS: u32 = 30_000;
pub const DEFAULT_CONTEXT_VALUE_MAX_LEN: usize = 50;
pub const DEFAULT_JSON_PREVIEW_LEN: usize = 100;
pub const DEFAULT_MEMO_MAX_LEN: usize = 500;

/// Highest accepted rating.
pub const MAX_RATING: u8 = 5;

/// Placeholder stored in error contexts instead of nested values.
pub const CONTEXT_OBJECT_PLACEHOLDER: &str = "[Object]";
