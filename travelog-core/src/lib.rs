//! Travelog Core
//!
//! Platform-agnostic persistence, migration, statistics and defensive
//! infrastructure for the Travelog travel journal. Browser and native hosts
//! plug in through the traits in [`platform`], [`storage`] and [`events`].

pub mod config;
pub mod constants;
pub mod dates;
pub mod entry;
pub mod error;
pub mod events;
pub mod export;
pub mod ids;
pub mod json;
pub mod migration;
pub mod persistence;
pub mod platform;
pub mod session;
pub mod stats;
pub mod storage;

// Re-export commonly used types
pub use config::{ConfigError, TravelLogConfig};
pub use dates::{calculate_days, parse_day};
pub use entry::{
    AppSettings, CompanionType, Coordinates, Entry, EntryDraft, Identity, RatingSort, Residence,
    SortSettings, TimelineSort,
};
pub use error::{
    ErrorContext, ErrorHandler, ErrorKind, ErrorRecord, Severity, ValidationError, classify,
};
pub use events::{
    CancelToken, EventManager, EventScope, EventSource, Handler, ListenOptions, ListenerKey,
    TargetId, TimerKey,
};
pub use export::{ExportFile, ImportError, Snapshot};
pub use json::{JsonError, SafeJson};
pub use migration::{MigrationReport, RecordShape, migrate_entries};
pub use persistence::{PersistError, Persistence, StorageKeys};
pub use platform::{
    Clock, Disposer, FixedClock, LogNotifier, ManualScheduler, Notifier, Platform, Scheduler,
    SystemClock,
};
pub use session::TravelLog;
pub use stats::{
    CityHistory, CountryStats, CountrySummary, Overview, VisitStats, city_history, country_stats,
    country_summaries, overview, total_overseas_days, visit_stats,
};
pub use storage::{KeyValueStore, MemoryStore, SafeStorage, StorageError};
