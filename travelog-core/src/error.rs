//! Error taxonomy, the bounded error log, and severity-gated notification.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::error::Error as StdError;
use std::fmt;
use std::rc::Rc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::TravelLogConfig;
use crate::constants::CONTEXT_OBJECT_PLACEHOLDER;
use crate::json::JsonError;
use crate::platform::{Disposer, Platform};
use crate::storage::StorageError;

/// Coarse classification used to pick the user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Storage,
    Json,
    Dom,
    Network,
    Validation,
    Unknown,
}

impl ErrorKind {
    /// Fixed message shown to the user; raw error text is never displayed.
    #[must_use]
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::Storage => "데이터 저장 중 문제가 발생했습니다. 브라우저 저장 공간을 확인해 주세요.",
            Self::Json => "저장된 데이터를 읽는 중 문제가 발생했습니다.",
            Self::Dom => "화면을 표시하는 중 문제가 발생했습니다. 페이지를 새로고침해 주세요.",
            Self::Network => "네트워크 연결을 확인해 주세요.",
            Self::Validation => "입력한 내용을 다시 확인해 주세요.",
            Self::Unknown => "알 수 없는 오류가 발생했습니다.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage => write!(f, "storage"),
            Self::Json => write!(f, "json"),
            Self::Dom => write!(f, "dom"),
            Self::Network => write!(f, "network"),
            Self::Validation => write!(f, "validation"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Only high and critical errors reach the screen.
    #[must_use]
    pub const fn notifies_user(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Caller-supplied data rejected by the core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("end date {end} is before start date {start}")]
    DateOrder { start: String, end: String },
    #[error("{field} is not a calendar date: {value}")]
    InvalidDate { field: &'static str, value: String },
    #[error("rating {0} is outside 0..=5")]
    RatingRange(u8),
    #[error("memo is {len} characters, limit is {max}")]
    MemoTooLong { len: usize, max: usize },
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("stored {key} is not a list")]
    NotAnArray { key: String },
    #[error("stored residence under {key} is malformed")]
    MalformedResidence { key: String },
    #[error("no entry with id {0}")]
    UnknownEntry(String),
}

/// Diagnostic key/value pairs attached to an error report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorContext(Map<String, Value>);

impl ErrorContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bound the context before it enters the log: long strings are cut to
    /// `max_len` characters plus an ellipsis and nested values are replaced
    /// by a placeholder.
    #[must_use]
    pub fn sanitized(&self, max_len: usize) -> Self {
        let map = self
            .0
            .iter()
            .map(|(key, value)| {
                let clean = match value {
                    Value::String(text) if text.chars().count() > max_len => {
                        let head: String = text.chars().take(max_len).collect();
                        Value::String(format!("{head}..."))
                    }
                    Value::Object(_) | Value::Array(_) => {
                        Value::String(CONTEXT_OBJECT_PLACEHOLDER.to_string())
                    }
                    other => other.clone(),
                };
                (key.clone(), clean)
            })
            .collect();
        Self(map)
    }
}

/// One entry in the error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub timestamp: String,
    pub message: String,
    /// Source chain, outermost cause first
    pub stack: Option<String>,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub severity: Severity,
    pub context: ErrorContext,
    pub user_agent: Option<String>,
}

static STORAGE_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)quota|storage").expect("storage pattern"));
static JSON_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)json|syntax|parse|serializ").expect("json pattern"));
static DOM_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)element|\bdom\b|\bnode\b|document").expect("dom pattern"));
static NETWORK_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)network|fetch|http|timed? ?out").expect("network pattern"));

/// Best-effort classification: concrete crate errors first, then message
/// keywords.
#[must_use]
pub fn classify(error: &(dyn StdError + 'static)) -> ErrorKind {
    if error.is::<StorageError>() {
        return ErrorKind::Storage;
    }
    if error.is::<JsonError>() || error.is::<serde_json::Error>() {
        return ErrorKind::Json;
    }
    if error.is::<ValidationError>() {
        return ErrorKind::Validation;
    }
    classify_message(&error.to_string())
}

#[must_use]
pub fn classify_message(message: &str) -> ErrorKind {
    if STORAGE_HINT.is_match(message) {
        ErrorKind::Storage
    } else if JSON_HINT.is_match(message) {
        ErrorKind::Json
    } else if DOM_HINT.is_match(message) {
        ErrorKind::Dom
    } else if NETWORK_HINT.is_match(message) {
        ErrorKind::Network
    } else {
        ErrorKind::Unknown
    }
}

fn source_chain(error: &(dyn StdError + 'static)) -> Option<String> {
    let mut causes = Vec::new();
    let mut current = error.source();
    while let Some(cause) = current {
        causes.push(cause.to_string());
        current = cause.source();
    }
    if causes.is_empty() {
        None
    } else {
        Some(causes.join("\ncaused by: "))
    }
}

struct HandlerState {
    log: VecDeque<ErrorRecord>,
    dismiss_timer: Option<Disposer>,
}

/// Shared error sink. Cloning yields another handle to the same log.
#[derive(Clone)]
pub struct ErrorHandler {
    state: Rc<RefCell<HandlerState>>,
    notification_visible: Rc<Cell<bool>>,
    platform: Platform,
    capacity: usize,
    context_max_len: usize,
    notification_timeout_ms: u32,
}

impl ErrorHandler {
    #[must_use]
    pub fn new(platform: Platform, config: &TravelLogConfig) -> Self {
        Self {
            state: Rc::new(RefCell::new(HandlerState {
                log: VecDeque::with_capacity(config.error_log_capacity),
                dismiss_timer: None,
            })),
            notification_visible: Rc::new(Cell::new(false)),
            platform,
            capacity: config.error_log_capacity.max(1),
            context_max_len: config.context_value_max_len,
            notification_timeout_ms: config.notification_timeout_ms,
        }
    }

    /// Record an error, mirror it to the log facade, and notify the user if
    /// the severity calls for it.
    pub fn handle_error(
        &self,
        error: &(dyn StdError + 'static),
        context: ErrorContext,
        severity: Severity,
    ) -> ErrorRecord {
        let kind = classify(error);
        let record = ErrorRecord {
            timestamp: self.platform.clock.now().to_rfc3339(),
            message: error.to_string(),
            stack: source_chain(error),
            kind,
            severity,
            context: context.sanitized(self.context_max_len),
            user_agent: self.platform.user_agent.clone(),
        };

        match severity {
            Severity::Low => log::debug!("[{kind}] {}", record.message),
            Severity::Medium => log::warn!("[{kind}] {}", record.message),
            Severity::High | Severity::Critical => {
                log::error!("[{kind}/{severity}] {}", record.message);
            }
        }

        {
            let mut state = self.state.borrow_mut();
            state.log.push_back(record.clone());
            while state.log.len() > self.capacity {
                state.log.pop_front();
            }
        }

        if severity.notifies_user() {
            self.notify(kind, severity);
        }
        record
    }

    fn notify(&self, kind: ErrorKind, severity: Severity) {
        if self.notification_visible.get() {
            return;
        }
        self.notification_visible.set(true);
        self.platform.notifier.show(kind.user_message(), severity);

        let visible = Rc::clone(&self.notification_visible);
        let notifier = Rc::clone(&self.platform.notifier);
        let timer = self.platform.scheduler.schedule(
            self.notification_timeout_ms,
            Box::new(move || {
                visible.set(false);
                notifier.dismiss();
            }),
        );
        let previous = self.state.borrow_mut().dismiss_timer.replace(timer);
        drop(previous);
    }

    #[must_use]
    pub fn is_notification_visible(&self) -> bool {
        self.notification_visible.get()
    }

    /// Oldest first.
    #[must_use]
    pub fn get_error_log(&self) -> Vec<ErrorRecord> {
        self.state.borrow().log.iter().cloned().collect()
    }

    pub fn clear_error_log(&self) {
        self.state.borrow_mut().log.clear();
    }

    #[must_use]
    pub fn error_counts(&self) -> BTreeMap<ErrorKind, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.state.borrow().log {
            *counts.entry(record.kind).or_insert(0) += 1;
        }
        counts
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("records", &self.state.borrow().log.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{FixedClock, ManualScheduler, Notifier};

    #[derive(Default)]
    struct RecordingNotifier {
        shown: RefCell<Vec<String>>,
        dismissed: Cell<usize>,
    }

    impl Notifier for RecordingNotifier {
        fn show(&self, message: &str, _severity: Severity) {
            self.shown.borrow_mut().push(message.to_string());
        }

        fn dismiss(&self) {
            self.dismissed.set(self.dismissed.get() + 1);
        }
    }

    fn handler() -> (ErrorHandler, Rc<RecordingNotifier>, ManualScheduler) {
        let notifier = Rc::new(RecordingNotifier::default());
        let scheduler = ManualScheduler::new();
        let platform = Platform {
            clock: Rc::new(FixedClock::at_millis(1_700_000_000_000)),
            scheduler: Rc::new(scheduler.clone()),
            notifier: notifier.clone(),
            user_agent: Some("test-agent".into()),
        };
        (
            ErrorHandler::new(platform, &TravelLogConfig::default()),
            notifier,
            scheduler,
        )
    }

    #[test]
    fn log_keeps_most_recent_hundred() {
        let (errors, _, _) = handler();
        for i in 0..150 {
            let err = ValidationError::UnknownEntry(i.to_string());
            errors.handle_error(&err, ErrorContext::new(), Severity::Low);
        }
        let log = errors.get_error_log();
        assert_eq!(log.len(), 100);
        assert_eq!(log[0].message, "no entry with id 50");
        assert_eq!(log[99].message, "no entry with id 149");
    }

    #[test]
    fn context_is_truncated_and_flattened() {
        let (errors, _, _) = handler();
        let long = "x".repeat(80);
        let ctx = ErrorContext::new()
            .with("key", long)
            .with("payload", serde_json::json!({"nested": true}))
            .with("count", 3);
        let record = errors.handle_error(&StorageError::QuotaExceeded, ctx, Severity::Medium);
        let key = record.context.get("key").and_then(Value::as_str).unwrap();
        assert_eq!(key.chars().count(), 53);
        assert!(key.ends_with("..."));
        assert_eq!(
            record.context.get("payload"),
            Some(&Value::String("[Object]".into()))
        );
        assert_eq!(record.context.get("count"), Some(&Value::from(3)));
        assert_eq!(record.user_agent.as_deref(), Some("test-agent"));
    }

    #[test]
    fn only_high_severity_notifies_and_one_at_a_time() {
        let (errors, notifier, scheduler) = handler();
        errors.handle_error(&StorageError::QuotaExceeded, ErrorContext::new(), Severity::Medium);
        assert!(notifier.shown.borrow().is_empty());

        errors.handle_error(&StorageError::QuotaExceeded, ErrorContext::new(), Severity::High);
        errors.handle_error(
            &ValidationError::MissingField("city"),
            ErrorContext::new(),
            Severity::Critical,
        );
        assert_eq!(notifier.shown.borrow().len(), 1);
        assert_eq!(notifier.shown.borrow()[0], ErrorKind::Storage.user_message());
        assert_eq!(errors.get_error_log().len(), 3);

        scheduler.advance(5_000);
        assert!(!errors.is_notification_visible());
        assert_eq!(notifier.dismissed.get(), 1);

        errors.handle_error(&StorageError::QuotaExceeded, ErrorContext::new(), Severity::High);
        assert_eq!(notifier.shown.borrow().len(), 2);
    }

    #[test]
    fn classification_prefers_types_then_keywords() {
        let parse_err = serde_json::from_str::<Value>("{oops").unwrap_err();
        assert_eq!(classify(&parse_err), ErrorKind::Json);
        assert_eq!(classify(&StorageError::QuotaExceeded), ErrorKind::Storage);
        assert_eq!(
            classify(&ValidationError::RatingRange(9)),
            ErrorKind::Validation
        );
        assert_eq!(classify_message("Failed to fetch"), ErrorKind::Network);
        assert_eq!(classify_message("element #map not found"), ErrorKind::Dom);
        assert_eq!(classify_message("something odd"), ErrorKind::Unknown);
    }
}
