use travelog_core::{Severity, StorageError};
use travelog_web::notify::{TOAST_CLASS, severity_class};
use travelog_web::storage::storage_error;

#[test]
fn quota_exceptions_map_to_quota_exceeded() {
    assert_eq!(
        storage_error(Some("QuotaExceededError"), "full".into()),
        StorageError::QuotaExceeded
    );
    assert_eq!(
        storage_error(Some("NS_ERROR_DOM_QUOTA_REACHED"), "full".into()),
        StorageError::QuotaExceeded
    );
}

#[test]
fn other_exceptions_keep_their_message() {
    assert_eq!(
        storage_error(Some("SecurityError"), "blocked".into()),
        StorageError::Unavailable("blocked".into())
    );
    assert_eq!(
        storage_error(None, "boom".into()),
        StorageError::Backend("boom".into())
    );
}

#[test]
fn toast_classes_follow_severity() {
    assert_eq!(severity_class(Severity::High), format!("{TOAST_CLASS}--high"));
    assert_eq!(
        severity_class(Severity::Critical),
        "error-notification--critical"
    );
}
