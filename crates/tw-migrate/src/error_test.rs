use super::*;

#[test]
fn test_dirty_error_names_version() {
    let err = MigrateError::DirtyDatabase {
        record: VersionRecord::dirty_at(Some(4)),
    };
    let message = err.to_string();
    assert!(message.starts_with("[M003]"));
    assert!(message.contains("version 4 (dirty)"));
    assert_eq!(err.kind(), "dirty_database");
}

#[test]
fn test_unknown_record_is_rendered() {
    let err = MigrateError::Cancelled { record: None };
    assert!(err.to_string().contains("record: unknown"));
    assert_eq!(err.record(), None);
}

#[test]
fn test_with_record_fills_missing_snapshot() {
    let err = MigrateError::LockTimeout {
        name: "tidewater".to_string(),
        waited: Duration::from_secs(1),
        record: None,
    }
    .with_record(VersionRecord::clean(2));
    assert_eq!(err.record(), Some(VersionRecord::clean(2)));
    assert!(err.to_string().contains("record: version 2"));
}

#[test]
fn test_with_record_keeps_existing_snapshot() {
    let err = MigrateError::Cancelled {
        record: Some(VersionRecord::dirty_at(Some(1))),
    }
    .with_record(VersionRecord::clean(5));
    assert_eq!(err.record(), Some(VersionRecord::dirty_at(Some(1))));
}

#[test]
fn test_step_failed_keeps_cause() {
    let err = MigrateError::StepFailed {
        version: 2,
        identifier: "add_orders".to_string(),
        record: VersionRecord::dirty_at(Some(1)),
        cause: DbError::execution("syntax error"),
    };
    let message = err.to_string();
    assert!(message.contains("2_add_orders"));
    assert!(message.contains("syntax error"));
    assert_eq!(err.kind(), "step_failed");
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_from_lock_maps_timeout() {
    let err = MigrateError::from_lock(DbError::LockTimeout {
        name: "tidewater".to_string(),
        waited: Duration::from_millis(50),
    });
    assert_eq!(err.kind(), "lock_timeout");

    let err = MigrateError::from_lock(DbError::MutexPoisoned("boom".to_string()));
    assert_eq!(err.kind(), "database");
}
