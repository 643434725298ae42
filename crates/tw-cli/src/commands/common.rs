//! Shared helpers for migration commands

use tw_migrate::{RunResult, VersionRecord};

/// Render an optional version for logs and output
pub(crate) fn format_version(version: Option<u64>) -> String {
    match version {
        Some(version) => version.to_string(),
        None => "none".to_string(),
    }
}

/// Log the outcome of a completed run
pub(crate) fn report_run(operation: &str, result: &RunResult) {
    let version = format_version(result.final_version);
    if result.no_change {
        tracing::info!(operation, version = %version, "Database is already up-to-date");
    } else {
        tracing::info!(
            operation,
            applied = ?result.applied,
            count = result.applied.len(),
            version = %version,
            "Migrations applied"
        );
    }
}

/// `3`, `3 (dirty)` or `none`
pub(crate) fn format_record(record: &VersionRecord) -> String {
    let mut out = format_version(record.version);
    if record.dirty {
        out.push_str(" (dirty)");
    }
    out
}
