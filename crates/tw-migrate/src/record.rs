//! Version record and run outcome

use std::fmt;

/// Persisted migration state: the last applied version and whether the last
/// attempted step was left unfinished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VersionRecord {
    /// `None` until the first step is applied
    pub version: Option<u64>,
    pub dirty: bool,
}

impl VersionRecord {
    /// Fresh database: no version, clean
    pub fn unset() -> Self {
        Self::default()
    }

    pub fn clean(version: u64) -> Self {
        Self {
            version: Some(version),
            dirty: false,
        }
    }

    pub fn dirty_at(version: Option<u64>) -> Self {
        Self {
            version,
            dirty: true,
        }
    }
}

impl fmt::Display for VersionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            Some(version) => write!(f, "version {version}")?,
            None => write!(f, "no version")?,
        }
        if self.dirty {
            write!(f, " (dirty)")?;
        }
        Ok(())
    }
}

/// Outcome of a run that completed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// Versions whose bodies ran, in execution order
    pub applied: Vec<u64>,
    pub final_version: Option<u64>,
    /// Nothing was pending; distinct from a run that applied steps
    pub no_change: bool,
}

impl RunResult {
    pub fn no_change(version: Option<u64>) -> Self {
        Self {
            applied: Vec::new(),
            final_version: version,
            no_change: true,
        }
    }

    pub fn applied(applied: Vec<u64>, final_version: Option<u64>) -> Self {
        Self {
            applied,
            final_version,
            no_change: false,
        }
    }
}
