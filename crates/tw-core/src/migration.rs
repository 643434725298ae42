//! Versioned migration steps

use std::fmt;

/// Direction a migration body is applied in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Forward change
    Up,
    /// Reverting change
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// A single versioned schema change.
///
/// Immutable once loaded. Versions are unique within a source and ordered
/// ascending; gaps between versions are allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStep {
    /// Version number, strictly increasing within a source
    pub version: u64,

    /// Human-readable name (the part after `<version>_` in the file name)
    pub identifier: String,

    /// SQL applied when migrating up
    pub up: String,

    /// SQL applied when migrating down, if the step is reversible
    pub down: Option<String>,
}

impl MigrationStep {
    /// Create a forward-only step
    pub fn new(version: u64, identifier: impl Into<String>, up: impl Into<String>) -> Self {
        Self {
            version,
            identifier: identifier.into(),
            up: up.into(),
            down: None,
        }
    }

    /// Attach a down body
    pub fn with_down(mut self, down: impl Into<String>) -> Self {
        self.down = Some(down.into());
        self
    }

    /// Body for the given direction, `None` for a missing down body
    pub fn body(&self, direction: Direction) -> Option<&str> {
        match direction {
            Direction::Up => Some(self.up.as_str()),
            Direction::Down => self.down.as_deref(),
        }
    }

    /// Whether the step can be reverted
    pub fn has_down(&self) -> bool {
        self.down.is_some()
    }

    /// `<version>_<identifier>` label used in logs
    pub fn label(&self) -> String {
        format!("{}_{}", self.version, self.identifier)
    }
}

/// True when a body holds nothing but whitespace and `--` comments.
///
/// Such bodies are recorded without a round-trip to the database.
pub fn is_blank_body(sql: &str) -> bool {
    sql.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_by_direction() {
        let step = MigrationStep::new(1, "create_users", "CREATE TABLE users (id INT)")
            .with_down("DROP TABLE users");
        assert_eq!(step.body(Direction::Up), Some("CREATE TABLE users (id INT)"));
        assert_eq!(step.body(Direction::Down), Some("DROP TABLE users"));
        assert!(step.has_down());
        assert_eq!(step.label(), "1_create_users");
    }

    #[test]
    fn test_forward_only_step_has_no_down() {
        let step = MigrationStep::new(7, "seed", "SELECT 1");
        assert!(!step.has_down());
        assert_eq!(step.body(Direction::Down), None);
    }

    #[test]
    fn test_blank_body_detection() {
        assert!(is_blank_body(""));
        assert!(is_blank_body("  \n\t\n"));
        assert!(is_blank_body("-- nothing to do here\n  -- really\n"));
        assert!(!is_blank_body("-- comment\nSELECT 1;"));
    }
}
