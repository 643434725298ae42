//! Migration sources: ordered providers of [`MigrationStep`]s.
//!
//! A source is loaded fully up front and then answers random-access queries
//! ("the step at version N", "the first step after N") from memory.

use crate::error::{CoreError, CoreResult};
use crate::migration::{Direction, MigrationStep};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Ordered provider of migration steps.
///
/// `list` must return steps sorted by ascending, unique version.
pub trait MigrationSource: Send + Sync {
    /// All steps in ascending version order
    fn list(&self) -> &[MigrationStep];

    /// Human-readable location used in logs
    fn describe(&self) -> String;

    /// Step with exactly this version
    fn get(&self, version: u64) -> CoreResult<&MigrationStep> {
        let steps = self.list();
        steps
            .binary_search_by_key(&version, |s| s.version)
            .map(|idx| &steps[idx])
            .map_err(|_| CoreError::MigrationNotFound { version })
    }

    /// Lowest version in the source
    fn first(&self) -> Option<&MigrationStep> {
        self.list().first()
    }

    /// First step strictly after `after`; `None` means "before everything"
    fn next(&self, after: Option<u64>) -> Option<&MigrationStep> {
        match after {
            None => self.first(),
            Some(version) => self.list().iter().find(|s| s.version > version),
        }
    }

    /// Last step strictly before `before`
    fn prev(&self, before: u64) -> Option<&MigrationStep> {
        self.list().iter().rev().find(|s| s.version < before)
    }

    /// Whether the source has no steps at all
    fn is_empty(&self) -> bool {
        self.list().is_empty()
    }
}

/// In-memory source, used for embedded migrations and tests
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    steps: Vec<MigrationStep>,
}

impl MemorySource {
    /// Build a source from steps in any order, rejecting duplicate versions
    pub fn new(mut steps: Vec<MigrationStep>) -> CoreResult<Self> {
        steps.sort_by_key(|s| s.version);
        if let Some(pair) = steps.windows(2).find(|w| w[0].version == w[1].version) {
            return Err(CoreError::DuplicateMigration {
                version: pair[0].version,
                first: pair[0].label(),
                second: pair[1].label(),
            });
        }
        Ok(Self { steps })
    }
}

impl MigrationSource for MemorySource {
    fn list(&self) -> &[MigrationStep] {
        &self.steps
    }

    fn describe(&self) -> String {
        format!("memory ({} migrations)", self.steps.len())
    }
}

/// Matches `<version>_<identifier>.<up|down>.<ext>`
fn migration_file_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([0-9]+)_(.*)\.(up|down)\.(.*)$").expect("valid regex literal")
    })
}

/// One half of a step as found on disk
struct MigrationFile {
    identifier: String,
    path: PathBuf,
    body: String,
}

#[derive(Default)]
struct PartialStep {
    up: Option<MigrationFile>,
    down: Option<MigrationFile>,
}

/// Directory-backed source of `<version>_<name>.up.sql` / `.down.sql` files
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
    steps: Vec<MigrationStep>,
}

impl FileSource {
    /// Load every migration file in `dir` (non-recursive)
    pub fn open(dir: &Path) -> CoreResult<Self> {
        if !dir.is_dir() {
            return Err(CoreError::SourceNotFound {
                path: dir.display().to_string(),
            });
        }

        let entries = std::fs::read_dir(dir).map_err(|e| CoreError::IoWithPath {
            path: dir.display().to_string(),
            source: e,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| CoreError::IoWithPath {
                    path: dir.display().to_string(),
                    source: e,
                })?
                .path();
            if !path.is_dir() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut partial: BTreeMap<u64, PartialStep> = BTreeMap::new();
        for path in paths {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(caps) = migration_file_pattern().captures(name) else {
                log::debug!("Ignoring non-migration file {}", path.display());
                continue;
            };

            let version: u64 = caps[1].parse().map_err(|_| CoreError::InvalidMigrationFile {
                path: path.display().to_string(),
                reason: format!("version '{}' does not fit in 64 bits", &caps[1]),
            })?;
            let direction = if &caps[3] == "up" {
                Direction::Up
            } else {
                Direction::Down
            };
            let identifier = caps[2].to_string();
            let body = std::fs::read_to_string(&path).map_err(|e| CoreError::IoWithPath {
                path: path.display().to_string(),
                source: e,
            })?;

            let entry = partial.entry(version).or_default();
            let slot = match direction {
                Direction::Up => &mut entry.up,
                Direction::Down => &mut entry.down,
            };
            if let Some(existing) = slot {
                return Err(CoreError::DuplicateMigration {
                    version,
                    first: existing.path.display().to_string(),
                    second: path.display().to_string(),
                });
            }
            *slot = Some(MigrationFile {
                identifier,
                path,
                body,
            });
        }

        let steps = partial
            .into_iter()
            .map(|(version, files)| build_step(version, files))
            .collect::<CoreResult<Vec<_>>>()?;

        log::debug!(
            "Loaded {} migrations from {}",
            steps.len(),
            dir.display()
        );

        Ok(Self {
            root: dir.to_path_buf(),
            steps,
        })
    }

    /// Open a source from a `file://` URI or a plain path
    pub fn from_uri(uri: &str) -> CoreResult<Self> {
        Self::open(&parse_source_uri(uri)?)
    }

}

impl MigrationSource for FileSource {
    fn list(&self) -> &[MigrationStep] {
        &self.steps
    }

    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }
}

fn build_step(version: u64, files: PartialStep) -> CoreResult<MigrationStep> {
    let Some(up) = files.up else {
        let path = files
            .down
            .map(|d| d.path.display().to_string())
            .unwrap_or_default();
        return Err(CoreError::InvalidMigrationFile {
            path,
            reason: format!("down migration for version {version} has no matching up migration"),
        });
    };

    let down = match files.down {
        Some(down) if down.identifier != up.identifier => {
            return Err(CoreError::InvalidMigrationFile {
                path: down.path.display().to_string(),
                reason: format!(
                    "name '{}' does not match up migration name '{}'",
                    down.identifier, up.identifier
                ),
            });
        }
        Some(down) => Some(down.body),
        None => None,
    };

    Ok(MigrationStep {
        version,
        identifier: up.identifier,
        up: up.body,
        down,
    })
}

/// Resolve a source URI to a directory.
///
/// `file://migrations` and `file:///abs/migrations` are accepted, as is a
/// bare path. Any other scheme is rejected.
pub fn parse_source_uri(uri: &str) -> CoreResult<PathBuf> {
    match uri.split_once("://") {
        Some(("file", rest)) if !rest.is_empty() => Ok(PathBuf::from(rest)),
        Some(("file", _)) => Err(CoreError::ConfigInvalid {
            message: format!("source URI '{uri}' has an empty path"),
        }),
        Some((scheme, _)) => Err(CoreError::UnsupportedSourceScheme {
            uri: uri.to_string(),
            scheme: scheme.to_string(),
        }),
        None if uri.trim().is_empty() => Err(CoreError::ConfigInvalid {
            message: "source must not be empty".to_string(),
        }),
        None => Ok(PathBuf::from(uri)),
    }
}

/// Open the source named by `uri` behind a trait object
pub fn open_source(uri: &str) -> CoreResult<Box<dyn MigrationSource>> {
    Ok(Box::new(FileSource::from_uri(uri)?))
}

#[cfg(test)]
#[path = "source_test.rs"]
mod tests;
