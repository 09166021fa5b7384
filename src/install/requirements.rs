//! Precondition checker
//!
//! Evaluates the fixed set of environment requirements. The checking variant
//! also creates missing directories as it goes; [`RequirementChecker::inspect`]
//! evaluates the same set without touching the filesystem.

use crate::db::{ConnectionFactory, InstallConnection};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tracing::{debug, warn};

/// Directories the application writes to, relative to the install base.
pub const REQUIRED_DIRECTORIES: [&str; 4] = ["data", "uploads", "temp", "logs"];

const PROBE_FILE: &str = ".install-write-probe";

/// A single named requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    pub key: String,
    pub name: String,
    pub satisfied: bool,
}

/// Outcome of a requirements check, in display order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementReport {
    pub items: Vec<Requirement>,
    pub all_satisfied: bool,
}

impl RequirementReport {
    /// Every item is evaluated and kept; the verdict is computed afterwards.
    pub fn from_items(items: Vec<Requirement>) -> Self {
        let all_satisfied = items.iter().all(|item| item.satisfied);
        Self { items, all_satisfied }
    }

    pub fn unmet(&self) -> impl Iterator<Item = &Requirement> {
        self.items.iter().filter(|item| !item.satisfied)
    }
}

#[derive(Debug, Clone)]
pub struct RequirementChecker {
    base_dir: PathBuf,
    min_server_version: i32,
}

impl RequirementChecker {
    pub fn new(base_dir: impl Into<PathBuf>, min_server_version: i32) -> Self {
        Self {
            base_dir: base_dir.into(),
            min_server_version,
        }
    }

    /// Check every requirement, creating missing directories on the way.
    pub async fn check<F: ConnectionFactory>(&self, factory: &F) -> RequirementReport {
        self.evaluate(factory, true).await
    }

    /// Check every requirement without creating anything.
    pub async fn inspect<F: ConnectionFactory>(&self, factory: &F) -> RequirementReport {
        self.evaluate(factory, false).await
    }

    async fn evaluate<F: ConnectionFactory>(&self, factory: &F, fix: bool) -> RequirementReport {
        let (driver_available, server_version) = match factory.acquire().await {
            Ok(mut conn) => match conn.server_version().await {
                Ok(version) => (true, Some(version)),
                Err(e) => {
                    warn!("Could not read database server version: {}", e);
                    (true, None)
                }
            },
            Err(e) => {
                warn!("Database not available during requirements check: {}", e);
                (false, None)
            }
        };

        let mut items = vec![
            Requirement {
                key: "server_version".to_string(),
                name: format!("PostgreSQL {} or newer", format_version(self.min_server_version)),
                satisfied: server_version.is_some_and(|v| v >= self.min_server_version),
            },
            Requirement {
                key: "database_driver".to_string(),
                name: "PostgreSQL connection available".to_string(),
                satisfied: driver_available,
            },
        ];

        for dir in REQUIRED_DIRECTORIES {
            let path = self.base_dir.join(dir);
            let satisfied = if fix {
                ensure_writable_dir(&path).await
            } else {
                is_writable_dir(&path).await
            };
            items.push(Requirement {
                key: format!("directory_{}", dir),
                name: format!("Directory {}/ writable", dir),
                satisfied,
            });
        }

        let report = RequirementReport::from_items(items);
        debug!(
            "Requirements evaluated (fix: {}): {} of {} satisfied",
            fix,
            report.items.iter().filter(|i| i.satisfied).count(),
            report.items.len()
        );
        report
    }
}

/// `120000` -> `"12"`, `90600` -> `"9.6"`
fn format_version(num: i32) -> String {
    let major = num / 10000;
    if major >= 10 {
        major.to_string()
    } else {
        format!("{}.{}", major, (num / 100) % 100)
    }
}

/// Writable already, or created (parents included) and writable afterwards.
async fn ensure_writable_dir(path: &Path) -> bool {
    if is_writable_dir(path).await {
        return true;
    }
    if let Err(e) = fs::create_dir_all(path).await {
        warn!("Could not create directory {}: {}", path.display(), e);
        return false;
    }
    is_writable_dir(path).await
}

async fn is_writable_dir(path: &Path) -> bool {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => {}
        _ => return false,
    }
    let probe = path.join(PROBE_FILE);
    match OpenOptions::new().write(true).create(true).truncate(true).open(&probe).await {
        Ok(file) => {
            drop(file);
            let _ = fs::remove_file(&probe).await;
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::testing::MemoryFactory;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_check_creates_missing_directories() {
        let temp = tempfile::tempdir().unwrap();
        let base = temp.path().join("app");
        let checker = RequirementChecker::new(&base, 120000);

        let report = checker.check(&MemoryFactory::new()).await;

        assert!(report.all_satisfied);
        for dir in REQUIRED_DIRECTORIES {
            assert!(base.join(dir).is_dir(), "{} was not created", dir);
            assert!(!base.join(dir).join(PROBE_FILE).exists());
        }
    }

    #[tokio::test]
    async fn test_inspect_has_no_side_effects() {
        let temp = tempfile::tempdir().unwrap();
        let checker = RequirementChecker::new(temp.path(), 120000);

        let report = checker.inspect(&MemoryFactory::new()).await;

        assert!(!report.all_satisfied);
        assert_eq!(report.unmet().count(), REQUIRED_DIRECTORIES.len());
        for dir in REQUIRED_DIRECTORIES {
            assert!(!temp.path().join(dir).exists());
        }
    }

    #[tokio::test]
    async fn test_report_keeps_every_failing_item() {
        let temp = tempfile::tempdir().unwrap();
        let checker = RequirementChecker::new(temp.path(), 120000);

        let report = checker.check(&MemoryFactory::unreachable()).await;

        let unmet: Vec<_> = report.unmet().map(|r| r.key.as_str()).collect();
        assert_eq!(unmet, vec!["server_version", "database_driver"]);
        assert!(!report.all_satisfied);
        assert_eq!(report.items.len(), 6);
    }

    #[tokio::test]
    async fn test_old_server_version_fails_only_version_item() {
        let temp = tempfile::tempdir().unwrap();
        let factory = MemoryFactory::new();
        factory.state().server_version = 90624;
        let checker = RequirementChecker::new(temp.path(), 120000);

        let report = checker.check(&factory).await;

        let unmet: Vec<_> = report.unmet().map(|r| r.key.as_str()).collect();
        assert_eq!(unmet, vec!["server_version"]);
        assert_eq!(report.items[0].name, "PostgreSQL 12 or newer");
    }

    #[tokio::test]
    async fn test_directory_blocked_by_file_is_unsatisfied() {
        let temp = tempfile::tempdir().unwrap();
        let blocked = temp.path().join("uploads");
        std::fs::write(&blocked, b"not a directory").unwrap();

        assert!(!ensure_writable_dir(&blocked).await);
        assert!(!is_writable_dir(&blocked).await);
    }

    #[tokio::test]
    async fn test_existing_directory_is_writable_and_left_clean() {
        let temp = tempfile::tempdir().unwrap();

        assert!(is_writable_dir(temp.path()).await);
        assert!(!temp.path().join(PROBE_FILE).exists());
    }

    #[test]
    fn test_all_satisfied_requires_every_item() {
        let item = |satisfied| Requirement {
            key: "k".to_string(),
            name: "n".to_string(),
            satisfied,
        };
        assert!(RequirementReport::from_items(vec![item(true), item(true)]).all_satisfied);
        assert!(!RequirementReport::from_items(vec![item(false), item(true)]).all_satisfied);
        assert!(!RequirementReport::from_items(vec![item(true), item(false)]).all_satisfied);
    }

    #[test]
    fn test_format_version() {
        assert_eq!(format_version(120000), "12");
        assert_eq!(format_version(150004), "15");
        assert_eq!(format_version(90624), "9.6");
    }
}
