//! Run configuration.
//!
//! [`HarvestConfig`] carries the directory layout and worker count;
//! [`PolicyConfig`] carries the blacklists and extra-package rules, usually
//! loaded from a JSON file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read policy file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse policy file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// Package `package` (a glob over package names) needs the contents of
/// package `requires` exploded next to its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraPackageRule {
    pub package: String,
    pub requires: String,
}

/// Policy sets, in declaration order.
///
/// ```json
/// {
///   "blacklisted_packages": ["*-debuginfo", "kernel*"],
///   "blacklisted_ids": ["mimeinfo.desktop"],
///   "extra_packages": [{ "package": "foo", "requires": "foo-data" }]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub blacklisted_packages: Vec<String>,
    pub blacklisted_ids: Vec<String>,
    pub extra_packages: Vec<ExtraPackageRule>,
}

impl PolicyConfig {
    /// Reads a policy from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is unreadable or not valid JSON.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Directory scanned (non-recursively) for package archives
    pub packages_dir: PathBuf,

    /// Root for per-package sandboxes; emptied at startup
    pub temp_dir: PathBuf,

    /// Per-package log files; emptied at startup
    pub log_dir: PathBuf,

    /// Icon output; emptied at startup
    pub icons_dir: PathBuf,

    /// Worker pool size; `1` gives fully reproducible runs
    pub workers: usize,

    /// Process this single archive instead of scanning `packages_dir`
    pub buildone: Option<PathBuf>,

    pub policy: PolicyConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            packages_dir: PathBuf::from("./packages"),
            temp_dir: PathBuf::from("./tmp"),
            log_dir: PathBuf::from("./logs"),
            icons_dir: PathBuf::from("./icons"),
            workers: 1,
            buildone: None,
            policy: PolicyConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_directory_layout() {
        let config = HarvestConfig::default();
        assert_eq!(config.packages_dir, PathBuf::from("./packages"));
        assert_eq!(config.temp_dir, PathBuf::from("./tmp"));
        assert_eq!(config.log_dir, PathBuf::from("./logs"));
        assert_eq!(config.icons_dir, PathBuf::from("./icons"));
        assert_eq!(config.workers, 1);
        assert!(config.buildone.is_none());
    }

    #[test]
    fn test_policy_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        std::fs::write(
            &path,
            r#"{
                "blacklisted_packages": ["*-debuginfo"],
                "extra_packages": [{ "package": "foo", "requires": "foo-data" }]
            }"#,
        )
        .unwrap();

        let policy = PolicyConfig::from_file(&path).unwrap();
        assert_eq!(policy.blacklisted_packages, ["*-debuginfo"]);
        assert!(policy.blacklisted_ids.is_empty());
        assert_eq!(
            policy.extra_packages,
            [ExtraPackageRule {
                package: "foo".to_string(),
                requires: "foo-data".to_string(),
            }]
        );
    }

    #[test]
    fn test_policy_from_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            PolicyConfig::from_file(&missing),
            Err(ConfigError::Read { .. })
        ));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(
            PolicyConfig::from_file(&broken),
            Err(ConfigError::Parse { .. })
        ));
    }
}
