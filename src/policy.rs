//! Compiled blacklists and extra-package rules.

use glob::Pattern;

use crate::config::{ConfigError, PolicyConfig};

/// Ordered list of glob patterns, each carrying a value.
///
/// Searching returns the value of the first pattern matching the key.
#[derive(Debug, Clone, Default)]
pub struct GlobList {
    entries: Vec<(Pattern, String)>,
}

impl GlobList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Pattern`] if `pattern` is not a valid glob.
    pub fn push(&mut self, pattern: &str, value: impl Into<String>) -> Result<(), ConfigError> {
        let compiled = Pattern::new(pattern).map_err(|source| ConfigError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        self.entries.push((compiled, value.into()));
        Ok(())
    }

    /// Builds a list whose values are the patterns themselves.
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let mut list = Self::new();
        for pattern in patterns {
            list.push(pattern.as_ref(), pattern.as_ref())?;
        }
        Ok(list)
    }

    pub fn search(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(pattern, _)| pattern.matches(key))
            .map(|(_, value)| value.as_str())
    }

    pub fn matches(&self, key: &str) -> bool {
        self.search(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read-only policy shared by every worker.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    blacklisted_packages: GlobList,
    blacklisted_ids: GlobList,
    extra_packages: GlobList,
}

impl Policy {
    /// Compiles every pattern in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Pattern`] for the first invalid glob.
    pub fn from_config(config: &PolicyConfig) -> Result<Self, ConfigError> {
        let mut extra_packages = GlobList::new();
        for rule in &config.extra_packages {
            extra_packages.push(&rule.package, rule.requires.as_str())?;
        }
        Ok(Self {
            blacklisted_packages: GlobList::from_patterns(&config.blacklisted_packages)?,
            blacklisted_ids: GlobList::from_patterns(&config.blacklisted_ids)?,
            extra_packages,
        })
    }

    pub fn is_blacklisted_package(&self, name: &str) -> bool {
        self.blacklisted_packages.matches(name)
    }

    pub fn is_blacklisted_id(&self, id: &str) -> bool {
        self.blacklisted_ids.matches(id)
    }

    /// Name of the package whose contents `name` needs merged into its
    /// sandbox, if any.
    pub fn extra_package_for(&self, name: &str) -> Option<&str> {
        self.extra_packages.search(name)
    }
}
