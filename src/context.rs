//! Process-wide registry of loaded packages and policy.
//!
//! Loading happens on a mutable [`ContextBuilder`]; [`ContextBuilder::build`]
//! freezes it into a [`Context`] that workers share read-only. Scheduling is
//! only available on a built `Context`, so every package is known before
//! the first task can look up an extra package.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::executor::Scheduler;
use crate::harvest::pipeline::Task;
use crate::harvest::registry::PluginRegistry;
use crate::harvest::traits::{PackageError, PackageFormat};
use crate::package::{LogLevel, Package};
use crate::policy::Policy;

/// Result of offering a package to the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    Blacklisted,
}

pub struct ContextBuilder {
    format: Arc<dyn PackageFormat>,
    plugins: PluginRegistry,
    policy: Policy,
    packages: Vec<Arc<Package>>,
    temp_dir: PathBuf,
    log_dir: PathBuf,
}

impl ContextBuilder {
    /// Creates a builder using `./tmp` for sandboxes and `./logs` for logs.
    pub fn new(format: Arc<dyn PackageFormat>, plugins: PluginRegistry, policy: Policy) -> Self {
        Self {
            format,
            plugins,
            policy,
            packages: Vec::new(),
            temp_dir: PathBuf::from("./tmp"),
            log_dir: PathBuf::from("./logs"),
        }
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    /// Opens the archive at `path` and adds it unless blacklisted.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError`] if the adapter cannot open the archive.
    pub fn add_package(&mut self, path: &Path) -> Result<AddOutcome, PackageError> {
        let package = self.format.open(path)?;
        Ok(self.insert(package))
    }

    /// Adds an already opened package unless its name is blacklisted.
    ///
    /// Duplicate names are kept; see [`Context::find_by_name`].
    pub fn insert(&mut self, package: Package) -> AddOutcome {
        if self.policy.is_blacklisted_package(package.name()) {
            // The package is dropped unflushed; only the tracing copy remains.
            package.log(
                LogLevel::Info,
                format!("{} is blacklisted", package.filename().display()),
            );
            return AddOutcome::Blacklisted;
        }
        self.packages.push(Arc::new(package));
        AddOutcome::Added
    }

    /// Adds every archive the format handles directly inside `dir`.
    ///
    /// Entries are visited in file name order. Returns the number of
    /// packages added.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be read or any handled archive cannot
    /// be opened.
    pub fn add_directory(&mut self, dir: &Path) -> Result<usize, PackageError> {
        let scan_err = |source| PackageError::Scan {
            path: dir.to_path_buf(),
            source,
        };
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(scan_err)? {
            let path = entry.map_err(scan_err)?.path();
            if !path.is_file() {
                continue;
            }
            if !self.format.can_handle(&path) {
                debug!(path = %path.display(), "Skipping unsupported file");
                continue;
            }
            paths.push(path);
        }
        paths.sort();

        let mut added = 0;
        for path in paths {
            if self.add_package(&path)? == AddOutcome::Added {
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn build(self) -> Context {
        info!(
            packages = self.packages.len(),
            plugins = self.plugins.len(),
            format = self.format.name(),
            "Context ready"
        );
        Context {
            format: self.format,
            plugins: self.plugins,
            policy: self.policy,
            packages: self.packages,
            temp_dir: self.temp_dir,
            log_dir: self.log_dir,
        }
    }
}

/// Immutable run context shared by all workers.
pub struct Context {
    format: Arc<dyn PackageFormat>,
    plugins: PluginRegistry,
    policy: Policy,
    packages: Vec<Arc<Package>>,
    temp_dir: PathBuf,
    log_dir: PathBuf,
}

impl Context {
    pub fn format(&self) -> &dyn PackageFormat {
        self.format.as_ref()
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn packages(&self) -> &[Arc<Package>] {
        &self.packages
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// First loaded package called `name`.
    pub fn find_by_name(&self, name: &str) -> Option<&Arc<Package>> {
        self.packages.iter().find(|p| p.name() == name)
    }

    /// One task per loaded package.
    ///
    /// Sandbox directories are named after the package; a name already handed
    /// out gets the lowest free `-<n>` suffix in load order so no two tasks
    /// share a sandbox.
    pub fn tasks(&self) -> Vec<Task> {
        let mut taken: HashSet<String> = HashSet::new();
        self.packages
            .iter()
            .map(|package| {
                let base = sandbox_component(package.name());
                let mut dir_name = base.clone();
                let mut n = 1;
                while taken.contains(&dir_name) {
                    dir_name = format!("{base}-{n}");
                    n += 1;
                }
                taken.insert(dir_name.clone());
                Task::new(
                    package.basename(),
                    self.temp_dir.join(dir_name),
                    Arc::clone(package),
                )
            })
            .collect()
    }

    /// Scheduler holding one task per loaded package.
    pub fn scheduler(&self) -> Scheduler {
        let mut scheduler = Scheduler::new();
        for task in self.tasks() {
            scheduler.submit(task);
        }
        scheduler
    }
}

/// Turns a package name into exactly one normal path component, so a sandbox
/// can never resolve to the temp root or outside it.
fn sandbox_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' || c == '\0' { '_' } else { c })
        .collect();
    let mut components = Path::new(&cleaned).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if single_normal {
        cleaned
    } else {
        format!("_{cleaned}")
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("format", &self.format.name())
            .field("plugins", &self.plugins)
            .field("packages", &self.packages.len())
            .field("temp_dir", &self.temp_dir)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}
