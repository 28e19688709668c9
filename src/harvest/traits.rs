//! Core traits and error types for the harvest system.
//!
//! This module defines the seams of the package-to-descriptor pipeline:
//! - Format-specific package adapters via [`PackageFormat`]
//! - Capability-matched analyzers via [`Plugin`]
//! - Standardized error handling for every stage

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::ConfigError;
use crate::harvest::sandbox::Sandbox;
use crate::model::AppDescriptor;
use crate::package::Package;

// ============================================================================
// Package Format Trait
// ============================================================================

/// Abstraction over a package archive format.
///
/// An adapter decodes package headers into a [`Package`], lists the files a
/// package contains and explodes its contents into a directory. The harvest
/// core never parses an archive itself.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: workers call `file_list` and
/// `explode` concurrently for different packages.
pub trait PackageFormat: Send + Sync {
    /// Returns the unique identifier for this format.
    ///
    /// Examples: `"tarball"`, `"rpm"`
    fn name(&self) -> &str;

    /// Returns `true` if this adapter can open the file at `path`.
    ///
    /// Used when scanning a packages directory; files no adapter handles
    /// are skipped.
    fn can_handle(&self, path: &Path) -> bool;

    /// Opens a package archive and decodes its metadata.
    ///
    /// The returned [`Package`] has its identity, url, license,
    /// dependencies and releases populated. The file list may be left for
    /// [`PackageFormat::file_list`].
    ///
    /// # Errors
    ///
    /// Returns [`PackageError`] if the archive is unreadable or its
    /// metadata is malformed.
    fn open(&self, path: &Path) -> Result<Package, PackageError>;

    /// Reads the ordered list of absolute paths contained in `package`.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::FileList`] if the archive cannot be listed.
    fn file_list(&self, package: &Package) -> Result<Vec<String>, PackageError>;

    /// Extracts the contents of `package` beneath `dest`.
    ///
    /// Existing files under `dest` may be overwritten; no merge conflict
    /// detection is performed.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::Explode`] if extraction fails.
    fn explode(&self, package: &Package, dest: &Path) -> Result<(), PackageError>;
}

// ============================================================================
// Plugin Trait
// ============================================================================

/// Analyzer that turns an exploded package into application descriptors.
///
/// A plugin declares the files it understands through [`Plugin::matches`].
/// The first plugin matching any file of a package processes it; every
/// plugin's [`Plugin::refine`] then runs on every descriptor, whichever
/// plugin produced it.
pub trait Plugin: Send + Sync {
    /// Unique plugin name, used for registration and logging.
    fn name(&self) -> &str;

    /// Returns `true` if this plugin can analyze packages containing `path`.
    ///
    /// `path` is an absolute path as listed by the package, e.g.
    /// `/usr/share/applications/gimp.desktop`.
    fn matches(&self, path: &str) -> bool;

    /// Extracts descriptors from the package exploded into `sandbox`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError`] if analysis fails; the package's task is
    /// aborted with a warning.
    fn process(
        &self,
        package: &Package,
        sandbox: &Sandbox,
    ) -> Result<Vec<AppDescriptor>, PluginError>;

    /// Post-processes one descriptor.
    ///
    /// Default implementation does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError`] on failure, which aborts the whole task.
    fn refine(
        &self,
        _package: &Package,
        _app: &mut AppDescriptor,
        _sandbox: &Sandbox,
    ) -> Result<(), PluginError> {
        Ok(())
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by package format adapters.
#[derive(Error, Debug)]
pub enum PackageError {
    /// Archive could not be opened or read
    #[error("Failed to open package {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Package metadata is missing or malformed
    #[error("Invalid package metadata in {}: {message}", .path.display())]
    Metadata { path: PathBuf, message: String },

    /// No adapter handles this file
    #[error("Unsupported package format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// File list could not be read
    #[error("Failed to read file list of {filename}: {message}")]
    FileList { filename: String, message: String },

    /// Contents could not be extracted
    #[error("Failed to explode {filename}: {source}")]
    Explode {
        filename: String,
        #[source]
        source: std::io::Error,
    },

    /// Directory scan failed
    #[error("Failed to scan {}: {source}", .path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while managing sandbox directories.
#[derive(Error, Debug)]
pub enum SandboxError {
    /// Directory could not be created
    #[error("Failed to create {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Existing contents could not be deleted
    #[error("Failed to clear {}: {source}", .path.display())]
    Clear {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory tree could not be removed
    #[error("Failed to delete {}: {source}", .path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A path inside the package would escape the sandbox root
    #[error("Path traversal attempt rejected: '{attempted}'")]
    PathTraversal { attempted: String },
}

/// Errors raised by analyzer plugins and the plugin registry.
#[derive(Error, Debug)]
pub enum PluginError {
    /// A plugin with the same name is already registered
    #[error("plugin '{0}' is already registered")]
    AlreadyRegistered(String),

    /// Process function failed
    #[error("{plugin} failed to process package: {message}")]
    Process { plugin: String, message: String },

    /// Refine function failed
    #[error("{plugin} failed to refine {app}: {message}")]
    Refine {
        plugin: String,
        app: String,
        message: String,
    },

    /// Sandbox path resolution failed
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    /// Generic I/O error while reading exploded files
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a single package task is aborted.
///
/// The `Display` text is the warning written to the package log.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Failed to get file list: {0}")]
    FileList(#[source] PackageError),

    #[error("Failed to clear: {0}")]
    Clear(#[source] SandboxError),

    #[error("Failed to explode: {0}")]
    Explode(#[source] PackageError),

    #[error("{package} requires {required} but is not available")]
    MissingExtra { package: String, required: String },

    #[error("Failed to explode extra file: {0}")]
    ExplodeExtra(#[source] PackageError),

    #[error("Failed to run process: {0}")]
    Process(#[source] PluginError),

    #[error("Failed to run refine: {0}")]
    Refine(#[source] PluginError),

    #[error("Failed to serialize descriptor: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors raised by the scheduler's worker pool.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Worker pool requested with zero workers
    #[error("worker count must be at least 1")]
    NoWorkers,

    /// A worker loop terminated abnormally
    #[error("worker failed: {0}")]
    Worker(String),
}

/// Fatal errors that abort a whole run.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// Temp, log or icons directory could not be prepared
    #[error("failed to prepare {kind} dir: {source}")]
    Directory {
        kind: &'static str,
        #[source]
        source: SandboxError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to set up plugins: {0}")]
    Plugins(#[from] PluginError),

    #[error("failed to load packages: {0}")]
    Package(#[from] PackageError),

    #[error("failed to set up pool: {0}")]
    Scheduler(#[from] SchedulerError),
}

// ============================================================================
// Tests
// ============================================================================
