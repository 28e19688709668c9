//! Loaded package entity.
//!
//! A [`Package`] is created by a [`PackageFormat`] adapter when an archive is
//! opened. It is immutable once shared with the scheduler, except for its
//! append-only log buffer and its lazily computed file list.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};
use tracing::{debug, info, warn};

use crate::harvest::traits::{PackageError, PackageFormat};
use crate::model::Release;

/// Dependencies provided by the package manager itself.
const BUILD_SYSTEM_PREFIX: &str = "rpmlib";

/// Interpreter dependency every scriptlet-carrying package declares.
const SHELL_INTERPRETER: &str = "/bin/sh";

/// Header fields identifying one package build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub name: String,
    pub version: String,
    pub release: String,
    pub epoch: u32,
    pub arch: String,

    /// Name of the source package this binary package was built from
    pub source: String,
}

/// Severity of a package log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Raw output, e.g. a serialized descriptor
    None,
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    fn render(&self, out: &mut String) {
        let _ = match self.level {
            LogLevel::None => writeln!(out, "{}", self.message),
            LogLevel::Info => writeln!(out, "INFO:    {}", self.message),
            LogLevel::Warning => writeln!(out, "WARNING: {}", self.message),
        };
    }
}

/// Append-only log buffer, written to disk once.
#[derive(Debug, Default)]
pub struct PackageLog {
    entries: Mutex<Vec<LogEntry>>,
    flushed: AtomicBool,
}

impl PackageLog {
    pub fn append(&self, level: LogLevel, message: String) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LogEntry { level, message });
    }

    /// Snapshot of all entries appended so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed.load(Ordering::Acquire)
    }

    /// Writes the buffer to `path`.
    ///
    /// Returns `Ok(false)` without touching the filesystem if the log has
    /// already been flushed.
    pub fn flush(&self, path: &Path) -> std::io::Result<bool> {
        if self.flushed.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }
        let mut out = String::new();
        for entry in self.entries().iter() {
            entry.render(&mut out);
        }
        std::fs::write(path, out)?;
        Ok(true)
    }
}

/// One loaded software package.
#[derive(Debug)]
pub struct Package {
    filename: PathBuf,
    identity: PackageIdentity,
    url: Option<String>,
    license: Option<String>,
    dependencies: Vec<String>,
    releases: BTreeMap<String, Release>,
    files: OnceLock<Vec<String>>,
    log: PackageLog,
}

impl Package {
    pub fn new(filename: impl Into<PathBuf>, identity: PackageIdentity) -> Self {
        Self {
            filename: filename.into(),
            identity,
            url: None,
            license: None,
            dependencies: Vec::new(),
            releases: BTreeMap::new(),
            files: OnceLock::new(),
            log: PackageLog::default(),
        }
    }

    /// Path of the archive this package was opened from.
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// Final path component of the archive, e.g. `foo-1.0-1.x86_64.tar.gz`.
    pub fn basename(&self) -> String {
        self.filename
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.filename.display().to_string())
    }

    pub fn identity(&self) -> &PackageIdentity {
        &self.identity
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn version(&self) -> &str {
        &self.identity.version
    }

    pub fn release(&self) -> &str {
        &self.identity.release
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn set_url(&mut self, url: Option<String>) {
        self.url = url.filter(|u| !u.is_empty());
    }

    pub fn license(&self) -> Option<&str> {
        self.license.as_deref()
    }

    pub fn set_license(&mut self, license: Option<String>) {
        self.license = license.filter(|l| !l.is_empty());
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Replaces the dependency list with the normalized form of `raw`.
    ///
    /// See [`normalize_dependency`]; duplicates keep their first position.
    pub fn set_dependencies<I, S>(&mut self, raw: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.dependencies.clear();
        for dep in raw {
            if let Some(name) = normalize_dependency(dep.as_ref()) {
                if !self.dependencies.contains(&name) {
                    self.dependencies.push(name);
                }
            }
        }
    }

    pub fn releases(&self) -> impl Iterator<Item = &Release> {
        self.releases.values()
    }

    pub fn get_release(&self, version: &str) -> Option<&Release> {
        self.releases.get(version)
    }

    /// Records a release, keeping the earliest timestamp per version.
    ///
    /// Automated rebuilds that only bump the release suffix produce later
    /// changelog entries for the same version; they must not move the
    /// original release date.
    pub fn add_release(&mut self, version: &str, timestamp: u64, description: Option<String>) {
        match self.releases.get_mut(version) {
            Some(existing) => {
                if timestamp < existing.timestamp {
                    existing.timestamp = timestamp;
                }
            }
            None => {
                self.releases.insert(
                    version.to_string(),
                    Release {
                        version: version.to_string(),
                        timestamp,
                        description,
                    },
                );
            }
        }
    }

    /// Records a changelog entry whose header ends in `version-release`.
    ///
    /// Entries whose header carries no version are ignored.
    pub fn add_changelog_entry(&mut self, timestamp: u64, header: &str, text: &str) {
        let Some(version) = changelog_version(header) else {
            return;
        };
        let description = Some(text.to_string()).filter(|t| !t.is_empty());
        self.add_release(&version, timestamp, description);
    }

    /// Cached file list, if it has been computed.
    pub fn file_list(&self) -> Option<&[String]> {
        self.files.get().map(Vec::as_slice)
    }

    /// Stores a file list decoded eagerly by the adapter.
    ///
    /// Has no effect if a list is already cached.
    pub fn set_file_list(&self, files: Vec<String>) {
        let _ = self.files.set(files);
    }

    /// Returns the file list, asking `format` for it on first use.
    pub fn ensure_file_list(&self, format: &dyn PackageFormat) -> Result<&[String], PackageError> {
        if let Some(files) = self.files.get() {
            return Ok(files.as_slice());
        }
        let files = format.file_list(self)?;
        Ok(self.files.get_or_init(move || files).as_slice())
    }

    /// Appends to the package log and mirrors the entry to `tracing`.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Info => info!(package = %self.identity.name, "{}", message),
            LogLevel::Warning => warn!(package = %self.identity.name, "{}", message),
            LogLevel::None => debug!(package = %self.identity.name, "{}", message),
        }
        self.log.append(level, message);
    }

    pub fn log_buffer(&self) -> &PackageLog {
        &self.log
    }

    /// Path the log buffer is flushed to inside `log_dir`.
    pub fn log_path(&self, log_dir: &Path) -> PathBuf {
        log_dir.join(format!("{}.log", self.basename()))
    }

    /// Flushes the log buffer into `log_dir`.
    ///
    /// Returns `Ok(None)` if the log was already flushed.
    pub fn flush_log(&self, log_dir: &Path) -> std::io::Result<Option<PathBuf>> {
        let path = self.log_path(log_dir);
        Ok(self.log.flush(&path)?.then_some(path))
    }
}

/// Normalizes one raw dependency string.
///
/// Returns `None` for build-system-internal providers and the shell
/// interpreter; otherwise strips any parenthesized constraint.
///
/// ```
/// use appstream_harvester::package::normalize_dependency;
///
/// assert_eq!(normalize_dependency("libc.so.6(GLIBC_2.14)(64bit)").as_deref(), Some("libc.so.6"));
/// assert_eq!(normalize_dependency("rpmlib(CompressedFileNames)"), None);
/// ```
pub fn normalize_dependency(raw: &str) -> Option<String> {
    if raw.starts_with(BUILD_SYSTEM_PREFIX) || raw == SHELL_INTERPRETER {
        return None;
    }
    let name = match raw.find('(') {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Checks that `name` can serve as a single path component.
///
/// Sandbox directories are named after packages, so a name must not be
/// empty, `.` or `..`, and must not contain `/` or NUL.
pub fn validate_name(name: &str) -> Result<(), &'static str> {
    match name {
        "" => Err("name is empty"),
        "." | ".." => Err("name is a relative path component"),
        _ if name.contains('/') => Err("name contains '/'"),
        _ if name.contains('\0') => Err("name contains NUL"),
        _ => Ok(()),
    }
}

/// Extracts the version from a changelog header such as
/// `"Jane Doe <jane@example.com> - 2:1.0-3"`.
///
/// The last whitespace-separated chunk holds `[epoch:]version-release`;
/// headers ending in an e-mail address carry no version.
pub fn changelog_version(header: &str) -> Option<String> {
    let (_, chunk) = header.trim_end().rsplit_once(' ')?;
    let version = match chunk.split_once('-') {
        Some((version, _)) => version,
        None if chunk.contains('>') => return None,
        None => chunk,
    };
    let version = match version.split_once(':') {
        Some((_, without_epoch)) => without_epoch,
        None => version,
    };
    (!version.is_empty()).then(|| version.to_string())
}

// ============================================================================
// Tests
// ============================================================================
