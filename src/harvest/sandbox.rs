//! Per-task scratch directories.
//!
//! A [`Sandbox`] is acquired empty, receives the exploded package contents,
//! and is removed when the task finishes. The scheduler derives every
//! sandbox path from a unique package name so no two running tasks share
//! one.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

use crate::harvest::traits::SandboxError;

/// Exclusively owned scratch directory for one task.
///
/// # RAII Cleanup
///
/// The normal exit path calls [`Sandbox::release`] so that a removal
/// failure can be reported into the package log. If a sandbox is dropped
/// without being released (a panicking plugin, for instance) `Drop`
/// removes the directory and reports failures through `tracing`.
/// Because of this, it intentionally does **not** implement `Clone`.
#[derive(Debug)]
pub struct Sandbox {
    path: PathBuf,
    released: bool,
}

impl Sandbox {
    /// Ensures `path` exists and is empty, then takes ownership of it.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError`] if the directory cannot be created or its
    /// previous contents cannot be deleted.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, SandboxError> {
        let path = path.into();
        ensure_exists_and_empty(&path)?;
        Ok(Self {
            path,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolves `relative` against the sandbox root, rejecting any path
    /// that escapes the root (path traversal guard).
    ///
    /// # Errors
    ///
    /// Returns `Err` if `relative` contains `..` or is absolute.
    pub fn child(&self, relative: &Path) -> Result<PathBuf, SandboxError> {
        for component in relative.components() {
            match component {
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(SandboxError::PathTraversal {
                        attempted: relative.display().to_string(),
                    });
                }
                Component::CurDir | Component::Normal(_) => {}
            }
        }
        Ok(self.path.join(relative))
    }

    /// Resolves a package file path such as `/usr/share/applications/a.desktop`
    /// to its location inside the sandbox.
    pub fn resolve(&self, package_path: &str) -> Result<PathBuf, SandboxError> {
        self.child(Path::new(package_path.trim_start_matches('/')))
    }

    /// Deletes the directory tree and the directory itself.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Remove`] if deletion fails. The sandbox is
    /// considered released either way.
    pub fn release(mut self) -> Result<(), SandboxError> {
        self.released = true;
        remove_tree(&self.path)
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        if !self.released && self.path.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!(
                    path = %self.path.display(),
                    "Failed to remove sandbox: {}", e
                );
            }
        }
    }
}

/// Creates `dir` (and parents) if missing, otherwise deletes everything
/// inside it while keeping the directory itself.
pub fn ensure_exists_and_empty(dir: &Path) -> Result<(), SandboxError> {
    if !dir.exists() {
        return create_private_dir(dir).map_err(|source| SandboxError::Create {
            path: dir.to_path_buf(),
            source,
        });
    }

    let clear = |source| SandboxError::Clear {
        path: dir.to_path_buf(),
        source,
    };
    for entry in std::fs::read_dir(dir).map_err(clear)? {
        let entry = entry.map_err(clear)?;
        let path = entry.path();
        // symlink_metadata: never follow a link out of the sandbox
        let is_dir = std::fs::symlink_metadata(&path)
            .map(|m| m.is_dir())
            .map_err(clear)?;
        let removed = if is_dir {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        removed.map_err(|source| SandboxError::Clear { path, source })?;
    }
    Ok(())
}

/// Recursively deletes `dir`. A directory that is already gone counts as
/// removed.
pub fn remove_tree(dir: &Path) -> Result<(), SandboxError> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(SandboxError::Remove {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}

// ============================================================================
// Tests
// ============================================================================
