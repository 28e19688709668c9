//! Gzip-compressed tar packages carrying a JSON manifest.
//!
//! Layout of a package archive:
//!
//! ```text
//! .PKGINFO.json
//! usr/bin/foo
//! usr/share/applications/foo.desktop
//! ...
//! ```
//!
//! The manifest holds the header fields, the raw dependency list and the
//! changelog; every other entry is package payload.

use flate2::read::GzDecoder;
use serde::Deserialize;
use std::fs::File;
use std::path::{Component, Path};
use tar::Archive;
use tracing::warn;

use crate::harvest::traits::{PackageError, PackageFormat};
use crate::package::{validate_name, Package, PackageIdentity};

/// Archive member holding the package metadata.
pub const MANIFEST_NAME: &str = ".PKGINFO.json";

#[derive(Debug, Deserialize)]
struct Manifest {
    name: String,
    version: String,
    #[serde(default)]
    release: String,
    #[serde(default)]
    epoch: u32,
    #[serde(default)]
    arch: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    license: Option<String>,
    #[serde(default)]
    requires: Vec<String>,
    #[serde(default)]
    changelog: Vec<ChangelogEntry>,
}

#[derive(Debug, Deserialize)]
struct ChangelogEntry {
    timestamp: u64,
    author: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TarballFormat;

impl TarballFormat {
    pub fn new() -> Self {
        Self
    }

    fn archive(path: &Path) -> Result<Archive<GzDecoder<File>>, PackageError> {
        let file = File::open(path).map_err(|source| PackageError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Archive::new(GzDecoder::new(file)))
    }

    fn read_manifest(path: &Path) -> Result<Manifest, PackageError> {
        let open_err = |source| PackageError::Open {
            path: path.to_path_buf(),
            source,
        };
        let mut archive = Self::archive(path)?;
        for entry in archive.entries().map_err(open_err)? {
            let entry = entry.map_err(open_err)?;
            let is_manifest = entry
                .path()
                .map(|p| package_path(&p).as_deref() == Some(MANIFEST_NAME))
                .unwrap_or(false);
            if is_manifest {
                return serde_json::from_reader(entry).map_err(|e| PackageError::Metadata {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                });
            }
        }
        Err(PackageError::Metadata {
            path: path.to_path_buf(),
            message: format!("missing {MANIFEST_NAME}"),
        })
    }
}

impl PackageFormat for TarballFormat {
    fn name(&self) -> &str {
        "tarball"
    }

    fn can_handle(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".tar.gz") || n.ends_with(".tgz"))
    }

    fn open(&self, path: &Path) -> Result<Package, PackageError> {
        let manifest = Self::read_manifest(path)?;
        validate_name(&manifest.name).map_err(|reason| PackageError::Metadata {
            path: path.to_path_buf(),
            message: format!("invalid package name {:?}: {reason}", manifest.name),
        })?;
        let source = manifest
            .source
            .as_deref()
            .map(strip_source_suffix)
            .unwrap_or(&manifest.name)
            .to_string();

        let mut package = Package::new(
            path,
            PackageIdentity {
                name: manifest.name,
                version: manifest.version,
                release: manifest.release,
                epoch: manifest.epoch,
                arch: manifest.arch,
                source,
            },
        );
        package.set_url(manifest.url);
        package.set_license(manifest.license);
        package.set_dependencies(&manifest.requires);
        for entry in &manifest.changelog {
            package.add_changelog_entry(entry.timestamp, &entry.author, &entry.text);
        }
        Ok(package)
    }

    fn file_list(&self, package: &Package) -> Result<Vec<String>, PackageError> {
        let list_err = |e: std::io::Error| PackageError::FileList {
            filename: package.basename(),
            message: e.to_string(),
        };
        let mut archive = Self::archive(package.filename())?;
        let mut files = Vec::new();
        for entry in archive.entries().map_err(list_err)? {
            let entry = entry.map_err(list_err)?;
            if entry.header().entry_type().is_dir() {
                continue;
            }
            let Some(path) = package_path(&entry.path().map_err(list_err)?) else {
                continue;
            };
            if path != MANIFEST_NAME {
                files.push(format!("/{path}"));
            }
        }
        Ok(files)
    }

    fn explode(&self, package: &Package, dest: &Path) -> Result<(), PackageError> {
        let explode_err = |source| PackageError::Explode {
            filename: package.basename(),
            source,
        };
        let mut archive = Self::archive(package.filename())?;
        for entry in archive.entries().map_err(explode_err)? {
            let mut entry = entry.map_err(explode_err)?;
            let is_manifest = entry
                .path()
                .map(|p| package_path(&p).as_deref() == Some(MANIFEST_NAME))
                .map_err(explode_err)?;
            if is_manifest {
                continue;
            }
            // unpack_in refuses entries escaping `dest`
            if !entry.unpack_in(dest).map_err(explode_err)? {
                warn!(
                    package = %package.name(),
                    "Skipped archive entry outside the sandbox"
                );
            }
        }
        Ok(())
    }
}

/// Normalizes an archive member path to `a/b/c`, dropping `./` prefixes.
///
/// Returns `None` for the archive root itself.
fn package_path(path: &Path) -> Option<String> {
    let parts: Vec<_> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// `foo-1.0-1.src.rpm` → `foo-1.0-1`
fn strip_source_suffix(source: &str) -> &str {
    match source.find(".src.") {
        Some(idx) => &source[..idx],
        None => source,
    }
}
