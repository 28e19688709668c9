//! Mock adapters and plugins shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::harvest::sandbox::Sandbox;
use crate::harvest::traits::{PackageError, PackageFormat, Plugin, PluginError};
use crate::model::AppDescriptor;
use crate::package::{Package, PackageIdentity};

/// Package `name` version `1.0` release `1` with a pre-cached file list.
pub fn package(name: &str, files: &[&str]) -> Package {
    let pkg = Package::new(
        format!("/packages/{name}-1.0-1.noarch.tar.gz"),
        identity(name),
    );
    if !files.is_empty() {
        pkg.set_file_list(files.iter().map(|f| f.to_string()).collect());
    }
    pkg
}

pub fn identity(name: &str) -> PackageIdentity {
    PackageIdentity {
        name: name.to_string(),
        version: "1.0".to_string(),
        release: "1".to_string(),
        arch: "noarch".to_string(),
        source: name.to_string(),
        ..PackageIdentity::default()
    }
}

/// In-memory package format keyed by package name.
#[derive(Default)]
pub struct MockFormat {
    contents: HashMap<String, Vec<(String, String)>>,
    archives: HashMap<PathBuf, PackageIdentity>,
    failing_file_list: HashSet<String>,
    failing_explode: HashSet<String>,
}

impl MockFormat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file (absolute package path) to package `name`.
    pub fn with_file(mut self, name: &str, path: &str, contents: &str) -> Self {
        self.contents
            .entry(name.to_string())
            .or_default()
            .push((path.to_string(), contents.to_string()));
        self
    }

    /// Makes `path` openable as package `name`.
    pub fn with_archive(mut self, path: &str, name: &str) -> Self {
        self.archives.insert(PathBuf::from(path), identity(name));
        self
    }

    pub fn failing_file_list(mut self, name: &str) -> Self {
        self.failing_file_list.insert(name.to_string());
        self
    }

    pub fn failing_explode(mut self, name: &str) -> Self {
        self.failing_explode.insert(name.to_string());
        self
    }
}

impl PackageFormat for MockFormat {
    fn name(&self) -> &str {
        "mock"
    }

    fn can_handle(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == "mock")
    }

    fn open(&self, path: &Path) -> Result<Package, PackageError> {
        let identity = self
            .archives
            .get(path)
            .cloned()
            .ok_or_else(|| PackageError::Open {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such archive"),
            })?;
        Ok(Package::new(path, identity))
    }

    fn file_list(&self, package: &Package) -> Result<Vec<String>, PackageError> {
        if self.failing_file_list.contains(package.name()) {
            return Err(PackageError::FileList {
                filename: package.basename(),
                message: "corrupt header".to_string(),
            });
        }
        Ok(self
            .contents
            .get(package.name())
            .map(|files| files.iter().map(|(p, _)| p.clone()).collect())
            .unwrap_or_default())
    }

    fn explode(&self, package: &Package, dest: &Path) -> Result<(), PackageError> {
        let explode_err = |source| PackageError::Explode {
            filename: package.basename(),
            source,
        };
        if self.failing_explode.contains(package.name()) {
            return Err(explode_err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "truncated payload",
            )));
        }
        for (path, contents) in self.contents.get(package.name()).into_iter().flatten() {
            let target = dest.join(path.trim_start_matches('/'));
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(explode_err)?;
            }
            std::fs::write(&target, contents).map_err(explode_err)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum RefineBehaviour {
    Nothing,
    Fail,
    SetIcon(&'static str),
    ClearAppData,
}

/// Plugin matching paths by suffix and returning canned descriptors.
pub struct StaticPlugin {
    name: String,
    suffix: String,
    descriptors: Vec<AppDescriptor>,
    fail_process: bool,
    refine: RefineBehaviour,
    seen: Arc<Mutex<Vec<String>>>,
}

impl StaticPlugin {
    pub fn new(name: &str, suffix: &str) -> Self {
        Self {
            name: name.to_string(),
            suffix: suffix.to_string(),
            descriptors: Vec::new(),
            fail_process: false,
            refine: RefineBehaviour::Nothing,
            seen: Arc::default(),
        }
    }

    pub fn returning(mut self, descriptors: Vec<AppDescriptor>) -> Self {
        self.descriptors = descriptors;
        self
    }

    pub fn failing_process(mut self) -> Self {
        self.fail_process = true;
        self
    }

    pub fn failing_refine(mut self) -> Self {
        self.refine = RefineBehaviour::Fail;
        self
    }

    pub fn with_refine_icon(mut self, icon: &'static str) -> Self {
        self.refine = RefineBehaviour::SetIcon(icon);
        self
    }

    pub fn clearing_appdata(mut self) -> Self {
        self.refine = RefineBehaviour::ClearAppData;
        self
    }

    /// Names of packages passed to `process`, in call order.
    pub fn seen(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.seen)
    }
}

impl Plugin for StaticPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, path: &str) -> bool {
        path.ends_with(&self.suffix)
    }

    fn process(
        &self,
        package: &Package,
        _sandbox: &Sandbox,
    ) -> Result<Vec<AppDescriptor>, PluginError> {
        self.seen.lock().unwrap().push(package.name().to_string());
        if self.fail_process {
            return Err(PluginError::Process {
                plugin: self.name.clone(),
                message: "analysis exploded".to_string(),
            });
        }
        Ok(self.descriptors.clone())
    }

    fn refine(
        &self,
        _package: &Package,
        app: &mut AppDescriptor,
        _sandbox: &Sandbox,
    ) -> Result<(), PluginError> {
        match self.refine {
            RefineBehaviour::Nothing => {}
            RefineBehaviour::Fail => {
                return Err(PluginError::Refine {
                    plugin: self.name.clone(),
                    app: app.display_id().to_string(),
                    message: "refine exploded".to_string(),
                })
            }
            RefineBehaviour::SetIcon(icon) => app.icon = Some(icon.to_string()),
            RefineBehaviour::ClearAppData => app.requires_appdata = false,
        }
        Ok(())
    }
}
