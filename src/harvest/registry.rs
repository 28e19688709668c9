//! Statically registered analyzer plugins.
//!
//! The [`PluginRegistry`] keeps plugins in registration order. Matching walks
//! a package's file list in order and returns the first plugin accepting any
//! file; registration order only breaks ties for a single path.

use std::fmt;
use std::sync::Arc;

use crate::harvest::sandbox::Sandbox;
use crate::harvest::traits::{Plugin, PluginError};
use crate::model::AppDescriptor;
use crate::package::Package;

#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::AlreadyRegistered`] if a plugin with the same
    /// name is already present.
    pub fn register<P>(&mut self, plugin: P) -> Result<(), PluginError>
    where
        P: Plugin + 'static,
    {
        if self.plugins.iter().any(|p| p.name() == plugin.name()) {
            return Err(PluginError::AlreadyRegistered(plugin.name().to_string()));
        }
        self.plugins.push(Arc::new(plugin));
        Ok(())
    }

    /// First registered plugin whose predicate accepts `path`.
    pub fn match_path(&self, path: &str) -> Option<&dyn Plugin> {
        self.plugins
            .iter()
            .find(|p| p.matches(path))
            .map(|p| p.as_ref())
    }

    /// Plugin for a package: the first file (in list order) that any plugin
    /// accepts decides.
    pub fn match_files<S: AsRef<str>>(&self, files: &[S]) -> Option<&dyn Plugin> {
        files.iter().find_map(|f| self.match_path(f.as_ref()))
    }

    /// Runs every plugin's refine function on `app`, in registration order.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first refine failure.
    pub fn refine_all(
        &self,
        package: &Package,
        app: &mut AppDescriptor,
        sandbox: &Sandbox,
    ) -> Result<(), PluginError> {
        for plugin in &self.plugins {
            plugin.refine(package, app, sandbox)?;
        }
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{package, StaticPlugin};

    #[test]
    fn test_register_rejects_duplicate_names() {
        let mut registry = PluginRegistry::new();
        registry.register(StaticPlugin::new("a", ".a")).unwrap();
        let err = registry.register(StaticPlugin::new("a", ".b")).unwrap_err();
        assert!(matches!(err, PluginError::AlreadyRegistered(name) if name == "a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_file_order_decides_between_plugins() {
        let mut registry = PluginRegistry::new();
        registry.register(StaticPlugin::new("first", ".a")).unwrap();
        registry.register(StaticPlugin::new("second", ".b")).unwrap();

        let files = ["/usr/bin/tool", "/data/x.b", "/data/y.a"];
        assert_eq!(registry.match_files(&files).unwrap().name(), "second");
    }

    #[test]
    fn test_registration_order_breaks_ties_on_one_path() {
        let mut registry = PluginRegistry::new();
        registry.register(StaticPlugin::new("first", ".meta")).unwrap();
        registry.register(StaticPlugin::new("second", ".meta")).unwrap();

        assert_eq!(registry.match_path("/data/foo.meta").unwrap().name(), "first");
    }

    #[test]
    fn test_no_match_returns_none() {
        let mut registry = PluginRegistry::new();
        registry.register(StaticPlugin::new("first", ".meta")).unwrap();
        let files: [&str; 2] = ["/usr/bin/foo", "/usr/lib/libfoo.so"];
        assert!(registry.match_files(&files).is_none());
        assert!(PluginRegistry::new().match_files(&files).is_none());
    }

    #[test]
    fn test_refine_all_stops_at_first_failure() {
        let mut registry = PluginRegistry::new();
        registry
            .register(StaticPlugin::new("failing", ".meta").failing_refine())
            .unwrap();
        registry
            .register(StaticPlugin::new("icon", ".other").with_refine_icon("late"))
            .unwrap();

        let root = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::acquire(root.path().join("foo")).unwrap();
        let pkg = package("foo", &[]);
        let mut app = AppDescriptor::new("foo.desktop");

        assert!(registry.refine_all(&pkg, &mut app, &sandbox).is_err());
        assert_eq!(app.icon, None);
    }
}
