//! Per-descriptor filtering between plugin output and emission.
//!
//! Stages run in a fixed order: id checks, package enrichment, refine, then
//! the "still incomplete" checks. Enrichment precedes refine so refine
//! plugins see package-sourced defaults; the incomplete checks follow refine
//! so plugins get a chance to fill gaps first.

use std::fmt;

use crate::harvest::registry::PluginRegistry;
use crate::harvest::sandbox::Sandbox;
use crate::harvest::traits::PluginError;
use crate::model::AppDescriptor;
use crate::package::Package;
use crate::policy::Policy;

/// Why a descriptor was not emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    MissingId { package: String },
    BlacklistedId { id: String },
    RequiresAppData { id: String },
    MissingIcon { id: String },
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingId { package } => write!(f, "app id not set for {package}"),
            Self::BlacklistedId { id } => write!(f, "app id {id} is blacklisted"),
            Self::RequiresAppData { id } => {
                write!(f, "{id} required appdata but none provided")
            }
            Self::MissingIcon { id } => write!(f, "{id} has no icon"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Keep(AppDescriptor),
    Drop(DropReason),
}

pub struct DescriptorFilter<'a> {
    policy: &'a Policy,
    plugins: &'a PluginRegistry,
}

impl<'a> DescriptorFilter<'a> {
    pub fn new(policy: &'a Policy, plugins: &'a PluginRegistry) -> Self {
        Self { policy, plugins }
    }

    /// Runs `app` through every stage.
    ///
    /// # Errors
    ///
    /// A refine failure is returned as-is; the caller aborts the task.
    pub fn apply(
        &self,
        package: &Package,
        mut app: AppDescriptor,
        sandbox: &Sandbox,
    ) -> Result<Verdict, PluginError> {
        let Some(id) = app.id.as_deref() else {
            return Ok(Verdict::Drop(DropReason::MissingId {
                package: package.name().to_string(),
            }));
        };
        if self.policy.is_blacklisted_id(id) {
            return Ok(Verdict::Drop(DropReason::BlacklistedId { id: id.to_string() }));
        }

        enrich(&mut app, package);
        self.plugins.refine_all(package, &mut app, sandbox)?;

        if app.requires_appdata {
            return Ok(Verdict::Drop(DropReason::RequiresAppData {
                id: app.display_id().to_string(),
            }));
        }
        if app.icon.is_none() {
            return Ok(Verdict::Drop(DropReason::MissingIcon {
                id: app.display_id().to_string(),
            }));
        }
        Ok(Verdict::Keep(app))
    }
}

/// Copies package metadata into fields the plugin left unset.
fn enrich(app: &mut AppDescriptor, package: &Package) {
    if app.homepage_url.is_none() {
        app.homepage_url = package.url().map(str::to_string);
    }
    if app.project_license.is_none() {
        app.project_license = package.license().map(str::to_string);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyConfig;
    use crate::testing::{package, StaticPlugin};

    struct Fixture {
        _root: tempfile::TempDir,
        sandbox: Sandbox,
        package: Package,
    }

    fn fixture() -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::acquire(root.path().join("foo")).unwrap();
        let mut package = package("foo", &[]);
        package.set_url(Some("https://foo.example".to_string()));
        package.set_license(Some("GPL-2.0+".to_string()));
        Fixture {
            _root: root,
            sandbox,
            package,
        }
    }

    fn complete(id: &str) -> AppDescriptor {
        let mut app = AppDescriptor::new(id);
        app.icon = Some("foo".to_string());
        app
    }

    #[test]
    fn test_missing_id_is_dropped() {
        let fx = fixture();
        let policy = Policy::default();
        let plugins = PluginRegistry::new();
        let filter = DescriptorFilter::new(&policy, &plugins);

        let verdict = filter
            .apply(&fx.package, AppDescriptor::default(), &fx.sandbox)
            .unwrap();
        assert_eq!(
            verdict,
            Verdict::Drop(DropReason::MissingId {
                package: "foo".to_string()
            })
        );
    }

    #[test]
    fn test_blacklisted_id_is_dropped_before_refine() {
        let fx = fixture();
        let policy = Policy::from_config(&PolicyConfig {
            blacklisted_ids: vec!["*.blocked".to_string()],
            ..PolicyConfig::default()
        })
        .unwrap();
        let mut plugins = PluginRegistry::new();
        plugins
            .register(StaticPlugin::new("failing", ".x").failing_refine())
            .unwrap();
        let filter = DescriptorFilter::new(&policy, &plugins);

        let verdict = filter
            .apply(&fx.package, complete("foo.blocked"), &fx.sandbox)
            .unwrap();
        assert_eq!(verdict.to_drop_message(), "app id foo.blocked is blacklisted");
    }

    #[test]
    fn test_enrichment_only_fills_unset_fields() {
        let fx = fixture();
        let policy = Policy::default();
        let plugins = PluginRegistry::new();
        let filter = DescriptorFilter::new(&policy, &plugins);

        let mut app = complete("foo.desktop");
        app.project_license = Some("MIT".to_string());

        let Verdict::Keep(app) = filter.apply(&fx.package, app, &fx.sandbox).unwrap() else {
            panic!("expected descriptor to survive");
        };
        assert_eq!(app.homepage_url.as_deref(), Some("https://foo.example"));
        assert_eq!(app.project_license.as_deref(), Some("MIT"));
    }

    #[test]
    fn test_refine_can_supply_missing_metadata() {
        let fx = fixture();
        let policy = Policy::default();
        let mut plugins = PluginRegistry::new();
        plugins
            .register(StaticPlugin::new("appdata", ".x").clearing_appdata())
            .unwrap();
        plugins
            .register(StaticPlugin::new("icons", ".y").with_refine_icon("foo"))
            .unwrap();
        let filter = DescriptorFilter::new(&policy, &plugins);

        let mut app = AppDescriptor::new("foo.desktop");
        app.requires_appdata = true;

        let verdict = filter.apply(&fx.package, app, &fx.sandbox).unwrap();
        assert!(matches!(verdict, Verdict::Keep(ref a) if a.icon.as_deref() == Some("foo")));
    }

    #[test]
    fn test_incomplete_descriptors_are_dropped_after_refine() {
        let fx = fixture();
        let policy = Policy::default();
        let plugins = PluginRegistry::new();
        let filter = DescriptorFilter::new(&policy, &plugins);

        let mut needs_appdata = complete("foo.desktop");
        needs_appdata.requires_appdata = true;
        let verdict = filter.apply(&fx.package, needs_appdata, &fx.sandbox).unwrap();
        assert_eq!(
            verdict.to_drop_message(),
            "foo.desktop required appdata but none provided"
        );

        let no_icon = AppDescriptor::new("foo.desktop");
        let verdict = filter.apply(&fx.package, no_icon, &fx.sandbox).unwrap();
        assert_eq!(verdict.to_drop_message(), "foo.desktop has no icon");
    }

    #[test]
    fn test_refine_failure_is_an_error() {
        let fx = fixture();
        let policy = Policy::default();
        let mut plugins = PluginRegistry::new();
        plugins
            .register(StaticPlugin::new("failing", ".x").failing_refine())
            .unwrap();
        let filter = DescriptorFilter::new(&policy, &plugins);

        assert!(filter
            .apply(&fx.package, complete("foo.desktop"), &fx.sandbox)
            .is_err());
    }

    impl Verdict {
        fn to_drop_message(&self) -> String {
            match self {
                Verdict::Drop(reason) => reason.to_string(),
                Verdict::Keep(app) => panic!("expected {} to be dropped", app.display_id()),
            }
        }
    }
}
