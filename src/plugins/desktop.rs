//! Desktop entry analyzer.
//!
//! Turns every visible application in `/usr/share/applications` into a
//! descriptor. Entries without a `Comment` need an AppData file to be
//! emitted; the refine stage clears that requirement when one is shipped.

use std::path::Path;
use tracing::debug;

use crate::harvest::sandbox::Sandbox;
use crate::harvest::traits::{Plugin, PluginError};
use crate::model::AppDescriptor;
use crate::package::Package;

const APPLICATIONS_DIR: &str = "/usr/share/applications/";
const DESKTOP_GROUP: &str = "[Desktop Entry]";

#[derive(Debug, Default, PartialEq, Eq)]
struct DesktopEntry {
    kind: Option<String>,
    name: Option<String>,
    comment: Option<String>,
    icon: Option<String>,
    no_display: bool,
}

impl DesktopEntry {
    fn parse(contents: &str) -> Self {
        let mut entry = Self::default();
        let mut in_group = false;
        for line in contents.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with('[') {
                in_group = line == DESKTOP_GROUP;
                continue;
            }
            if !in_group {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().to_string();
            // localized keys such as Name[de] are ignored
            match key.trim() {
                "Type" => entry.kind = Some(value),
                "Name" => entry.name = Some(value),
                "Comment" => entry.comment = Some(value),
                "Icon" => entry.icon = Some(value).filter(|v| !v.is_empty()),
                "NoDisplay" => entry.no_display = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }
        entry
    }

    fn is_visible_application(&self) -> bool {
        !self.no_display && self.kind.as_deref().map_or(true, |k| k == "Application")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopPlugin;

impl DesktopPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for DesktopPlugin {
    fn name(&self) -> &str {
        "desktop"
    }

    fn matches(&self, path: &str) -> bool {
        path.strip_prefix(APPLICATIONS_DIR)
            .is_some_and(|rest| rest.ends_with(".desktop") && !rest.contains('/'))
    }

    fn process(
        &self,
        package: &Package,
        sandbox: &Sandbox,
    ) -> Result<Vec<AppDescriptor>, PluginError> {
        let files = package.file_list().unwrap_or_default();
        let mut apps = Vec::new();
        for path in files.iter().filter(|f| self.matches(f)) {
            let contents = std::fs::read_to_string(sandbox.resolve(path)?)?;
            let entry = DesktopEntry::parse(&contents);
            let id = path.trim_start_matches(APPLICATIONS_DIR);
            if !entry.is_visible_application() {
                debug!(package = %package.name(), id, "Skipping hidden desktop entry");
                continue;
            }

            let mut app = AppDescriptor::new(id);
            app.id_full = Some(format!("desktop/{id}"));
            app.requires_appdata = entry.comment.is_none();
            app.name = entry.name;
            app.summary = entry.comment;
            app.icon = entry.icon;
            apps.push(app);
        }
        Ok(apps)
    }

    fn refine(
        &self,
        _package: &Package,
        app: &mut AppDescriptor,
        sandbox: &Sandbox,
    ) -> Result<(), PluginError> {
        if !app.requires_appdata {
            return Ok(());
        }
        let Some(id) = app.id.as_deref() else {
            return Ok(());
        };
        let stem = id.strip_suffix(".desktop").unwrap_or(id);
        let candidates = [
            format!("usr/share/appdata/{stem}.appdata.xml"),
            format!("usr/share/metainfo/{stem}.metainfo.xml"),
        ];
        for candidate in &candidates {
            if sandbox.child(Path::new(candidate))?.is_file() {
                app.requires_appdata = false;
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::package;

    const GIMP: &str = "\
[Desktop Entry]
# comment line
Type=Application
Name=GIMP
Name[de]=GIMP Bildbearbeitung
Comment=Create images and edit photographs
Icon=gimp

[Desktop Action new]
Icon=other
";

    fn write(sandbox: &Sandbox, path: &str, contents: &str) {
        let target = sandbox.resolve(path).unwrap();
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(target, contents).unwrap();
    }

    #[test]
    fn test_parse_reads_only_desktop_group() {
        let entry = DesktopEntry::parse(GIMP);
        assert_eq!(entry.name.as_deref(), Some("GIMP"));
        assert_eq!(entry.icon.as_deref(), Some("gimp"));
        assert!(entry.is_visible_application());
    }

    #[test]
    fn test_matches_top_level_desktop_files_only() {
        let plugin = DesktopPlugin::new();
        assert!(plugin.matches("/usr/share/applications/gimp.desktop"));
        assert!(!plugin.matches("/usr/share/applications/kde4/gimp.desktop"));
        assert!(!plugin.matches("/usr/share/applications/mimeinfo.cache"));
        assert!(!plugin.matches("/usr/bin/gimp"));
    }

    #[test]
    fn test_process_builds_descriptors() {
        let root = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::acquire(root.path().join("gimp")).unwrap();
        write(&sandbox, "/usr/share/applications/gimp.desktop", GIMP);
        write(
            &sandbox,
            "/usr/share/applications/hidden.desktop",
            "[Desktop Entry]\nName=Hidden\nNoDisplay=true\n",
        );
        let pkg = package(
            "gimp",
            &[
                "/usr/bin/gimp",
                "/usr/share/applications/gimp.desktop",
                "/usr/share/applications/hidden.desktop",
            ],
        );

        let apps = DesktopPlugin::new().process(&pkg, &sandbox).unwrap();
        assert_eq!(apps.len(), 1);
        let app = &apps[0];
        assert_eq!(app.id.as_deref(), Some("gimp.desktop"));
        assert_eq!(app.id_full.as_deref(), Some("desktop/gimp.desktop"));
        assert_eq!(app.summary.as_deref(), Some("Create images and edit photographs"));
        assert_eq!(app.icon.as_deref(), Some("gimp"));
        assert!(!app.requires_appdata);
    }

    #[test]
    fn test_refine_clears_requirement_when_appdata_shipped() {
        let root = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::acquire(root.path().join("foo")).unwrap();
        let pkg = package("foo", &[]);
        let plugin = DesktopPlugin::new();

        let mut app = AppDescriptor::new("foo.desktop");
        app.requires_appdata = true;
        plugin.refine(&pkg, &mut app, &sandbox).unwrap();
        assert!(app.requires_appdata);

        write(&sandbox, "/usr/share/metainfo/foo.metainfo.xml", "<component/>");
        plugin.refine(&pkg, &mut app, &sandbox).unwrap();
        assert!(!app.requires_appdata);
    }
}
