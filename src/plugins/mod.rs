//! Statically registered analyzer plugins.
//!
//! - `desktop` - freedesktop.org desktop entries

pub mod desktop;

pub use desktop::DesktopPlugin;

use crate::harvest::registry::PluginRegistry;
use crate::harvest::traits::PluginError;

/// Registry holding every built-in plugin, in match-priority order.
pub fn builtin() -> Result<PluginRegistry, PluginError> {
    let mut registry = PluginRegistry::new();
    registry.register(DesktopPlugin::new())?;
    Ok(registry)
}
