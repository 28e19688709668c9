use serde::{Deserialize, Serialize};

/// One candidate application record produced by an analyzer plugin.
///
/// Descriptors are owned by the task that created them. Refine plugins may
/// mutate them; once the filter pipeline starts checking the "still
/// incomplete" conditions they are treated as read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDescriptor {
    /// Short identifier, e.g. `"gimp.desktop"`
    pub id: Option<String>,

    /// Component-qualified identifier, e.g. `"desktop/gimp.desktop"`
    pub id_full: Option<String>,

    /// Human readable application name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// One-line summary of the application
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Upstream homepage (filled from the package when the plugin left it unset)
    pub homepage_url: Option<String>,

    /// Project license (filled from the package when the plugin left it unset)
    pub project_license: Option<String>,

    /// Icon reference; descriptors without one are never emitted
    pub icon: Option<String>,

    /// Set when the descriptor cannot be emitted until a refine stage
    /// supplies external metadata
    #[serde(default)]
    pub requires_appdata: bool,
}

impl AppDescriptor {
    /// Creates a descriptor whose short and full identifiers are both `id`.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            id_full: Some(id.clone()),
            id: Some(id),
            ..Self::default()
        }
    }

    /// Identifier used in log lines: the full id, falling back to the short one.
    pub fn display_id(&self) -> &str {
        self.id_full
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or("<unset>")
    }

    /// Serializes the descriptor for the package log.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// One changelog-derived version record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub version: String,

    /// Earliest changelog timestamp seen for this version (epoch seconds)
    pub timestamp: u64,

    pub description: Option<String>,
}
