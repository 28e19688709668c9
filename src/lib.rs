pub mod app;
pub mod config;
pub mod context;
pub mod executor;
pub mod harvest;
pub mod model;
pub mod package;
pub mod plugins;
pub mod policy;

#[cfg(test)]
pub(crate) mod testing;

// Re-export common types for convenience
pub use app::{run, RunSummary};
pub use config::{ConfigError, ExtraPackageRule, HarvestConfig, PolicyConfig};
pub use context::{AddOutcome, Context, ContextBuilder};
pub use executor::{Scheduler, TaskHandler};
pub use harvest::*;
pub use model::*;
pub use package::{LogEntry, LogLevel, Package, PackageIdentity};
pub use policy::{GlobList, Policy};
