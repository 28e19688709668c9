//! Harvest module - package-to-descriptor orchestration pipeline.
//!
//! This module provides the core abstractions for the harvester:
//! - **Traits**: [`PackageFormat`], [`Plugin`] for adapters and analyzers
//! - **Registry**: capability matching via [`PluginRegistry`]
//! - **Sandbox**: per-task scratch directories via [`Sandbox`]
//! - **Filter**: descriptor policy checks via [`DescriptorFilter`]
//! - **Pipeline**: per-package task execution via [`TaskRunner`]

pub mod filter;
pub mod formats;
pub mod pipeline;
pub mod registry;
pub mod sandbox;
pub mod traits;

// Re-export commonly used types
pub use traits::{
    HarvestError, PackageError, PackageFormat, Plugin, PluginError, SandboxError,
    SchedulerError, TaskError,
};

pub use filter::{DescriptorFilter, DropReason, Verdict};
pub use pipeline::{Task, TaskOutcome, TaskReport, TaskRunner};
pub use registry::PluginRegistry;
pub use sandbox::Sandbox;
