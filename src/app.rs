//! End-to-end run: prepare directories, load packages, process them.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::config::HarvestConfig;
use crate::context::{AddOutcome, ContextBuilder};
use crate::harvest::formats::TarballFormat;
use crate::harvest::pipeline::{TaskOutcome, TaskRunner};
use crate::harvest::sandbox::ensure_exists_and_empty;
use crate::harvest::traits::HarvestError;
use crate::plugins;
use crate::policy::Policy;

/// Counts over all task reports of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub packages: usize,
    pub completed: usize,
    pub skipped: usize,
    pub aborted: usize,
    pub descriptors: usize,
}

fn prepare_dir(kind: &'static str, dir: &Path) -> Result<(), HarvestError> {
    ensure_exists_and_empty(dir).map_err(|source| HarvestError::Directory { kind, source })
}

/// Runs the whole harvest described by `config`.
///
/// # Errors
///
/// Only fatal setup failures are returned; per-package failures end up in
/// the package logs and in [`RunSummary::aborted`].
#[instrument(skip(config), fields(packages_dir = %config.packages_dir.display()))]
pub async fn run(config: HarvestConfig) -> Result<RunSummary, HarvestError> {
    prepare_dir("temp", &config.temp_dir)?;
    prepare_dir("log", &config.log_dir)?;
    prepare_dir("icons", &config.icons_dir)?;

    let policy = Policy::from_config(&config.policy)?;
    let registry = plugins::builtin()?;
    let mut builder = ContextBuilder::new(Arc::new(TarballFormat::new()), registry, policy)
        .with_temp_dir(&config.temp_dir)
        .with_log_dir(&config.log_dir);

    match &config.buildone {
        Some(path) => {
            if builder.add_package(path)? == AddOutcome::Blacklisted {
                info!(path = %path.display(), "Package is blacklisted");
            }
        }
        None => {
            debug!("Scanning packages");
            builder.add_directory(&config.packages_dir)?;
        }
    }

    let context = Arc::new(builder.build());
    let scheduler = context.scheduler();
    let runner = Arc::new(TaskRunner::new(Arc::clone(&context)));
    let reports = scheduler.run_all(runner, config.workers).await?;

    let mut summary = RunSummary {
        packages: context.packages().len(),
        ..RunSummary::default()
    };
    for report in &reports {
        match &report.outcome {
            TaskOutcome::Completed(apps) => {
                summary.completed += 1;
                summary.descriptors += apps.len();
            }
            TaskOutcome::Skipped => summary.skipped += 1,
            TaskOutcome::Aborted(_) => summary.aborted += 1,
        }
    }
    info!(
        packages = summary.packages,
        completed = summary.completed,
        skipped = summary.skipped,
        aborted = summary.aborted,
        descriptors = summary.descriptors,
        "Done!"
    );
    Ok(summary)
}
