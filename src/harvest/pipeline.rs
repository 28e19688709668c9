//! Per-package task pipeline.
//!
//! This module provides the [`TaskRunner`] that takes one package from file
//! list to emitted descriptors:
//! 1. **Match**: pick the first plugin accepting any file of the package
//! 2. **Explode**: unpack the package (and its extra package) into a sandbox
//! 3. **Process**: run the matched plugin
//! 4. **Filter**: enrich, refine and filter each descriptor
//! 5. **Teardown**: remove the sandbox and flush the package log
//!
//! Every failure is converted into a warning in the package log; nothing
//! escapes a task.

use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{instrument, warn};

use crate::context::Context;
use crate::executor::TaskHandler;
use crate::harvest::filter::{DescriptorFilter, Verdict};
use crate::harvest::sandbox::Sandbox;
use crate::harvest::traits::TaskError;
use crate::model::AppDescriptor;
use crate::package::{LogLevel, Package};

// ============================================================================
// Pipeline Types
// ============================================================================

/// One scheduled unit of work. Tasks order by source filename.
#[derive(Debug, Clone)]
pub struct Task {
    /// Archive file name, the scheduling key
    pub filename: String,

    /// Sandbox directory owned by this task
    pub sandbox_dir: PathBuf,

    pub package: Arc<Package>,
}

impl Task {
    pub fn new(filename: impl Into<String>, sandbox_dir: PathBuf, package: Arc<Package>) -> Self {
        Self {
            filename: filename.into(),
            sandbox_dir,
            package,
        }
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Task {}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Task {
    fn cmp(&self, other: &Self) -> Ordering {
        self.filename
            .cmp(&other.filename)
            .then_with(|| self.sandbox_dir.cmp(&other.sandbox_dir))
    }
}

/// How a task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Plugin ran; these descriptors survived the filter pipeline
    Completed(Vec<AppDescriptor>),

    /// No plugin matched any file of the package
    Skipped,

    /// Task aborted; the warning written to the package log
    Aborted(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub filename: String,
    pub package: String,
    pub outcome: TaskOutcome,
}

impl TaskReport {
    /// Descriptors emitted by the task; empty unless it completed.
    pub fn emitted(&self) -> &[AppDescriptor] {
        match &self.outcome {
            TaskOutcome::Completed(apps) => apps.as_slice(),
            TaskOutcome::Skipped | TaskOutcome::Aborted(_) => &[],
        }
    }
}

// ============================================================================
// Task Runner
// ============================================================================

/// Executes tasks against a shared, read-only [`Context`].
///
/// # Thread Safety
///
/// The runner is `Send + Sync`; each worker calls [`TaskRunner::run`] for a
/// different package and only touches that package's log buffer.
#[derive(Debug, Clone)]
pub struct TaskRunner {
    context: Arc<Context>,
}

impl TaskRunner {
    pub fn new(context: Arc<Context>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Runs one task end to end. Never fails: aborts are reported in the
    /// returned [`TaskReport`] and the package log.
    #[instrument(skip(self, task), fields(package = %task.package.name()))]
    pub fn run(&self, task: Task) -> TaskReport {
        let package = &task.package;
        let mut sandbox = None;

        let outcome = match self.execute(&task, &mut sandbox) {
            Ok(outcome) => outcome,
            Err(e) => {
                let message = e.to_string();
                package.log(LogLevel::Warning, message.clone());
                TaskOutcome::Aborted(message)
            }
        };

        // Teardown runs on every path.
        if let Some(sandbox) = sandbox.take() {
            if let Err(e) = sandbox.release() {
                package.log(LogLevel::Warning, format!("Failed to delete tree: {e}"));
            }
        }
        package.log(LogLevel::Info, format!("Flushing {}", task.filename));
        if let Err(e) = package.flush_log(self.context.log_dir()) {
            warn!(
                path = %package.log_path(self.context.log_dir()).display(),
                "Failed to flush package log: {}", e
            );
        }

        TaskReport {
            filename: task.filename.clone(),
            package: package.name().to_string(),
            outcome,
        }
    }

    fn execute(&self, task: &Task, sandbox: &mut Option<Sandbox>) -> Result<TaskOutcome, TaskError> {
        let package = task.package.as_ref();
        let format = self.context.format();

        let files = package
            .ensure_file_list(format)
            .map_err(TaskError::FileList)?;

        package.log(
            LogLevel::Info,
            format!("Getting filename match for {}", task.filename),
        );
        let Some(plugin) = self.context.plugins().match_files(files) else {
            return Ok(TaskOutcome::Skipped);
        };

        let sandbox = sandbox.insert(Sandbox::acquire(&task.sandbox_dir).map_err(TaskError::Clear)?);
        format
            .explode(package, sandbox.path())
            .map_err(TaskError::Explode)?;

        if let Some(required) = self.context.policy().extra_package_for(package.name()) {
            let extra = self
                .context
                .find_by_name(required)
                .ok_or_else(|| TaskError::MissingExtra {
                    package: package.name().to_string(),
                    required: required.to_string(),
                })?;
            format
                .explode(extra, sandbox.path())
                .map_err(TaskError::ExplodeExtra)?;
        }

        package.log(
            LogLevel::Info,
            format!("Processing {} with {}", task.filename, plugin.name()),
        );
        let apps = plugin
            .process(package, sandbox)
            .map_err(TaskError::Process)?;

        let filter = DescriptorFilter::new(self.context.policy(), self.context.plugins());
        let mut emitted = Vec::new();
        for app in apps {
            match filter
                .apply(package, app, sandbox)
                .map_err(TaskError::Refine)?
            {
                Verdict::Keep(app) => {
                    package.log(LogLevel::None, app.to_json()?);
                    emitted.push(app);
                }
                Verdict::Drop(reason) => package.log(LogLevel::Info, reason.to_string()),
            }
        }
        Ok(TaskOutcome::Completed(emitted))
    }
}

impl TaskHandler for TaskRunner {
    fn handle(&self, task: Task) -> TaskReport {
        self.run(task)
    }
}

// ============================================================================
// Tests
// ============================================================================
