use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument};

use crate::harvest::pipeline::{Task, TaskReport};
use crate::harvest::traits::SchedulerError;

/// Something that can run one task to completion on a blocking thread.
pub trait TaskHandler: Send + Sync + 'static {
    fn handle(&self, task: Task) -> TaskReport;
}

/// Bounded-concurrency task runner with filename-ordered dispatch.
///
/// Tasks start in filename order regardless of submission order. With one
/// worker, processing (and therefore log emission) order is fully
/// reproducible; with more, only start order is guaranteed.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BinaryHeap<Reverse<Task>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&mut self, task: Task) {
        self.queue.push(Reverse(task));
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Removes every queued task, lowest filename first.
    pub fn drain_ordered(&mut self) -> Vec<Task> {
        let mut tasks = Vec::with_capacity(self.queue.len());
        while let Some(Reverse(task)) = self.queue.pop() {
            tasks.push(task);
        }
        tasks
    }

    /// Runs every submitted task on `worker_count` workers and waits for
    /// all of them.
    ///
    /// Reports are returned in completion order.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NoWorkers`] for an empty pool, or
    /// [`SchedulerError::Worker`] if a worker loop dies. Individual task
    /// failures are never errors here.
    #[instrument(skip_all, fields(workers = worker_count))]
    pub async fn run_all<H: TaskHandler>(
        mut self,
        handler: Arc<H>,
        worker_count: usize,
    ) -> Result<Vec<TaskReport>, SchedulerError> {
        if worker_count == 0 {
            return Err(SchedulerError::NoWorkers);
        }
        let tasks = self.drain_ordered();
        let total = tasks.len();
        info!(tasks = total, workers = worker_count, "Processing packages");

        // Capacity == worker count: the feeder stays at most one batch
        // ahead, so tasks leave the queue in order as workers free up.
        let (tx, rx) = mpsc::channel::<Task>(worker_count);
        let rx = Arc::new(Mutex::new(rx));
        let reports = Arc::new(Mutex::new(Vec::with_capacity(total)));

        let feeder = tokio::spawn(async move {
            for task in tasks {
                if tx.send(task).await.is_err() {
                    break;
                }
            }
        });

        let mut workers = JoinSet::new();
        for worker in 0..worker_count {
            let rx = Arc::clone(&rx);
            let handler = Arc::clone(&handler);
            let reports = Arc::clone(&reports);
            workers.spawn(async move {
                loop {
                    let next = rx.lock().await.recv().await;
                    let Some(task) = next else {
                        break;
                    };
                    debug!(worker, filename = %task.filename, "Starting task");
                    let filename = task.filename.clone();
                    let handler = Arc::clone(&handler);
                    match tokio::task::spawn_blocking(move || handler.handle(task)).await {
                        Ok(report) => reports.lock().await.push(report),
                        Err(e) => error!(worker, %filename, "Task panicked: {}", e),
                    }
                }
            });
        }

        while let Some(joined) = workers.join_next().await {
            joined.map_err(|e| SchedulerError::Worker(e.to_string()))?;
        }
        feeder
            .await
            .map_err(|e| SchedulerError::Worker(e.to_string()))?;

        let reports = std::mem::take(&mut *reports.lock().await);
        info!(completed = reports.len(), "Finished processing packages");
        Ok(reports)
    }
}
