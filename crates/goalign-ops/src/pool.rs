//! Bounded worker pool running rewrite tasks.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use goalign_core::{
    DEFAULT_MAX_CONCURRENCY, DEFAULT_PASSES, OptimizeTask, PipelineConfig, RunResult, TaskFailure,
    TaskOutcome, TaskStatus,
};

use crate::rewrite::Rewriter;

/// Runs rewrite tasks with at most `max_concurrency` in flight.
///
/// Tasks are received from a channel, so the pool can start working while
/// the scanner is still walking the tree. Every received task produces
/// exactly one [`TaskOutcome`].
pub struct WorkerPool {
    rewriter: Arc<Rewriter>,
    max_concurrency: usize,
    passes: usize,
    cancel_on_failure: bool,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Create a pool using the limits of a pipeline configuration.
    pub fn new(rewriter: Rewriter, config: &PipelineConfig) -> Self {
        Self::with_limits(rewriter, config.max_concurrency, config.passes)
            .cancel_on_failure(config.cancel_on_failure)
    }

    /// Create a pool with explicit limits. Zero values fall back to the defaults.
    pub fn with_limits(rewriter: Rewriter, max_concurrency: usize, passes: usize) -> Self {
        Self {
            rewriter: Arc::new(rewriter),
            max_concurrency: if max_concurrency == 0 {
                DEFAULT_MAX_CONCURRENCY
            } else {
                max_concurrency
            },
            passes: if passes == 0 { DEFAULT_PASSES } else { passes },
            cancel_on_failure: true,
            cancel: CancellationToken::new(),
        }
    }

    /// Set whether the first failure stops dispatching.
    pub fn cancel_on_failure(mut self, enabled: bool) -> Self {
        self.cancel_on_failure = enabled;
        self
    }

    /// Token cancelled when the run starts failing.
    ///
    /// Hand a clone to the scanner so it stops producing; cancelling it from
    /// outside stops dispatching as well.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Maximum number of tasks in flight.
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Rewriter passes per task.
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Consume tasks until the channel closes and wait for all of them.
    ///
    /// Outcomes list skipped tasks first, then dispatched tasks in dispatch
    /// order.
    pub async fn run(&self, mut tasks: mpsc::Receiver<OptimizeTask>) -> RunResult {
        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let first_failure: Arc<OnceLock<TaskFailure>> = Arc::new(OnceLock::new());

        let mut skipped = Vec::new();
        let mut running: Vec<(PathBuf, JoinHandle<TaskOutcome>)> = Vec::new();

        while let Some(task) = tasks.recv().await {
            if self.cancel.is_cancelled() {
                skipped.push(skipped_outcome(task));
                continue;
            }

            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                skipped.push(skipped_outcome(task));
                continue;
            };

            let worker = Worker {
                rewriter: Arc::clone(&self.rewriter),
                passes: self.passes,
                first_failure: Arc::clone(&first_failure),
                cancel: self.cancel_on_failure.then(|| self.cancel.clone()),
            };
            let dir = task.dir.clone();
            tracing::debug!(dir = %dir.display(), "dispatching rewrite");
            let handle = tokio::spawn(async move {
                let _permit = permit;
                worker.run(task).await
            });
            running.push((dir, handle));
        }

        if !skipped.is_empty() {
            tracing::warn!(count = skipped.len(), "skipped packages after failure");
        }

        let mut outcomes = skipped;
        for (dir, handle) in running {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    let failure = TaskFailure::worker_lost(&dir, format!("worker stopped: {err}"));
                    tracing::error!(dir = %dir.display(), "{failure}");
                    let _ = first_failure.set(failure.clone());
                    if self.cancel_on_failure {
                        self.cancel.cancel();
                    }
                    TaskOutcome {
                        dir,
                        status: TaskStatus::Failed(failure),
                        elapsed: Duration::ZERO,
                    }
                }
            };
            outcomes.push(outcome);
        }

        RunResult {
            outcomes,
            first_failure: first_failure.get().cloned(),
            elapsed: started.elapsed(),
        }
    }
}

fn skipped_outcome(task: OptimizeTask) -> TaskOutcome {
    tracing::debug!(dir = %task.dir.display(), "not dispatched");
    TaskOutcome {
        dir: task.dir,
        status: TaskStatus::Skipped,
        elapsed: Duration::ZERO,
    }
}

/// State handed to one spawned task.
struct Worker {
    rewriter: Arc<Rewriter>,
    passes: usize,
    first_failure: Arc<OnceLock<TaskFailure>>,
    cancel: Option<CancellationToken>,
}

impl Worker {
    async fn run(self, task: OptimizeTask) -> TaskOutcome {
        let started = Instant::now();

        for pass in 1..=self.passes {
            tracing::debug!(
                dir = %task.dir.display(),
                pass,
                "{}",
                self.rewriter.command_line(&task)
            );

            match self.rewriter.apply(&task).await {
                Ok(output) => {
                    let output = output.trim();
                    if !output.is_empty() {
                        tracing::debug!(dir = %task.dir.display(), pass, "{output}");
                    }
                }
                Err(err) => {
                    let failure = TaskFailure::from_command(&task.dir, pass, &err);
                    tracing::error!(dir = %task.dir.display(), pass, "{err}");
                    let _ = self.first_failure.set(failure.clone());
                    if let Some(cancel) = &self.cancel {
                        cancel.cancel();
                    }
                    return TaskOutcome {
                        dir: task.dir,
                        status: TaskStatus::Failed(failure),
                        elapsed: started.elapsed(),
                    };
                }
            }
        }

        tracing::info!(dir = %task.dir.display(), passes = self.passes, "rewrote package");
        TaskOutcome {
            dir: task.dir,
            status: TaskStatus::Succeeded {
                passes: self.passes,
            },
            elapsed: started.elapsed(),
        }
    }
}
