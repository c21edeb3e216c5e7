//! Background download and engine-build tasks.
//!
//! A task runs on its own tokio task and talks to the caller only through a
//! channel: any number of [`TaskEvent::Output`] / [`TaskEvent::Transfer`]
//! events followed by exactly one [`TaskEvent::Finished`]. Tasks cannot be
//! cancelled once started.

pub mod download;
pub mod export;

use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use crate::config::CompilerConfig;
use crate::downloaders::WeightFetcher;
use crate::models::Precision;
use crate::store::WeightStore;

pub use export::BuildRequest;

#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    Output(String),
    Transfer { downloaded: u64, total: Option<u64> },
    Finished(TaskOutcome),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Download {
        success: bool,
        message: String,
    },
    Build {
        success: bool,
        model: String,
        precision: Precision,
        message: String,
    },
}

impl TaskOutcome {
    pub fn success(&self) -> bool {
        match self {
            TaskOutcome::Download { success, .. } | TaskOutcome::Build { success, .. } => *success,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            TaskOutcome::Download { message, .. } | TaskOutcome::Build { message, .. } => message,
        }
    }
}

/// Sending half handed to running tasks and fetchers.
#[derive(Debug, Clone)]
pub struct Progress {
    tx: UnboundedSender<TaskEvent>,
}

impl Progress {
    pub fn channel() -> (Self, UnboundedReceiver<TaskEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn line(&self, text: impl Into<String>) {
        self.send(TaskEvent::Output(text.into()));
    }

    pub fn transfer(&self, downloaded: u64, total: Option<u64>) {
        self.send(TaskEvent::Transfer { downloaded, total });
    }

    fn finish(&self, outcome: TaskOutcome) {
        self.send(TaskEvent::Finished(outcome));
    }

    fn send(&self, event: TaskEvent) {
        // The receiver going away only means nobody is watching any more.
        let _ = self.tx.send(event);
    }
}

/// What the user asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskRequest {
    Download {
        model: String,
    },
    Build {
        model: String,
        precision: Precision,
        calibration: Option<PathBuf>,
    },
}

impl TaskRequest {
    pub fn describe(&self) -> String {
        match self {
            TaskRequest::Download { model } => format!("Starting model download for {}...", model),
            TaskRequest::Build {
                model, precision, ..
            } => format!(
                "Starting engine build for {} with precision {}...",
                model, precision
            ),
        }
    }

    /// Outcome reported if the task dies without producing one.
    fn crashed(&self, message: String) -> TaskOutcome {
        match self {
            TaskRequest::Download { .. } => TaskOutcome::Download {
                success: false,
                message,
            },
            TaskRequest::Build {
                model, precision, ..
            } => TaskOutcome::Build {
                success: false,
                model: model.clone(),
                precision: *precision,
                message,
            },
        }
    }
}

/// Receiving side of a spawned task.
pub struct TaskHandle {
    events: UnboundedReceiver<TaskEvent>,
}

impl TaskHandle {
    /// Non-blocking poll used by the UI tick.
    pub fn try_recv(&mut self) -> Option<TaskEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Drain events until the terminal outcome, passing each one to `on_event`.
    pub async fn wait<F>(mut self, mut on_event: F) -> Option<TaskOutcome>
    where
        F: FnMut(&TaskEvent),
    {
        while let Some(event) = self.events.recv().await {
            on_event(&event);
            if let TaskEvent::Finished(outcome) = event {
                return Some(outcome);
            }
        }
        None
    }
}

/// Spawns tasks with the shared collaborators they need.
#[derive(Clone)]
pub struct TaskRunner {
    store: WeightStore,
    fetcher: Arc<dyn WeightFetcher>,
    compiler: CompilerConfig,
}

impl TaskRunner {
    pub fn new(store: WeightStore, fetcher: Arc<dyn WeightFetcher>, compiler: CompilerConfig) -> Self {
        Self {
            store,
            fetcher,
            compiler,
        }
    }

    pub fn store(&self) -> &WeightStore {
        &self.store
    }

    pub fn spawn(&self, request: TaskRequest) -> TaskHandle {
        tracing::info!("{}", request.describe());
        match request.clone() {
            TaskRequest::Download { model } => {
                let store = self.store.clone();
                let fetcher = Arc::clone(&self.fetcher);
                spawn_task(request, move |progress| async move {
                    download::run(&store, fetcher.as_ref(), &model, &progress).await
                })
            }
            TaskRequest::Build {
                model,
                precision,
                calibration,
            } => {
                let store = self.store.clone();
                let compiler = self.compiler.clone();
                let build = BuildRequest {
                    model,
                    precision,
                    device: compiler.device.clone(),
                    calibration,
                };
                spawn_task(request, move |progress| async move {
                    export::run(&store, &compiler, &build, &progress).await
                })
            }
        }
    }
}

fn spawn_task<F, Fut>(request: TaskRequest, task: F) -> TaskHandle
where
    F: FnOnce(Progress) -> Fut + Send + 'static,
    Fut: Future<Output = TaskOutcome> + Send + 'static,
{
    let (progress, events) = Progress::channel();
    tokio::spawn(async move {
        let outcome = match AssertUnwindSafe(task(progress.clone())).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<String>()
                    .cloned()
                    .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
                    .unwrap_or_else(|| "task panicked".to_string());
                tracing::error!("Task crashed: {}", message);
                progress.line(format!("An unexpected error occurred: {}", message));
                request.crashed(message)
            }
        };
        tracing::info!(
            "Task finished ({}): {}",
            if outcome.success() { "ok" } else { "failed" },
            outcome.message()
        );
        progress.finish(outcome);
    });
    TaskHandle { events }
}
