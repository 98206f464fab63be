//! Persistence layer for pipeline run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteExecutionStore;

pub use crate::core::ExecutionStatus;
use crate::core::{Pipeline, RunOutput};
use crate::error::EngineError;
use crate::execution::Interrupted;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Summary of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    /// Run id
    pub execution_id: Uuid,

    /// Pipeline name
    pub pipeline_name: String,

    pub status: ExecutionStatus,

    pub started_at: DateTime<Utc>,

    /// When the run ended
    pub completed_at: Option<DateTime<Utc>>,

    /// Progress (0.0 to 1.0)
    pub progress: f64,

    /// Number of completed steps
    pub completed_steps: usize,

    /// Total number of steps
    pub total_steps: usize,

    /// Label of the step that stopped the run
    pub failed_step: Option<String>,

    /// Error message of a failed run
    pub error: Option<String>,
}

impl ExecutionSummary {
    /// Summarize the outcome of one run of `pipeline`.
    ///
    /// A failed run does not return its context, so the caller supplies the
    /// run id and start time it created the context with.
    pub fn from_run(
        pipeline: &Pipeline,
        execution_id: Uuid,
        started_at: DateTime<Utc>,
        result: &Result<RunOutput, EngineError>,
    ) -> Self {
        let total_steps = pipeline.len();
        let (status, completed_steps, failed_step, error) = match result {
            Ok(run) => (run.context.status(), run.context.completed_steps(), None, None),
            Err(err) => {
                let status = match err {
                    EngineError::StepExecution { source, .. } if source.downcast_ref::<Interrupted>().is_some() => {
                        ExecutionStatus::Cancelled
                    }
                    _ => ExecutionStatus::Failed,
                };
                (
                    status,
                    err.position().unwrap_or(0),
                    err.step_name().map(str::to_string),
                    Some(err.to_string()),
                )
            }
        };

        let completed_at = match result {
            Ok(run) => run.context.finished_at(),
            Err(_) => Some(Utc::now()),
        };

        Self {
            execution_id,
            pipeline_name: pipeline.name().to_string(),
            status,
            started_at,
            completed_at,
            progress: progress(completed_steps, total_steps),
            completed_steps,
            total_steps,
            failed_step,
            error,
        }
    }
}

fn progress(completed: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        completed as f64 / total as f64
    }
}

/// Create a summary from a finished run
pub fn create_summary(pipeline: &Pipeline, run: &RunOutput) -> ExecutionSummary {
    ExecutionSummary {
        execution_id: run.context.run_id(),
        pipeline_name: pipeline.name().to_string(),
        status: run.context.status(),
        started_at: run.context.started_at(),
        completed_at: run.context.finished_at(),
        progress: progress(run.context.completed_steps(), pipeline.len()),
        completed_steps: run.context.completed_steps(),
        total_steps: pipeline.len(),
        failed_step: None,
        error: None,
    }
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a run summary
    async fn save_execution(&self, execution: &ExecutionSummary) -> Result<()>;

    /// Load a run by id
    async fn load_execution(&self, execution_id: Uuid) -> Result<Option<ExecutionSummary>>;

    /// List runs of a pipeline, newest first
    async fn list_executions(&self, pipeline_name: &str) -> Result<Vec<ExecutionSummary>>;

    /// Most recent run of a pipeline
    async fn get_latest_execution(&self, pipeline_name: &str) -> Result<Option<ExecutionSummary>>;

    async fn delete_execution(&self, execution_id: Uuid) -> Result<()>;

    /// List all pipeline names with recorded runs
    async fn list_pipelines(&self) -> Result<Vec<String>>;
}

/// In-memory persistence (for testing or ephemeral use)
pub struct InMemoryPersistence {
    executions: RwLock<HashMap<Uuid, ExecutionSummary>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            executions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_execution(&self, execution: &ExecutionSummary) -> Result<()> {
        let mut execs = self.executions.write().await;
        execs.insert(execution.execution_id, execution.clone());
        Ok(())
    }

    async fn load_execution(&self, execution_id: Uuid) -> Result<Option<ExecutionSummary>> {
        let execs = self.executions.read().await;
        Ok(execs.get(&execution_id).cloned())
    }

    async fn list_executions(&self, pipeline_name: &str) -> Result<Vec<ExecutionSummary>> {
        let execs = self.executions.read().await;
        let mut result: Vec<ExecutionSummary> = execs
            .values()
            .filter(|e| e.pipeline_name == pipeline_name)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(result)
    }

    async fn get_latest_execution(&self, pipeline_name: &str) -> Result<Option<ExecutionSummary>> {
        Ok(self.list_executions(pipeline_name).await?.into_iter().next())
    }

    async fn delete_execution(&self, execution_id: Uuid) -> Result<()> {
        self.executions.write().await.remove(&execution_id);
        Ok(())
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let execs = self.executions.read().await;
        let mut names: Vec<String> = execs.values().map(|e| e.pipeline_name.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}
