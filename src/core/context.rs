//! Run context - shared state for one pipeline execution

use crate::core::state::{ExecutionStatus, StepRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Mutable state scoped to a single run.
///
/// Every step of the run receives the same context. Bookkeeping (run id,
/// timestamps, per-step records) is maintained by the engine; steps read it
/// and write to the metadata map, counters and notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    run_id: Uuid,
    pipeline_name: Option<String>,
    status: ExecutionStatus,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    steps: Vec<StepRecord>,

    /// Notes left by steps for later steps or for the caller
    pub notes: Vec<ContextNote>,

    /// Free-form run metadata
    pub metadata: Map<String, Value>,
}

/// A note written by a step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextNote {
    pub content: String,

    /// Which step created this note
    pub from_step: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl RunContext {
    /// Create a fresh context with a new run id
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            pipeline_name: None,
            status: ExecutionStatus::Pending,
            started_at: Utc::now(),
            finished_at: None,
            steps: Vec::new(),
            notes: Vec::new(),
            metadata: Map::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn pipeline_name(&self) -> Option<&str> {
        self.pipeline_name.as_deref()
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Records of the steps executed so far, in order
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// The step currently executing, if any
    pub fn current_step(&self) -> Option<&StepRecord> {
        self.steps.last().filter(|record| !record.state.is_terminal())
    }

    pub fn completed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|record| matches!(record.state, crate::core::state::StepState::Completed { .. }))
            .count()
    }

    /// Set a metadata entry
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Get a metadata entry
    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Increment a counter stored in the metadata map, returning the new value
    pub fn increment(&mut self, key: &str) -> i64 {
        let next = self.counter(key) + 1;
        self.metadata.insert(key.to_string(), Value::from(next));
        next
    }

    /// Current value of a counter (zero when unset or not an integer)
    pub fn counter(&self, key: &str) -> i64 {
        self.metadata.get(key).and_then(Value::as_i64).unwrap_or(0)
    }

    /// Add a note attributed to the current step
    pub fn add_note(&mut self, content: impl Into<String>) {
        let from_step = self.current_step().map(|record| record.label.clone());
        self.notes.push(ContextNote {
            content: content.into(),
            from_step,
            timestamp: Utc::now(),
        });
    }

    /// Get all notes as a numbered list
    pub fn format_notes(&self) -> String {
        self.notes
            .iter()
            .enumerate()
            .map(|(i, note)| match &note.from_step {
                Some(step) => format!("{}. [from {}] {}\n", i + 1, step, note.content),
                None => format!("{}. {}\n", i + 1, note.content),
            })
            .collect()
    }

    pub(crate) fn start(&mut self, pipeline_name: &str) {
        self.pipeline_name = Some(pipeline_name.to_string());
        self.status = ExecutionStatus::Running;
        self.finished_at = None;
    }

    pub(crate) fn begin_step(&mut self, position: usize, label: &str) {
        self.steps.push(StepRecord::started(position, label));
    }

    pub(crate) fn complete_step(&mut self) {
        if let Some(record) = self.steps.last_mut() {
            record.complete();
        }
    }

    pub(crate) fn fail_step(&mut self, error: String) {
        if let Some(record) = self.steps.last_mut().filter(|r| !r.state.is_terminal()) {
            record.fail(error);
        }
    }

    pub(crate) fn finish(&mut self, status: ExecutionStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
