//! Events emitted while a pipeline runs

use crate::core::ExecutionStatus;
use std::sync::Arc;
use uuid::Uuid;

/// Things that happen during a run, delivered in order to every handler
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        pipeline_name: String,
        total_steps: usize,
    },
    StepStarted {
        run_id: Uuid,
        position: usize,
        step: String,
    },
    StepCompleted {
        run_id: Uuid,
        position: usize,
        step: String,
    },
    StepFailed {
        run_id: Uuid,
        position: usize,
        step: String,
        error: String,
    },
    RunFinished {
        run_id: Uuid,
        status: ExecutionStatus,
    },
}

impl ExecutionEvent {
    pub fn run_id(&self) -> Uuid {
        match self {
            ExecutionEvent::RunStarted { run_id, .. }
            | ExecutionEvent::StepStarted { run_id, .. }
            | ExecutionEvent::StepCompleted { run_id, .. }
            | ExecutionEvent::StepFailed { run_id, .. }
            | ExecutionEvent::RunFinished { run_id, .. } => *run_id,
        }
    }
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(&ExecutionEvent) + Send + Sync>;
