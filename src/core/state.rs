//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Run has not started
    Pending,
    /// Steps are executing
    Running,
    /// Every step completed
    Completed,
    /// A step failed; no output was produced
    Failed,
    /// The run was interrupted between steps
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionStatus::Pending => "Pending",
            ExecutionStatus::Running => "Running",
            ExecutionStatus::Completed => "Completed",
            ExecutionStatus::Failed => "Failed",
            ExecutionStatus::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(ExecutionStatus::Pending),
            "Running" => Ok(ExecutionStatus::Running),
            "Completed" => Ok(ExecutionStatus::Completed),
            "Failed" => Ok(ExecutionStatus::Failed),
            "Cancelled" => Ok(ExecutionStatus::Cancelled),
            other => Err(format!("unknown execution status: {}", other)),
        }
    }
}

/// State of a single step within one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepState {
    Running {
        started_at: DateTime<Utc>,
    },
    Completed {
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    Failed {
        error: String,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    },
}

impl StepState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StepState::Running { .. })
    }
}

/// What happened to one step during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Zero-based position in the pipeline
    pub position: usize,

    /// Step label (definition name unless relabeled)
    pub label: String,

    pub state: StepState,
}

impl StepRecord {
    pub fn started(position: usize, label: impl Into<String>) -> Self {
        Self {
            position,
            label: label.into(),
            state: StepState::Running {
                started_at: Utc::now(),
            },
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        match &self.state {
            StepState::Running { started_at }
            | StepState::Completed { started_at, .. }
            | StepState::Failed { started_at, .. } => *started_at,
        }
    }

    pub(crate) fn complete(&mut self) {
        self.state = StepState::Completed {
            started_at: self.started_at(),
            completed_at: Utc::now(),
        };
    }

    pub(crate) fn fail(&mut self, error: String) {
        self.state = StepState::Failed {
            error,
            started_at: self.started_at(),
            failed_at: Utc::now(),
        };
    }
}
