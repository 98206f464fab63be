//! Engine error taxonomy

use crate::core::schema::{Incompatibility, SchemaValidationError};
use thiserror::Error;

/// Errors surfaced by step construction, registry access, assembly and runs
#[derive(Debug, Error)]
pub enum EngineError {
    /// Pipeline input did not match the first step's input schema
    #[error("pipeline input rejected: {0}")]
    SchemaValidation(#[from] SchemaValidationError),

    /// A step was given a configuration its config schema rejects
    #[error("invalid configuration for step '{step}': {source}")]
    ConfigValidation {
        step: String,
        #[source]
        source: SchemaValidationError,
    },

    /// Two adjacent steps cannot be chained
    #[error(
        "step {position} ('{producer}') cannot feed step {} ('{consumer}'): {mismatch}",
        .position + 1
    )]
    PipelineAssembly {
        position: usize,
        producer: String,
        consumer: String,
        #[source]
        mismatch: Incompatibility,
    },

    #[error("a step named '{name}' is already registered")]
    DuplicateRegistration { name: String },

    #[error("no step named '{name}' is registered")]
    UnknownStep { name: String },

    /// The step's own processing logic failed
    #[error("step {position} ('{step}') failed: {source}")]
    StepExecution {
        step: String,
        position: usize,
        #[source]
        source: anyhow::Error,
    },

    /// The step returned a value that breaks its output schema
    #[error("step {position} ('{step}') produced invalid output: {source}")]
    StepOutput {
        step: String,
        position: usize,
        #[source]
        source: SchemaValidationError,
    },
}

impl EngineError {
    /// Label of the step the error is attributed to, if any
    pub fn step_name(&self) -> Option<&str> {
        match self {
            EngineError::ConfigValidation { step, .. }
            | EngineError::StepExecution { step, .. }
            | EngineError::StepOutput { step, .. } => Some(step),
            EngineError::PipelineAssembly { consumer, .. } => Some(consumer),
            _ => None,
        }
    }

    /// Zero-based position of the failing step within its pipeline
    pub fn position(&self) -> Option<usize> {
        match self {
            EngineError::StepExecution { position, .. } | EngineError::StepOutput { position, .. } => {
                Some(*position)
            }
            EngineError::PipelineAssembly { position, .. } => Some(*position),
            _ => None,
        }
    }

    /// Whether the error happened while steps were executing
    pub fn is_run_failure(&self) -> bool {
        matches!(
            self,
            EngineError::StepExecution { .. } | EngineError::StepOutput { .. }
        )
    }
}
