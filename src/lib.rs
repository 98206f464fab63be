//! pipeco - typed, composable data-pipeline steps
//!
//! Steps declare input, output and config schemas; pipelines chain them,
//! checking schema compatibility at assembly and validating every boundary
//! while running.

pub mod cli;
pub mod core;
pub mod error;
pub mod execution;
pub mod persistence;
pub mod steps;

// Re-export commonly used types
pub use core::{Pipeline, Registry, RunContext, RunOutput, Schema, FieldType, Record, Step, StepDefinition, StepInstance};
pub use core::registry::{define, get_step, register, register_step};
pub use error::EngineError;
pub use execution::{ExecutionEvent, Interrupted};
