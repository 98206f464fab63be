//! Core domain models for pipelines
//!
//! This module defines schemas, steps, the step registry, the run context
//! and the pipeline itself.

pub mod config;
pub mod context;
pub mod pipeline;
pub mod registry;
pub mod schema;
pub mod state;
pub mod step;

pub use context::*;
pub use pipeline::*;
pub use registry::Registry;
pub use schema::{compatible, FieldType, Record, Schema, SchemaValidationError, UnknownFields};
pub use state::*;
pub use step::*;
