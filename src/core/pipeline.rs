//! Pipeline domain model

use crate::core::context::RunContext;
use crate::core::schema::check_compatible;
use crate::core::step::StepInstance;
use crate::error::EngineError;
use crate::execution::{runner, EventHandler, ExecutionEvent};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

/// Default name for pipelines built without one
pub const DEFAULT_PIPELINE_NAME: &str = "pipeline";

/// An ordered, schema-checked sequence of step instances.
///
/// The sequence is fixed at assembly; build a new pipeline to change it.
/// A pipeline can be run any number of times, including concurrently, since
/// every run gets its own [`RunContext`].
pub struct Pipeline {
    name: String,
    steps: Vec<StepInstance>,
    handlers: Vec<EventHandler>,
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Final value, validated against the last step's output schema
    pub output: Value,

    /// Context as left by the last step
    pub context: RunContext,
}

impl Pipeline {
    /// Assemble a pipeline, checking every adjacent pair of steps
    pub fn new(steps: Vec<StepInstance>) -> Result<Self, EngineError> {
        Self::named(DEFAULT_PIPELINE_NAME, steps)
    }

    /// Assemble a named pipeline
    pub fn named(name: impl Into<String>, steps: Vec<StepInstance>) -> Result<Self, EngineError> {
        let name = name.into();
        Self::check_adjacency(&steps)?;

        info!("Assembled pipeline {} with {} steps", name, steps.len());
        Ok(Self {
            name,
            steps,
            handlers: Vec::new(),
        })
    }

    fn check_adjacency(steps: &[StepInstance]) -> Result<(), EngineError> {
        for (position, pair) in steps.windows(2).enumerate() {
            let (producer, consumer) = (&pair[0], &pair[1]);
            if let Err(mismatch) = check_compatible(producer.output_schema(), consumer.input_schema()) {
                warn!(
                    "Step {} ({}) cannot feed step {} ({}): {}",
                    position,
                    producer.label(),
                    position + 1,
                    consumer.label(),
                    mismatch
                );
                return Err(EngineError::PipelineAssembly {
                    position,
                    producer: producer.label().to_string(),
                    consumer: consumer.label().to_string(),
                    mismatch,
                });
            }
        }
        Ok(())
    }

    /// Add an event handler
    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ExecutionEvent) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[StepInstance] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run the pipeline on `input` with a fresh context.
    ///
    /// An empty pipeline returns `input` unchanged without validating it.
    pub fn run(&self, input: Value) -> Result<RunOutput, EngineError> {
        self.run_with_context(input, RunContext::new())
    }

    /// Run with a caller-created context (useful to know the run id up front).
    ///
    /// The context must not be shared with another run.
    pub fn run_with_context(&self, input: Value, ctx: RunContext) -> Result<RunOutput, EngineError> {
        runner::execute(self, input, ctx, None)
    }

    /// Run, checking `interrupted` before each step.
    ///
    /// When the flag is set the run stops with a `StepExecution` error naming
    /// the step that was about to start.
    pub fn run_interruptible(
        &self,
        input: Value,
        ctx: RunContext,
        interrupted: &AtomicBool,
    ) -> Result<RunOutput, EngineError> {
        runner::execute(self, input, ctx, Some(interrupted))
    }

    pub(crate) fn emit(&self, event: ExecutionEvent) {
        for handler in &self.handlers {
            handler(&event);
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("steps", &self.steps)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
