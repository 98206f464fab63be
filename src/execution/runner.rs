//! Sequential runner - threads a value and a context through the steps

use crate::core::{ExecutionStatus, Pipeline, RunContext, RunOutput};
use crate::error::EngineError;
use crate::execution::ExecutionEvent;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Cause attached to a `StepExecution` error when a run is interrupted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("run interrupted before the step started")]
pub struct Interrupted;

/// Execute every step of `pipeline` in order.
///
/// Fail-fast: the first failing step ends the run, later steps never execute
/// and no partial output is returned.
pub(crate) fn execute(
    pipeline: &Pipeline,
    input: Value,
    mut ctx: RunContext,
    interrupted: Option<&AtomicBool>,
) -> Result<RunOutput, EngineError> {
    let Some(first) = pipeline.steps().first() else {
        ctx.start(pipeline.name());
        ctx.finish(ExecutionStatus::Completed);
        debug!("Pipeline {} has no steps, passing input through", pipeline.name());
        return Ok(RunOutput { output: input, context: ctx });
    };

    let mut current = first.input_schema().validate(&input).map_err(|e| {
        warn!("Input rejected by pipeline {}: {}", pipeline.name(), e);
        EngineError::SchemaValidation(e)
    })?;

    ctx.start(pipeline.name());
    let run_id = ctx.run_id();
    info!("Starting pipeline run: {} ({})", pipeline.name(), run_id);
    pipeline.emit(ExecutionEvent::RunStarted {
        run_id,
        pipeline_name: pipeline.name().to_string(),
        total_steps: pipeline.len(),
    });

    let steps = pipeline.steps();
    for (position, step) in steps.iter().enumerate() {
        if interrupted.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
            warn!("Run {} interrupted before step {} ({})", run_id, position, step.label());
            let err = EngineError::StepExecution {
                step: step.label().to_string(),
                position,
                source: Interrupted.into(),
            };
            return Err(abort(pipeline, &mut ctx, err, ExecutionStatus::Cancelled));
        }

        ctx.begin_step(position, step.label());
        info!("Executing step {}: {}", position, step.label());
        debug!("Input for step {}: {:?}", step.label(), current);
        pipeline.emit(ExecutionEvent::StepStarted {
            run_id,
            position,
            step: step.label().to_string(),
        });

        let raw = match step.process(current, &mut ctx) {
            Ok(raw) => raw,
            Err(source) => {
                error!("Step {} ({}) failed: {:#}", position, step.label(), source);
                let err = EngineError::StepExecution {
                    step: step.label().to_string(),
                    position,
                    source,
                };
                return Err(abort(pipeline, &mut ctx, err, ExecutionStatus::Failed));
            }
        };

        let produced = match step.output_schema().validate(&raw) {
            Ok(produced) => produced,
            Err(source) => {
                error!("Step {} ({}) broke its output schema: {}", position, step.label(), source);
                let err = EngineError::StepOutput {
                    step: step.label().to_string(),
                    position,
                    source,
                };
                return Err(abort(pipeline, &mut ctx, err, ExecutionStatus::Failed));
            }
        };

        // Hand over to the next step: apply its defaults, drop what it does not declare.
        current = match steps.get(position + 1) {
            None => produced,
            Some(next) => match next.input_schema().conform(&produced.into_value()) {
                Ok(conformed) => conformed,
                Err(source) => {
                    error!(
                        "Output of step {} ({}) does not fit step {} ({}): {}",
                        position,
                        step.label(),
                        position + 1,
                        next.label(),
                        source
                    );
                    let err = EngineError::StepOutput {
                        step: step.label().to_string(),
                        position,
                        source,
                    };
                    return Err(abort(pipeline, &mut ctx, err, ExecutionStatus::Failed));
                }
            },
        };

        ctx.complete_step();
        pipeline.emit(ExecutionEvent::StepCompleted {
            run_id,
            position,
            step: step.label().to_string(),
        });
    }

    ctx.finish(ExecutionStatus::Completed);
    info!("Pipeline run finished: {} ({})", pipeline.name(), run_id);
    pipeline.emit(ExecutionEvent::RunFinished {
        run_id,
        status: ExecutionStatus::Completed,
    });

    Ok(RunOutput {
        output: current.into_value(),
        context: ctx,
    })
}

fn abort(pipeline: &Pipeline, ctx: &mut RunContext, err: EngineError, status: ExecutionStatus) -> EngineError {
    let run_id = ctx.run_id();
    ctx.fail_step(err.to_string());
    ctx.finish(status);

    if let (Some(step), Some(position)) = (err.step_name(), err.position()) {
        pipeline.emit(ExecutionEvent::StepFailed {
            run_id,
            position,
            step: step.to_string(),
            error: err.to_string(),
        });
    }
    pipeline.emit(ExecutionEvent::RunFinished { run_id, status });
    err
}
