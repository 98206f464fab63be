//! Test utility functions for pipeco scenarios

use pipeco::core::schema::{FieldType, Schema};
use pipeco::{EngineError, StepDefinition, StepInstance};
use serde_json::{json, Value};
use std::sync::Arc;

/// Counter bumped by every step built here
pub const EXECUTED: &str = "executed";

pub fn number() -> Schema {
    Schema::new("Number").field("n", FieldType::Integer)
}

pub fn text() -> Schema {
    Schema::new("Text").field("text", FieldType::String)
}

pub fn no_config() -> Schema {
    Schema::new("NoConfig")
}

pub fn instance(def: StepDefinition) -> StepInstance {
    StepInstance::new(Arc::new(def), None).unwrap()
}

/// `n -> n + by`, where `by` comes from the config (default 1)
pub fn add(name: &str) -> StepDefinition {
    StepDefinition::from_fn(
        name,
        number(),
        number(),
        Schema::new("AddConfig").with_default("by", FieldType::Integer, 1),
        |config, input, ctx| {
            ctx.increment(EXECUTED);
            let by = config.get("by").and_then(Value::as_i64).unwrap_or_default();
            let n = input.get("n").and_then(Value::as_i64).unwrap_or_default();
            Ok(json!({ "n": n + by }))
        },
    )
}

/// `n -> text`
pub fn describe(name: &str) -> StepDefinition {
    StepDefinition::from_fn(name, number(), text(), no_config(), |_c, input, ctx| {
        ctx.increment(EXECUTED);
        let n = input.get("n").and_then(Value::as_i64).unwrap_or_default();
        Ok(json!({ "text": format!("n is {}", n), "n": n }))
    })
}

/// Always fails
pub fn explode(name: &str) -> StepDefinition {
    StepDefinition::from_fn(name, number(), number(), no_config(), |_c, _input, ctx| {
        ctx.increment(EXECUTED);
        anyhow::bail!("exploded")
    })
}

/// Assert `err` is a run failure attributed to `step` at `position`
pub fn assert_failed_at(err: &EngineError, step: &str, position: usize) {
    assert!(err.is_run_failure(), "expected a run failure, got {:?}", err);
    assert_eq!(err.step_name(), Some(step));
    assert_eq!(err.position(), Some(position));
}
