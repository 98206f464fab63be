//! Test: step configuration is checked when the step is built

use crate::helpers::*;
use pipeco::core::schema::{FieldType, Schema};
use pipeco::{EngineError, Pipeline, Registry, StepInstance};
use serde_json::{json, Value};
use std::sync::Arc;

fn scale_registry() -> Registry {
    let registry = Registry::new();
    registry
        .define(
            "scale",
            number(),
            number(),
            Schema::new("ScaleConfig").field("factor", FieldType::Integer),
            |config, input, _ctx| {
                let factor = config.get("factor").and_then(Value::as_i64).unwrap_or_default();
                let n = input.get("n").and_then(Value::as_i64).unwrap_or_default();
                Ok(json!({ "n": n * factor }))
            },
        )
        .unwrap();
    registry
}

/// Missing required config field fails before any pipeline exists
#[test]
fn test_missing_required_config() {
    let registry = scale_registry();

    for raw in [None, Some(json!({}))] {
        let err = registry.instantiate("scale", raw).unwrap_err();
        match err {
            EngineError::ConfigValidation { step, source } => {
                assert_eq!(step, "scale");
                assert_eq!(source.paths(), vec!["factor"]);
            }
            other => panic!("expected ConfigValidation, got {:?}", other),
        }
    }
}

/// Defaults make a config optional
#[test]
fn test_defaults_fill_missing_config() {
    let step = StepInstance::new(Arc::new(add("add")), None).unwrap();
    assert_eq!(step.config().get("by"), Some(&json!(1)));

    let step = StepInstance::new(Arc::new(add("add")), Some(json!({"by": 5}))).unwrap();
    let result = Pipeline::new(vec![step]).unwrap().run(json!({"n": 1})).unwrap();
    assert_eq!(result.output, json!({"n": 6}));
}

/// A valid config flows into processing
#[test]
fn test_instantiated_step_runs_with_its_config() {
    let registry = scale_registry();
    let scale = registry.instantiate("scale", Some(json!({"factor": 4}))).unwrap();
    let pipeline = Pipeline::new(vec![scale, instance(add("add"))]).unwrap();
    assert_eq!(pipeline.run(json!({"n": 2})).unwrap().output, json!({"n": 9}));
}
