//! Test: a failing step ends the run

use crate::helpers::*;
use pipeco::{EngineError, ExecutionEvent, Pipeline, RunContext};
use serde_json::json;
use std::sync::{Arc, Mutex};

/// Later steps never execute once a step raises
#[test]
fn test_failure_stops_later_steps() {
    let pipeline = Pipeline::new(vec![
        instance(add("first")),
        instance(explode("second")),
        instance(add("third")),
        instance(add("fourth")),
    ])
    .unwrap();

    let ctx = RunContext::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let pipeline = pipeline.with_event_handler(move |e| {
        if let ExecutionEvent::StepStarted { step, .. } = e {
            sink.lock().unwrap().push(step.clone());
        }
    });

    let err = pipeline.run_with_context(json!({"n": 1}), ctx).unwrap_err();
    assert_failed_at(&err, "second", 1);
    match &err {
        EngineError::StepExecution { source, .. } => assert_eq!(source.to_string(), "exploded"),
        other => panic!("expected StepExecution, got {:?}", other),
    }

    assert_eq!(*events.lock().unwrap(), vec!["first", "second"]);
}

/// The counter in the context shows exactly how far a run got
#[test]
fn test_counter_shows_executed_steps() {
    let ok = Pipeline::new(vec![instance(add("a")), instance(add("b")), instance(add("c"))]).unwrap();
    let result = ok.run(json!({"n": 0})).unwrap();
    assert_eq!(result.context.counter(EXECUTED), 3);
    assert_eq!(result.output, json!({"n": 3}));
}

/// A step returning a value that breaks its own output schema is caught
#[test]
fn test_bad_output_is_a_step_output_error() {
    let liar = pipeco::StepDefinition::from_fn("liar", number(), number(), no_config(), |_c, _i, _ctx| {
        Ok(json!({ "n": 1.5 }))
    });
    let pipeline = Pipeline::new(vec![instance(add("a")), instance(liar), instance(add("never"))]).unwrap();

    let err = pipeline.run(json!({"n": 0})).unwrap_err();
    assert_failed_at(&err, "liar", 1);
    assert!(matches!(err, EngineError::StepOutput { .. }));
}

/// Invalid pipeline input is rejected before any step runs
#[test]
fn test_invalid_input_is_rejected_up_front() {
    let pipeline = Pipeline::new(vec![instance(add("a"))]).unwrap();
    let err = pipeline.run(json!({"n": "three", "extra": true})).unwrap_err();

    match err {
        EngineError::SchemaValidation(e) => assert_eq!(e.paths(), vec!["n"]),
        other => panic!("expected SchemaValidation, got {:?}", other),
    }
}
