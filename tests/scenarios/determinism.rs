//! Test: repeated and concurrent runs agree

use crate::helpers::*;
use pipeco::Pipeline;
use serde_json::json;
use std::sync::Arc;
use std::thread;

#[test]
fn test_same_input_same_output() {
    let pipeline = Pipeline::new(vec![instance(add("a")), instance(add("b")), instance(describe("c"))]).unwrap();

    let first = pipeline.run(json!({"n": 40})).unwrap();
    let second = pipeline.run(json!({"n": 40})).unwrap();

    assert_eq!(first.output, second.output);
    assert_eq!(first.output, json!({"text": "n is 42"}));
    assert_ne!(first.context.run_id(), second.context.run_id());
}

/// Each run has its own context, so runs on other threads do not interfere
#[test]
fn test_concurrent_runs() {
    let pipeline = Arc::new(Pipeline::new(vec![instance(add("a")), instance(add("b"))]).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let pipeline = Arc::clone(&pipeline);
            thread::spawn(move || pipeline.run(json!({ "n": i })).unwrap())
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.join().unwrap();
        assert_eq!(result.output, json!({ "n": i + 2 }));
        assert_eq!(result.context.counter(EXECUTED), 2);
    }
}
