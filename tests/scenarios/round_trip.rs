//! Test: compatible boundaries never fail on their own

use crate::helpers::*;
use pipeco::core::schema::{FieldType, Schema};
use pipeco::{Pipeline, StepDefinition};
use serde_json::json;

/// A producer with extra and defaulted fields feeds a narrower consumer
#[test]
fn test_boundary_accepts_every_valid_input() {
    let producer = StepDefinition::from_fn(
        "producer",
        number(),
        Schema::new("Wide")
            .field("n", FieldType::Integer)
            .field("tags", FieldType::list(FieldType::String))
            .optional("note", FieldType::String),
        no_config(),
        |_c, input, _ctx| {
            let n = input.get("n").cloned().unwrap_or_default();
            Ok(json!({ "n": n, "tags": ["a", "b"] }))
        },
    );
    let consumer = StepDefinition::from_fn(
        "consumer",
        Schema::new("Narrow")
            .field("n", FieldType::Float)
            .optional("note", FieldType::String)
            .with_default("scale", FieldType::Integer, 2),
        Schema::new("Out").field("value", FieldType::Float),
        no_config(),
        |_c, input, _ctx| {
            assert!(!input.contains("tags"), "undeclared fields are dropped at the boundary");
            let n = input.get("n").and_then(serde_json::Value::as_f64).unwrap_or_default();
            let scale = input.get("scale").and_then(serde_json::Value::as_f64).unwrap_or_default();
            Ok(json!({ "value": n * scale }))
        },
    );

    let pipeline = Pipeline::new(vec![instance(producer), instance(consumer)]).unwrap();
    for n in [-3, 0, 7, i64::from(i32::MAX)] {
        let result = pipeline.run(json!({ "n": n })).unwrap();
        assert_eq!(result.output, json!({ "value": (n * 2) as f64 }));
    }
}
