//! Test: incompatible neighbours are rejected when the pipeline is built

use crate::helpers::*;
use pipeco::core::schema::{FieldType, Incompatibility, Schema, UnknownFields};
use pipeco::{EngineError, Pipeline, StepDefinition};

/// A consumer requiring a field the producer lacks cannot follow it
#[test]
fn test_missing_field_rejected() {
    let needs_flag = StepDefinition::from_fn(
        "needs flag",
        Schema::new("Flagged").field("flag", FieldType::Bool),
        number(),
        no_config(),
        |_c, _i, _ctx| unreachable!("never assembled"),
    );

    let err = Pipeline::new(vec![instance(add("a")), instance(needs_flag)]).unwrap_err();
    match err {
        EngineError::PipelineAssembly {
            position,
            producer,
            consumer,
            mismatch,
        } => {
            assert_eq!(position, 0);
            assert_eq!(producer, "a");
            assert_eq!(consumer, "needs flag");
            assert_eq!(mismatch, Incompatibility::MissingField { field: "flag".to_string() });
        }
        other => panic!("expected PipelineAssembly, got {:?}", other),
    }
}

/// The error names both steps and the field the consumer misses
#[test]
fn test_unrelated_schemas_rejected() {
    let err = Pipeline::new(vec![instance(describe("describe")), instance(add("add"))]).unwrap_err();
    assert!(err.to_string().contains("describe"));

    // describe outputs {text}, add wants {n}
    match err {
        EngineError::PipelineAssembly { mismatch, .. } => assert_eq!(mismatch.field(), "n"),
        other => panic!("expected PipelineAssembly, got {:?}", other),
    }
}

/// Same field name, incompatible type
#[test]
fn test_type_mismatch_rejected() {
    let wants_text = StepDefinition::from_fn(
        "wants text",
        Schema::new("Labelled").field("n", FieldType::String),
        number(),
        no_config(),
        |_c, _i, _ctx| unreachable!("never assembled"),
    );

    let err = Pipeline::new(vec![instance(add("add")), instance(wants_text)]).unwrap_err();
    match err {
        EngineError::PipelineAssembly { mismatch, .. } => assert!(matches!(
            mismatch,
            Incompatibility::TypeMismatch { ref field, .. } if field == "n"
        )),
        other => panic!("expected PipelineAssembly, got {:?}", other),
    }
}

/// Integers may feed floats, extra producer fields are fine
#[test]
fn test_structural_subtyping_accepted() {
    let wants_float = StepDefinition::from_fn(
        "halve",
        Schema::new("Real").field("n", FieldType::Float),
        Schema::new("Real").field("n", FieldType::Float),
        no_config(),
        |_c, input, _ctx| {
            let n = input.get("n").and_then(serde_json::Value::as_f64).unwrap_or_default();
            Ok(serde_json::json!({ "n": n / 2.0 }))
        },
    );
    let wide = StepDefinition::from_fn(
        "wide",
        number(),
        number().field("label", FieldType::String),
        no_config(),
        |_c, input, _ctx| {
            Ok(serde_json::json!({ "n": input.get("n").cloned(), "label": "x" }))
        },
    );

    let pipeline = Pipeline::new(vec![instance(wide), instance(wants_float)]).unwrap();
    let result = pipeline.run(serde_json::json!({"n": 3})).unwrap();
    assert_eq!(result.output, serde_json::json!({"n": 1.5}));
}

/// A producer that passes undeclared fields through cannot vouch for their types
#[test]
fn test_pass_through_producer_rejects_typed_optional_field() {
    let chatty = || {
        StepDefinition::from_fn(
            "producer",
            number(),
            number().unknown_fields(UnknownFields::Allow),
            no_config(),
            |_c, _input, _ctx| Ok(serde_json::json!({ "n": 1, "note": 5 })),
        )
    };
    let annotate = |note: FieldType| {
        StepDefinition::from_fn(
            "annotate",
            Schema::new("C").field("n", FieldType::Integer).optional("note", note),
            number(),
            no_config(),
            |_c, input, _ctx| Ok(serde_json::json!({ "n": input.get("n").cloned() })),
        )
    };

    let err = Pipeline::new(vec![instance(chatty()), instance(annotate(FieldType::String))]).unwrap_err();
    match err {
        EngineError::PipelineAssembly {
            position, mismatch, ..
        } => {
            assert_eq!(position, 0);
            assert_eq!(mismatch, Incompatibility::UndeclaredField { field: "note".to_string() });
        }
        other => panic!("expected PipelineAssembly, got {:?}", other),
    }

    // An untyped consumer field takes whatever comes through
    let pipeline = Pipeline::new(vec![instance(chatty()), instance(annotate(FieldType::Any))]).unwrap();
    let result = pipeline.run(serde_json::json!({"n": 0})).unwrap();
    assert_eq!(result.output, serde_json::json!({"n": 1}));
}
