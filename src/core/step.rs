//! Step domain model
//!
//! A step is declared once as a [`StepDefinition`]: a unique name, three
//! schemas (input, output, config) and a factory for its processing logic.
//! Binding a definition to a validated configuration yields a
//! [`StepInstance`], which is what pipelines hold and execute.
//!
//! Steps can be written either as a type implementing [`Step`] (typed input,
//! output and config) or as a closure over validated [`Record`]s with
//! [`StepDefinition::from_fn`].

use crate::core::context::RunContext;
use crate::core::schema::{Record, Schema, SchemaValidationError};
use crate::error::EngineError;
use anyhow::Context;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// A typed step.
///
/// The schemas describe the JSON shape of `Input`, `Output` and `Config`; the
/// engine validates against them and then hands the step deserialized values.
pub trait Step: Send + Sync + Sized + 'static {
    /// Registry name
    const NAME: &'static str;

    type Input: DeserializeOwned;
    type Output: Serialize;
    type Config: DeserializeOwned;

    fn input_schema() -> Schema;
    fn output_schema() -> Schema;
    fn config_schema() -> Schema;

    /// Build the step from an already validated configuration
    fn new(config: Self::Config) -> Self;

    /// Transform one input into one output.
    ///
    /// Errors abort the run and are reported as `StepExecution`.
    fn process(&self, input: Self::Input, ctx: &mut RunContext) -> anyhow::Result<Self::Output>;
}

/// Object-safe processing facet shared by every step flavour
pub trait Processor: Send + Sync {
    fn process(&self, input: Record, ctx: &mut RunContext) -> anyhow::Result<Value>;
}

/// Processing function of a closure step: `(config, input, ctx) -> output`
pub type ProcessFn = dyn Fn(&Record, Record, &mut RunContext) -> anyhow::Result<Value> + Send + Sync;

type Factory = dyn Fn(&Record) -> Result<Box<dyn Processor>, SchemaValidationError> + Send + Sync;

struct Typed<S>(S);

impl<S: Step> Processor for Typed<S> {
    fn process(&self, input: Record, ctx: &mut RunContext) -> anyhow::Result<Value> {
        let input: S::Input = input
            .parse()
            .with_context(|| format!("input does not fit the Rust type of step '{}'", S::NAME))?;
        let output = self.0.process(input, ctx)?;
        serde_json::to_value(output).context("failed to serialize step output")
    }
}

struct Closure {
    config: Record,
    f: Arc<ProcessFn>,
}

impl Processor for Closure {
    fn process(&self, input: Record, ctx: &mut RunContext) -> anyhow::Result<Value> {
        (self.f)(&self.config, input, ctx)
    }
}

/// Named step with its three schemas
pub struct StepDefinition {
    name: String,
    input_schema: Schema,
    output_schema: Schema,
    config_schema: Schema,
    factory: Box<Factory>,
}

impl StepDefinition {
    /// Definition of a typed step
    pub fn of<S: Step>() -> Self {
        let config_schema = S::config_schema();
        let schema_name = config_schema.name().to_string();

        Self {
            name: S::NAME.to_string(),
            input_schema: S::input_schema(),
            output_schema: S::output_schema(),
            config_schema,
            factory: Box::new(move |config: &Record| {
                let typed: S::Config = config
                    .parse()
                    .map_err(|e| SchemaValidationError::invalid(schema_name.clone(), e.to_string()))?;
                Ok(Box::new(Typed(S::new(typed))) as Box<dyn Processor>)
            }),
        }
    }

    /// Definition of a closure step.
    ///
    /// `f` receives the instance's validated config, the validated input and
    /// the run context, and returns a value that must satisfy `output`.
    pub fn from_fn<F>(name: impl Into<String>, input: Schema, output: Schema, config: Schema, f: F) -> Self
    where
        F: Fn(&Record, Record, &mut RunContext) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let f: Arc<ProcessFn> = Arc::new(f);
        Self {
            name: name.into(),
            input_schema: input,
            output_schema: output,
            config_schema: config,
            factory: Box::new(move |config: &Record| {
                Ok(Box::new(Closure {
                    config: config.clone(),
                    f: Arc::clone(&f),
                }) as Box<dyn Processor>)
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_schema(&self) -> &Schema {
        &self.input_schema
    }

    pub fn output_schema(&self) -> &Schema {
        &self.output_schema
    }

    pub fn config_schema(&self) -> &Schema {
        &self.config_schema
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("name", &self.name)
            .field("input_schema", &self.input_schema.name())
            .field("output_schema", &self.output_schema.name())
            .field("config_schema", &self.config_schema.name())
            .finish_non_exhaustive()
    }
}

impl Serialize for StepDefinition {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("StepDefinition", 4)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("input", &self.input_schema)?;
        state.serialize_field("output", &self.output_schema)?;
        state.serialize_field("config", &self.config_schema)?;
        state.end()
    }
}

/// A step definition bound to a validated configuration
pub struct StepInstance {
    definition: Arc<StepDefinition>,
    label: String,
    config: Record,
    processor: Box<dyn Processor>,
}

impl StepInstance {
    /// Bind `definition` to `raw_config`.
    ///
    /// A missing configuration is treated as an empty mapping, so steps whose
    /// config schema has no required fields construct with defaults.
    pub fn new(definition: Arc<StepDefinition>, raw_config: Option<Value>) -> Result<Self, EngineError> {
        let raw_config = raw_config.unwrap_or_else(|| Value::Object(Map::new()));
        let reject = |source: SchemaValidationError| {
            warn!("Rejected configuration for step {}: {}", definition.name, source);
            EngineError::ConfigValidation {
                step: definition.name.clone(),
                source,
            }
        };

        let config = definition.config_schema.validate(&raw_config).map_err(reject)?;
        let processor = (definition.factory)(&config).map_err(reject)?;
        debug!("Instantiated step {} with config {:?}", definition.name, config);

        Ok(Self {
            label: definition.name.clone(),
            definition,
            config,
            processor,
        })
    }

    /// Instantiate a typed step without going through a registry
    pub fn of<S: Step>(raw_config: Option<Value>) -> Result<Self, EngineError> {
        Self::new(Arc::new(StepDefinition::of::<S>()), raw_config)
    }

    /// Give the instance its own label for diagnostics
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn config(&self) -> &Record {
        &self.config
    }

    pub fn definition(&self) -> &StepDefinition {
        &self.definition
    }

    pub fn input_schema(&self) -> &Schema {
        self.definition.input_schema()
    }

    pub fn output_schema(&self) -> &Schema {
        self.definition.output_schema()
    }

    pub(crate) fn process(&self, input: Record, ctx: &mut RunContext) -> anyhow::Result<Value> {
        self.processor.process(input, ctx)
    }
}

impl fmt::Debug for StepInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepInstance")
            .field("name", &self.definition.name)
            .field("label", &self.label)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::FieldType;
    use serde::Deserialize;
    use serde_json::json;

    struct Greet {
        greeting: String,
    }

    #[derive(Deserialize)]
    struct GreetConfig {
        greeting: String,
        #[allow(dead_code)]
        shout: bool,
    }

    #[derive(Deserialize)]
    struct Name {
        name: String,
    }

    #[derive(Serialize)]
    struct Message {
        message: String,
    }

    impl Step for Greet {
        const NAME: &'static str = "greet";
        type Input = Name;
        type Output = Message;
        type Config = GreetConfig;

        fn input_schema() -> Schema {
            Schema::new("Name").field("name", FieldType::String)
        }

        fn output_schema() -> Schema {
            Schema::new("Message").field("message", FieldType::String)
        }

        fn config_schema() -> Schema {
            Schema::new("GreetConfig")
                .field("greeting", FieldType::String)
                .with_default("shout", FieldType::Bool, false)
        }

        fn new(config: GreetConfig) -> Self {
            Greet {
                greeting: config.greeting,
            }
        }

        fn process(&self, input: Name, ctx: &mut RunContext) -> anyhow::Result<Message> {
            ctx.increment("greetings");
            Ok(Message {
                message: format!("{}, {}", self.greeting, input.name),
            })
        }
    }

    #[test]
    fn test_typed_step_processes_records() {
        let step = StepInstance::of::<Greet>(Some(json!({"greeting": "Hello"}))).unwrap();
        assert_eq!(step.name(), "greet");
        assert_eq!(step.config().get_bool("shout"), Some(false));

        let mut ctx = RunContext::new();
        let input = Greet::input_schema().validate(&json!({"name": "Ada"})).unwrap();
        let output = step.process(input, &mut ctx).unwrap();

        assert_eq!(output, json!({"message": "Hello, Ada"}));
        assert_eq!(ctx.counter("greetings"), 1);
    }

    #[test]
    fn test_missing_required_config_is_rejected() {
        let err = StepInstance::of::<Greet>(None).unwrap_err();
        match err {
            EngineError::ConfigValidation { step, source } => {
                assert_eq!(step, "greet");
                assert_eq!(source.paths(), vec!["greeting"]);
            }
            other => panic!("expected ConfigValidation, got {:?}", other),
        }
    }

    #[test]
    fn test_config_without_required_fields_uses_defaults() {
        let def = StepDefinition::from_fn(
            "pad",
            Schema::new("In").field("text", FieldType::String),
            Schema::new("Out").field("text", FieldType::String),
            Schema::new("PadConfig").with_default("width", FieldType::Integer, 8),
            |config, input, _ctx| {
                let width = config.get("width").and_then(Value::as_u64).unwrap_or(0) as usize;
                let text = input.get_str("text").unwrap_or_default();
                Ok(json!({ "text": format!("{:>width$}", text, width = width) }))
            },
        );

        let step = StepInstance::new(Arc::new(def), None).unwrap();
        let input = step.input_schema().validate(&json!({"text": "ab"})).unwrap();
        let output = step.process(input, &mut RunContext::new()).unwrap();
        assert_eq!(output, json!({"text": "      ab"}));
    }

    #[test]
    fn test_labels_default_to_definition_name() {
        let step = StepInstance::of::<Greet>(Some(json!({"greeting": "Hi"})))
            .unwrap()
            .labeled("first greeting");
        assert_eq!(step.label(), "first greeting");
        assert_eq!(step.name(), "greet");
    }

    #[test]
    fn test_definition_serializes_schemas() {
        let value = serde_json::to_value(StepDefinition::of::<Greet>()).unwrap();
        assert_eq!(value["name"], "greet");
        assert_eq!(value["input"]["fields"][0]["name"], "name");
        assert_eq!(value["config"]["fields"][1]["default"], false);
    }
}
