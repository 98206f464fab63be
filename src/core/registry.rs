//! Step registry - maps human-readable names to step definitions
//!
//! A [`Registry`] can be created and passed around explicitly. There is also
//! one process-wide registry, empty at start, reachable through [`global`] and
//! the free functions of this module.

use crate::core::context::RunContext;
use crate::core::schema::{Record, Schema};
use crate::core::step::{Step, StepDefinition, StepInstance};
use crate::error::EngineError;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Thread-safe table of step definitions keyed by name
#[derive(Debug, Default)]
pub struct Registry {
    steps: RwLock<HashMap<String, Arc<StepDefinition>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition under its name. Names are never overwritten.
    pub fn register(&self, definition: StepDefinition) -> Result<Arc<StepDefinition>, EngineError> {
        let mut steps = self.steps.write().unwrap_or_else(PoisonError::into_inner);

        if steps.contains_key(definition.name()) {
            return Err(EngineError::DuplicateRegistration {
                name: definition.name().to_string(),
            });
        }

        let definition = Arc::new(definition);
        steps.insert(definition.name().to_string(), Arc::clone(&definition));
        info!("Registered step: {}", definition.name());
        Ok(definition)
    }

    /// Register a typed step
    pub fn register_step<S: Step>(&self) -> Result<Arc<StepDefinition>, EngineError> {
        self.register(StepDefinition::of::<S>())
    }

    /// Declare and register a closure step in one call
    pub fn define<F>(
        &self,
        name: impl Into<String>,
        input: Schema,
        output: Schema,
        config: Schema,
        f: F,
    ) -> Result<Arc<StepDefinition>, EngineError>
    where
        F: Fn(&Record, Record, &mut RunContext) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.register(StepDefinition::from_fn(name, input, output, config, f))
    }

    /// Look up a definition by name
    pub fn get_step(&self, name: &str) -> Result<Arc<StepDefinition>, EngineError> {
        let steps = self.steps.read().unwrap_or_else(PoisonError::into_inner);
        steps.get(name).cloned().ok_or_else(|| {
            debug!("Lookup of unknown step: {}", name);
            EngineError::UnknownStep {
                name: name.to_string(),
            }
        })
    }

    /// Look up `name` and bind it to `raw_config`
    pub fn instantiate(&self, name: &str, raw_config: Option<Value>) -> Result<StepInstance, EngineError> {
        StepInstance::new(self.get_step(name)?, raw_config)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.steps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .steps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Registered definitions, sorted by name
    pub fn definitions(&self) -> Vec<Arc<StepDefinition>> {
        let mut definitions: Vec<_> = self
            .steps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        definitions.sort_by(|a, b| a.name().cmp(b.name()));
        definitions
    }

    pub fn len(&self) -> usize {
        self.steps.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every registration
    pub fn reset(&self) {
        self.steps.write().unwrap_or_else(PoisonError::into_inner).clear();
        debug!("Registry reset");
    }
}

static GLOBAL: Lazy<Registry> = Lazy::new(Registry::new);

/// The process-wide registry
pub fn global() -> &'static Registry {
    &GLOBAL
}

/// Register a definition in the process-wide registry
pub fn register(definition: StepDefinition) -> Result<Arc<StepDefinition>, EngineError> {
    global().register(definition)
}

/// Register a typed step in the process-wide registry
pub fn register_step<S: Step>() -> Result<Arc<StepDefinition>, EngineError> {
    global().register_step::<S>()
}

/// Declare a closure step and register it in the process-wide registry
pub fn define<F>(
    name: impl Into<String>,
    input: Schema,
    output: Schema,
    config: Schema,
    f: F,
) -> Result<Arc<StepDefinition>, EngineError>
where
    F: Fn(&Record, Record, &mut RunContext) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    global().define(name, input, output, config, f)
}

/// Look up a step in the process-wide registry
pub fn get_step(name: &str) -> Result<Arc<StepDefinition>, EngineError> {
    global().get_step(name)
}

/// Clear the process-wide registry (test isolation)
pub fn reset() {
    global().reset()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::FieldType;
    use serde_json::json;

    fn echo(name: &str) -> StepDefinition {
        StepDefinition::from_fn(
            name,
            Schema::new("Text").field("text", FieldType::String),
            Schema::new("Text").field("text", FieldType::String),
            Schema::new("None"),
            |_config, input, _ctx| Ok(input.into_value()),
        )
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = Registry::new();
        assert!(registry.is_empty());

        registry.register(echo("echo")).unwrap();
        let def = registry.get_step("echo").unwrap();
        assert_eq!(def.name(), "echo");
        assert!(registry.contains("echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let registry = Registry::new();
        registry.register(echo("echo")).unwrap();

        let err = registry.register(echo("echo")).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateRegistration { ref name } if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_step() {
        let registry = Registry::new();
        let err = registry.get_step("missing").unwrap_err();
        assert!(matches!(err, EngineError::UnknownStep { ref name } if name == "missing"));
        assert!(registry.instantiate("missing", None).is_err());
    }

    #[test]
    fn test_names_are_sorted() {
        let registry = Registry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(echo(name)).unwrap();
        }
        assert_eq!(registry.names(), vec!["alpha", "mid", "zeta"]);
        let defs: Vec<_> = registry.definitions().iter().map(|d| d.name().to_string()).collect();
        assert_eq!(defs, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_instantiate_through_registry() {
        let registry = Registry::new();
        registry
            .define(
                "shout",
                Schema::new("Text").field("text", FieldType::String),
                Schema::new("Text").field("text", FieldType::String),
                Schema::new("None"),
                |_config, input, _ctx| {
                    Ok(json!({ "text": input.get_str("text").unwrap_or_default().to_uppercase() }))
                },
            )
            .unwrap();

        let step = registry.instantiate("shout", None).unwrap();
        assert_eq!(step.name(), "shout");
    }

    #[test]
    fn test_concurrent_registration_and_lookup() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::thread;

        const WRITERS: usize = 8;
        let registry = Registry::new();
        let shared_wins = AtomicUsize::new(0);

        thread::scope(|scope| {
            for i in 0..WRITERS {
                let (registry, shared_wins) = (&registry, &shared_wins);
                scope.spawn(move || {
                    registry.register(echo(&format!("step {}", i))).unwrap();
                    match registry.register(echo("shared")) {
                        Ok(_) => {
                            shared_wins.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(err) => assert!(matches!(err, EngineError::DuplicateRegistration { .. })),
                    }
                });
            }
            for _ in 0..4 {
                let registry = &registry;
                scope.spawn(move || {
                    for round in 0..100 {
                        match registry.get_step(&format!("step {}", round % WRITERS)) {
                            Ok(def) => assert_eq!(def.name(), format!("step {}", round % WRITERS)),
                            Err(err) => assert!(matches!(err, EngineError::UnknownStep { .. })),
                        }
                    }
                });
            }
        });

        assert_eq!(shared_wins.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), WRITERS + 1);
        for i in 0..WRITERS {
            assert_eq!(registry.get_step(&format!("step {}", i)).unwrap().name(), format!("step {}", i));
        }
    }

    // The only test in this crate touching the process-wide registry.
    #[test]
    fn test_global_registry_lifecycle() {
        reset();
        register(echo("global echo")).unwrap();
        assert!(get_step("global echo").is_ok());
        assert!(matches!(
            register(echo("global echo")),
            Err(EngineError::DuplicateRegistration { .. })
        ));

        reset();
        assert!(global().is_empty());
        assert!(matches!(get_step("global echo"), Err(EngineError::UnknownStep { .. })));
    }
}
