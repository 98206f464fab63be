//! Pipeline definitions from YAML
//!
//! A definition names registered steps in order, with an optional config
//! for each. Resolving it against a [`Registry`] instantiates the steps and
//! assembles the pipeline, so configuration and compatibility errors surface
//! before anything runs.

use crate::core::{Pipeline, Registry};
use crate::error::EngineError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

/// Top-level pipeline definition loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Steps, in execution order
    pub steps: Vec<StepConfig>,
}

/// One step entry of a definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Registered step name
    pub step: String,

    /// Label used in diagnostics (defaults to the step name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Raw configuration, validated against the step's config schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

impl StepConfig {
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.step)
    }
}

impl PipelineConfig {
    /// Load a pipeline definition from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a pipeline definition from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the definition's shape (step names are resolved later)
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Pipeline name must not be empty");
        }

        let mut seen = HashSet::new();
        for (position, step) in self.steps.iter().enumerate() {
            if step.step.trim().is_empty() {
                anyhow::bail!("Step {} has no step name", position);
            }
            if !seen.insert(step.label()) {
                anyhow::bail!(
                    "Duplicate step label '{}'; give repeated steps distinct labels",
                    step.label()
                );
            }
            if let Some(config) = &step.config {
                if !config.is_object() && !config.is_null() {
                    anyhow::bail!("Config of step '{}' must be a mapping", step.label());
                }
            }
        }

        Ok(())
    }

    /// Resolve every step against `registry` and assemble the pipeline
    pub fn to_pipeline(&self, registry: &Registry) -> Result<Pipeline, EngineError> {
        let steps = self
            .steps
            .iter()
            .map(|entry| {
                let config = entry.config.clone().filter(|c| !c.is_null());
                let instance = registry.instantiate(&entry.step, config)?;
                Ok(match &entry.label {
                    Some(label) => instance.labeled(label.clone()),
                    None => instance,
                })
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        Pipeline::named(self.name.clone(), steps)
    }
}
