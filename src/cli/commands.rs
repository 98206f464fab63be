//! CLI command definitions

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{Map, Value};

/// Run a pipeline definition
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Pipeline input as a JSON object
    #[arg(short, long, default_value = "{}")]
    pub input: String,

    /// Read the pipeline input from a JSON file instead
    #[arg(long, conflicts_with = "input")]
    pub input_file: Option<String>,

    /// Input field overrides (key=value); values are parsed as JSON when possible
    #[arg(long, value_parser = parse_key_value)]
    pub set: Vec<(String, String)>,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,
}

impl RunCommand {
    /// Build the pipeline input from `--input`/`--input-file` and `--set`
    pub fn build_input(&self) -> Result<Value> {
        let raw = match &self.input_file {
            Some(path) => std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?,
            None => self.input.clone(),
        };
        let mut input: Value = serde_json::from_str(&raw).context("Pipeline input is not valid JSON")?;

        if !self.set.is_empty() {
            let object = input
                .as_object_mut()
                .context("--set needs the pipeline input to be a JSON object")?;
            apply_overrides(object, &self.set);
        }

        Ok(input)
    }
}

fn apply_overrides(object: &mut Map<String, Value>, overrides: &[(String, String)]) {
    for (key, value) in overrides {
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.clone()));
        object.insert(key.clone(), value);
    }
}

/// Validate a pipeline definition
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List registered steps
#[derive(Debug, Args, Clone)]
pub struct StepsCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Pipeline name to filter by
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show full details
    #[arg(long)]
    pub verbose: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a specific run
    #[arg(long)]
    pub execution_id: Option<String>,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}
