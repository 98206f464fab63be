//! Steps converting between CSV files and rows

use crate::core::schema::{FieldType, Schema};
use crate::core::{RunContext, Step};
use crate::steps::{Nothing, Row, Rows};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// Input of [`CsvPathToDict`]
#[derive(Debug, Clone, Deserialize)]
pub struct CsvPath {
    pub csv_path: String,
}

/// CSV parsing options
#[derive(Debug, Clone, Deserialize)]
pub struct CsvOptions {
    pub delimiter: String,
    pub header: bool,
}

impl CsvOptions {
    fn schema() -> Schema {
        Schema::new("CsvOptions")
            .with_default("delimiter", FieldType::String, ",")
            .with_default("header", FieldType::Bool, true)
    }

    fn delimiter_byte(&self) -> Result<u8> {
        match self.delimiter.as_bytes() {
            [byte] => Ok(*byte),
            _ => anyhow::bail!("delimiter must be a single byte, got {:?}", self.delimiter),
        }
    }
}

/// Reads a CSV file into rows.
///
/// With `header` the first line names the columns; without it columns are
/// named `col_0`, `col_1`, and so on.
#[derive(Debug)]
pub struct CsvPathToDict {
    options: CsvOptions,
}

impl Step for CsvPathToDict {
    const NAME: &'static str = "CSV path to dict";
    type Input = CsvPath;
    type Output = Rows;
    type Config = CsvOptions;

    fn input_schema() -> Schema {
        Schema::new("CsvPath").field("csv_path", FieldType::String)
    }

    fn output_schema() -> Schema {
        Rows::schema()
    }

    fn config_schema() -> Schema {
        CsvOptions::schema()
    }

    fn new(options: CsvOptions) -> Self {
        Self { options }
    }

    fn process(&self, input: CsvPath, ctx: &mut RunContext) -> Result<Rows> {
        let file = File::open(&input.csv_path)
            .with_context(|| format!("Failed to open {}", input.csv_path))?;

        let mut reader = ReaderBuilder::new()
            .delimiter(self.options.delimiter_byte()?)
            .has_headers(self.options.header)
            .flexible(true)
            .from_reader(file);

        let columns: Option<Vec<String>> = if self.options.header {
            Some(reader.headers()?.iter().map(str::to_string).collect())
        } else {
            None
        };

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.with_context(|| format!("Failed to read {}", input.csv_path))?;
            let row: Row = match &columns {
                Some(columns) => {
                    if record.len() > columns.len() {
                        let line = record.position().map(|pos| pos.line()).unwrap_or_default();
                        anyhow::bail!(
                            "{} line {} has {} cells but the header has {} columns",
                            input.csv_path,
                            line,
                            record.len(),
                            columns.len()
                        );
                    }
                    columns
                        .iter()
                        .zip(record.iter())
                        .map(|(column, cell)| (column.clone(), Value::from(cell)))
                        .collect()
                }
                None => record
                    .iter()
                    .enumerate()
                    .map(|(i, cell)| (format!("col_{}", i), Value::from(cell)))
                    .collect(),
            };
            rows.push(row);
        }

        info!("Read {} rows from {}", rows.len(), input.csv_path);
        ctx.set_metadata("rows_read", rows.len());
        Ok(Rows { rows })
    }
}

/// Config of [`SaveDictToCsv`]
#[derive(Debug, Clone, Deserialize)]
pub struct SaveToPathConfig {
    pub save_path: String,
    pub overwrite: bool,
    pub delimiter: String,
    pub header: bool,
}

/// Writes rows to a CSV file. Column order follows the first row.
#[derive(Debug)]
pub struct SaveDictToCsv {
    config: SaveToPathConfig,
}

impl Step for SaveDictToCsv {
    const NAME: &'static str = "Save dict to CSV";
    type Input = Rows;
    type Output = Nothing;
    type Config = SaveToPathConfig;

    fn input_schema() -> Schema {
        Rows::schema()
    }

    fn output_schema() -> Schema {
        Nothing::schema()
    }

    fn config_schema() -> Schema {
        Schema::new("SaveToPathConfig")
            .field("save_path", FieldType::String)
            .with_default("overwrite", FieldType::Bool, false)
            .with_default("delimiter", FieldType::String, ",")
            .with_default("header", FieldType::Bool, true)
    }

    fn new(config: SaveToPathConfig) -> Self {
        Self { config }
    }

    fn process(&self, input: Rows, ctx: &mut RunContext) -> Result<Nothing> {
        let Some(first) = input.rows.first() else {
            anyhow::bail!("No rows to save");
        };

        let path = Path::new(&self.config.save_path);
        if path.exists() && !self.config.overwrite {
            anyhow::bail!("{} already exists and overwrite is disabled", path.display());
        }

        let columns: Vec<&String> = first.keys().collect();
        for (index, row) in input.rows.iter().enumerate() {
            if let Some(extra) = row.keys().find(|key| !first.contains_key(*key)) {
                anyhow::bail!("Row {} has column '{}' which is not in the first row", index, extra);
            }
        }

        let delimiter = CsvOptions {
            delimiter: self.config.delimiter.clone(),
            header: self.config.header,
        }
        .delimiter_byte()?;
        let mut writer = WriterBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;

        if self.config.header {
            writer.write_record(&columns)?;
        }
        for row in &input.rows {
            writer.write_record(columns.iter().map(|column| cell(row.get(*column))))?;
        }
        writer.flush()?;

        debug!("Wrote {} rows to {}", input.rows.len(), path.display());
        ctx.set_metadata("saved_path", path.display().to_string());
        Ok(Nothing {})
    }
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
