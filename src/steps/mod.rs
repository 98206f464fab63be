//! Built-in steps
//!
//! A small CSV workflow: read a file into rows, rewrite a favourite-food
//! column, write the rows back out.

pub mod csv_rows;
pub mod favorite_food;

use crate::core::schema::{FieldType, Schema};
use crate::core::Registry;
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use csv_rows::{CsvOptions, CsvPath, CsvPathToDict, SaveDictToCsv, SaveToPathConfig};
pub use favorite_food::ChangeFavoriteFood;

/// One CSV row: column name to cell
pub type Row = Map<String, Value>;

/// Rows of a table, as passed between the built-in steps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rows {
    pub rows: Vec<Row>,
}

impl Rows {
    pub fn schema() -> Schema {
        Schema::new("Rows").field("rows", FieldType::list(FieldType::map(FieldType::String)))
    }
}

/// Empty value, used as the output of sinks and the config of config-less steps
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Nothing {}

impl Nothing {
    pub fn schema() -> Schema {
        Schema::new("Nothing")
    }
}

/// Register every built-in step
pub fn register_builtin_steps(registry: &Registry) -> Result<(), EngineError> {
    registry.register_step::<CsvPathToDict>()?;
    registry.register_step::<ChangeFavoriteFood>()?;
    registry.register_step::<SaveDictToCsv>()?;
    Ok(())
}
