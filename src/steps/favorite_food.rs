//! Rewrites the favourite-food column of a table

use crate::core::schema::Schema;
use crate::core::{RunContext, Step};
use crate::steps::{Nothing, Row, Rows};
use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info};

/// Column names recognised as the favourite-food column (compared lowercased)
const COLUMN_NAMES: [&str; 4] = ["favorite_food", "fav_food", "favfood", "favoritefood"];

/// Replaces every `a` with `o` (and `A` with `O`) in the favourite-food column.
///
/// The column is looked up on the first row. A table without one passes
/// through unchanged.
#[derive(Debug, Default)]
pub struct ChangeFavoriteFood;

impl Step for ChangeFavoriteFood {
    const NAME: &'static str = "Change favorite food";
    type Input = Rows;
    type Output = Rows;
    type Config = Nothing;

    fn input_schema() -> Schema {
        Rows::schema()
    }

    fn output_schema() -> Schema {
        Rows::schema()
    }

    fn config_schema() -> Schema {
        Nothing::schema()
    }

    fn new(_config: Nothing) -> Self {
        Self
    }

    fn process(&self, mut input: Rows, ctx: &mut RunContext) -> Result<Rows> {
        let Some(column) = input.rows.first().and_then(find_column) else {
            debug!("No favourite food column, leaving rows unchanged");
            ctx.set_metadata("favorite_food_rewrites", 0);
            return Ok(input);
        };

        let mut rewrites = 0;
        for row in &mut input.rows {
            if let Some(Value::String(food)) = row.get_mut(&column) {
                let changed = rewrite(food);
                if changed != *food {
                    *food = changed;
                    rewrites += 1;
                }
            }
        }

        info!("Rewrote {} values in column {}", rewrites, column);
        ctx.set_metadata("favorite_food_rewrites", rewrites);
        Ok(input)
    }
}

fn find_column(row: &Row) -> Option<String> {
    row.keys()
        .find(|key| COLUMN_NAMES.contains(&key.to_lowercase().as_str()))
        .cloned()
}

fn rewrite(food: &str) -> String {
    food.replace('a', "o").replace('A', "O")
}
