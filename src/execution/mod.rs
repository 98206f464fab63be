//! Pipeline execution

pub mod events;
pub mod runner;

pub use events::{EventHandler, ExecutionEvent};
pub use runner::Interrupted;
