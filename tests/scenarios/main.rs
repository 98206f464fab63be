//! Scenario-based tests for pipeco

mod helpers;

mod assembly;
mod config_validation;
mod determinism;
mod fail_fast;
mod round_trip;
