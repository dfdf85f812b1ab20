//! SAR planner CLI support code.
//!
//! The `sar-planner` binary reads JSON documents, runs one engine operation
//! and prints the result as JSON.

pub mod config;
pub mod documents;
pub mod elevation;

pub use config::Config;
pub use elevation::fetch_terrain_grid;
