//! CLI and HTTP front end for the auto-resolve ticket pipeline.

pub mod app;
pub mod cli;
pub mod http;

pub use app::{build_pipeline, Pipeline};
