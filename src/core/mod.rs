pub mod config;
pub mod errors;

pub use config::{PipelineConfig, StorePaths};
pub use errors::PipelineError;
