// crates/orderlake-core/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Glob traversal failed: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Data processing error: {0}")]
    Processing(String),

    #[error("all input files for source '{source_name}' failed: {summary}", summary = .failures.join("; "))]
    AllFilesFailed {
        source_name: String,
        failures: Vec<String>,
    },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
