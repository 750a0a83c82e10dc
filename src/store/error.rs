use crate::prompt::PromptError;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to create artifact directory '{0}'")]
    DirCreation(PathBuf, #[source] std::io::Error),

    #[error("Artifact '{name}' already exists in '{dir}'")]
    NamingCollision { name: String, dir: PathBuf },

    #[error("Invalid artifact name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("Could not secure an artifact name")]
    Naming(#[from] PromptError),

    #[error("I/O error on artifact '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to write CSV artifact '{0}'")]
    CsvWrite(PathBuf, #[source] PolarsError),

    #[error("Failed to read CSV artifact '{0}'")]
    CsvRead(PathBuf, #[source] PolarsError),

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),

    #[error("Missing required column '{column}' in '{path}'")]
    MissingColumn { path: PathBuf, column: String },

    /// The forecast body is not JSON or does not have the `timeSeries` shape.
    #[error("Malformed forecast response from {url}")]
    MalformedResponse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed timestamp '{value}' in row {row}")]
    MalformedTimestamp { row: usize, value: String },

    #[error("Malformed values '{value}' in row {row}")]
    MalformedValues { row: usize, value: String },

    #[error("No rows for parameter '{key}'")]
    EmptySample { key: String },
}

impl StoreError {
    /// True when the data itself (not the disk or the operator) is at fault.
    pub fn is_malformed_data(&self) -> bool {
        matches!(
            self,
            StoreError::MalformedResponse { .. }
                | StoreError::MalformedTimestamp { .. }
                | StoreError::MalformedValues { .. }
                | StoreError::MissingColumn { .. }
                | StoreError::CsvRead(..)
                | StoreError::EmptySample { .. }
        )
    }
}
