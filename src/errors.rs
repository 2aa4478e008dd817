use polars::error::PolarsError;
use std::io::Error as IoError;
use thiserror::Error;

/// Custom error type for measurement loading and signal processing.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] IoError),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("metadata error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("missing experiment: {0}")]
    MissingExperiment(String),

    #[error("missing metadata key: {0}")]
    MissingMetadataKey(String),

    #[error("invalid window: {0}")]
    InvalidWindow(String),

    #[error("invalid sweep type: {0}")]
    InvalidSweepType(String),

    #[error("invalid direction: {0}")]
    InvalidDirection(String),

    #[error("{0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, DataError>;
