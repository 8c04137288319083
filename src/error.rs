//! Error types for the carbon model

use std::io;
use thiserror::Error;

/// Result type alias for carbon model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Error type for model construction and catalog access.
///
/// Every variant is fatal for the construction it occurs in: a model either
/// builds completely or is unusable. Nothing here is retried.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Catalog query with no matching record
    #[error("Not found: {0}")]
    NotFound(String),

    /// Required parameter combination missing or invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Derate curve fit failed
    #[error("Curve fit error: {0}")]
    CurveFit(String),

    /// Malformed quantity or unknown unit suffix
    #[error("Parse error: {0}")]
    Parse(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TOML deserialization error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
