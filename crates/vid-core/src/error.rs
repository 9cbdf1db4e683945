//! Error types for limvid

use thiserror::Error;

/// limvid error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Validation error (bad configuration or bad inputs, raised before numerical work)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A model name that no registry entry answers to
    #[error("Unknown {category} model '{name}'")]
    UnknownModel {
        /// Model category (mass function, bias, luminosity, ...)
        category: String,
        /// Requested name
        name: String,
    },

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),

    /// Not implemented
    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
