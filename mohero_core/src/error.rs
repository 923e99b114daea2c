//! Error types for the mohero_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for mohero_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog validation error
    #[error("Catalog validation error: {0}")]
    CatalogValidation(String),

    /// Program, day or exercise definition does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation needs a signed-in user
    #[error("No authenticated user")]
    Unauthenticated,

    /// Operation refused because its preconditions do not hold
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Transient read failure with no cached value to fall back on
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Remote store rejected or failed a call
    #[error("Store error: {0}")]
    Store(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Transient failures that a cached value may stand in for
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Store(_) | Error::Io(_) | Error::Unavailable(_))
    }
}
