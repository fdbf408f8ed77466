// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PropagatorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The request could not be turned into simulator parameters.
    #[error("invalid request: {0}")]
    Translation(String),

    /// The simulator could not be started or its output stream broke.
    #[error("simulation launch failed: {0}")]
    Launch(String),

    /// No simulator output met the probability cutoff.
    #[error("LOW_PROBABILITY: {0}")]
    LowConfidence(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PropagatorError>;
