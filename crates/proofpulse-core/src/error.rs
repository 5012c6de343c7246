//! Error types for ProofPulse.

use thiserror::Error;

/// Errors surfaced by ProofPulse components.
///
/// Most of the engine degrades silently; these are returned only at
/// explicit seams (config files, backend RPCs, runtime-dependent lifecycle).
#[derive(Debug, Error)]
pub enum ProofPulseError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ProofPulseError>;
