//! Error types for ripple-jsonl operations.

use std::io;
use thiserror::Error;

/// The error type for ripple-jsonl operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error occurred while reading or writing.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A record could not be serialized, or a strict read hit malformed JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for ripple-jsonl operations.
pub type Result<T> = std::result::Result<T, Error>;
