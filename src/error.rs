//! Structured error types for Parley
//!
//! Provides type-safe error handling for the conversation engine,
//! with user-friendly messages for the interactive boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for Parley operations
#[derive(Error, Debug)]
pub enum ParleyError {
    // =========================================================================
    // Provider / Translation Errors
    // =========================================================================
    /// Provider name not recognized at a configuration boundary
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// Adapter cannot represent an entry in the target wire shape
    #[error("translation failed for {provider}: {reason}")]
    Translation { provider: String, reason: String },

    // =========================================================================
    // Persistence Errors
    // =========================================================================
    /// History file could not be read
    #[error("history read failed: {path}")]
    HistoryReadFailed { path: PathBuf },

    /// History file could not be written
    #[error("history write failed: {path}")]
    HistoryWriteFailed { path: PathBuf },

    /// Persisted history document is malformed
    #[error("history corrupted: {reason}")]
    HistoryCorrupted { reason: String },

    // =========================================================================
    // External Error Wrappers (transparent)
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ParleyError {
    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::UnknownProvider(name) => {
                format!("Provider '{}' is not supported.", name)
            }
            Self::HistoryReadFailed { path } => {
                format!(
                    "Could not read history file '{}'. The current conversation is unchanged.",
                    path.display()
                )
            }
            Self::HistoryCorrupted { .. } => {
                "The history file is malformed. The current conversation is unchanged.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Result type alias using ParleyError
pub type Result<T> = std::result::Result<T, ParleyError>;
