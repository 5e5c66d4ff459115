//! Unified error types for autoauth

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Unified error type for all autoauth operations
#[derive(Error, Debug)]
pub enum AutoAuthError {
    // Discovery errors (abort the run)
    #[error("Could not find auth URL: {0}")]
    AuthUrlNotFound(String),

    #[error("Could not find browser profile under {root}: {reason}")]
    ProfileNotFound { root: PathBuf, reason: String },

    // Login process errors
    #[error("Login process error: {0}")]
    Process(String),

    // Browser errors
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Automation error: {0}")]
    Automation(String),

    #[error("Timed out after {timeout:?}: {what}")]
    Timeout { what: String, timeout: Duration },

    // Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

impl AutoAuthError {
    /// URL or profile discovery failed; the run must stop with a non-zero exit.
    pub fn is_fatal_discovery(&self) -> bool {
        matches!(
            self,
            AutoAuthError::AuthUrlNotFound(_) | AutoAuthError::ProfileNotFound { .. }
        )
    }
}

/// Result type alias using AutoAuthError
pub type Result<T> = std::result::Result<T, AutoAuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_discovery_classification() {
        assert!(AutoAuthError::AuthUrlNotFound("eof".into()).is_fatal_discovery());
        assert!(AutoAuthError::ProfileNotFound {
            root: PathBuf::from("/nope"),
            reason: "empty".into(),
        }
        .is_fatal_discovery());
        assert!(!AutoAuthError::Automation("detached".into()).is_fatal_discovery());
        assert!(!AutoAuthError::Timeout {
            what: "click".into(),
            timeout: Duration::from_millis(10),
        }
        .is_fatal_discovery());
    }
}
