//! Error types for opsbridge

use thiserror::Error;

/// Main error type for opsbridge operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Critical service '{name}' failed to initialize: {message}")]
    CriticalService { name: String, message: String },

    #[error("Service manager already initialized (state: {0})")]
    AlreadyInitialized(String),

    #[error("{failed} of {attempted} services failed to close: {details}")]
    Shutdown {
        failed: usize,
        attempted: usize,
        details: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a critical service error
    pub fn critical_service(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::CriticalService {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Error::Backend(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_message_names_counts() {
        let err = Error::Shutdown {
            failed: 1,
            attempted: 3,
            details: "grafana: connection reset".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "1 of 3 services failed to close: grafana: connection reset"
        );
    }

    #[test]
    fn test_from_anyhow_keeps_context_chain() {
        let err: Error = anyhow::anyhow!("root cause").context("outer").into();
        assert_eq!(err.to_string(), "Internal error: outer: root cause");
    }
}
