//! Relaybot error types

use thiserror::Error;

/// Relaybot error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Durable storage I/O failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Operation invoked outside a valid gateway lifecycle state
    #[error("Gateway cannot {operation} while {state}")]
    NotRunning { operation: String, state: String },

    /// Routing handler failure, wrapping the original cause
    #[error("Routing error in {context}: {source}")]
    Routing {
        context: String,
        #[source]
        source: Box<Error>,
    },

    /// Routing handler exceeded the caller-supplied execution bound
    #[error("Routing timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Malformed payload or record (e.g. missing required field)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Channel error
    #[error("Channel error: {0}")]
    Channel(String),

    /// Agent error
    #[error("Agent error: {0}")]
    Agent(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Lifecycle-state error for an operation attempted in the wrong state.
    pub fn not_running(operation: impl Into<String>, state: impl std::fmt::Display) -> Self {
        Self::NotRunning {
            operation: operation.into(),
            state: state.to_string(),
        }
    }

    /// Wrap a handler failure with its routing context.
    pub fn routing(context: impl Into<String>, source: Error) -> Self {
        Self::Routing {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

/// Result type alias for relaybot operations
pub type Result<T> = std::result::Result<T, Error>;
