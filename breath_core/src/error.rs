//! Error types for the breath_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for breath_core operations
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

    /// A pattern or cycle violates the data model invariants
    #[error("Invalid pattern definition: {0}")]
    InvalidPatternDefinition(String),

    /// A control operation was issued in a state that does not permit it
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// No pattern with the requested id
    #[error("Unknown pattern: {0}")]
    UnknownPattern(String),

    /// A feedback sink or pulse driver failed
    #[error("Feedback error: {0}")]
    Feedback(String),

    /// The session runner thread is gone or misbehaved
    #[error("Runner error: {0}")]
    Runner(String),
}
