// ABOUTME: Error types for sandbox operations
// ABOUTME: Engine, registry, transfer, and path-validation failures

use thiserror::Error;

use crate::engine::EngineError;

/// Main error type for sandbox operations
#[derive(Error, Debug)]
pub enum SandboxError {
    /// Container engine errors
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Docker image not found or failed to pull
    #[error("Image error: {0}")]
    ImageError(String),

    /// A path resolved outside the allowed root
    #[error("Path {path} escapes the allowed root {root}")]
    PathEscape { path: String, root: String },

    /// Malformed or unreadable archive payload
    #[error("Archive error: {0}")]
    Archive(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Type alias for Results that return SandboxError
pub type Result<T> = std::result::Result<T, SandboxError>;
