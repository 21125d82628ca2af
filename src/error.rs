//! Engine error types

use thiserror::Error;

/// Errors surfaced by the particle engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// The theme asks for no engine at all
    #[error("Theme '{0}' has the particle engine disabled")]
    Disabled(String),

    /// GPU adapter, device or surface could not be created
    #[error("Rendering backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Unrecoverable surface failure during a frame
    #[error("Surface error: {0}")]
    Surface(String),

    /// Frame requested after dispose or after a faulted frame
    #[error("Engine has been disposed")]
    Disposed,
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
