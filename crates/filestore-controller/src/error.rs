//! Controller error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ControllerError>;

#[derive(Debug, Error)]
pub enum ControllerError {
    /// The listening endpoint could not be bound.
    #[error("failed to bind controller listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
