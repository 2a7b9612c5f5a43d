//! Store node error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, NodeError>;

#[derive(Debug, Error)]
pub enum NodeError {
    /// The file folder could not be prepared at startup.
    #[error("failed to prepare file folder: {0}")]
    Folder(#[source] std::io::Error),

    /// The controller was unreachable.
    #[error("failed to connect to controller: {0}")]
    Controller(#[source] std::io::Error),

    /// The client-facing listener could not be bound.
    #[error("failed to bind client listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
