use crate::connection::ConnectionId;

/// Errors that can occur in bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] litebus_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] litebus_frame::FrameError),

    /// The operation is not legal for the bus's role or state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The connection has already been closed.
    #[error("connection {0} is closed")]
    Disconnected(ConnectionId),

    /// The receive loop thread could not be started.
    #[error("failed to start receive loop: {0}")]
    Spawn(std::io::Error),
}

pub type Result<T> = std::result::Result<T, BusError>;
