//! Channel errors.

/// Error type for channel operations.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unexpected message type: {0}")]
    UnexpectedMessageType(String),

    #[error("channel closed")]
    Closed,
}

impl IpcError {
    /// Whether this error means the peer went away rather than misbehaved.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
