//! Error types for rendering and the worker loop.

use page_ipc::IpcError;

/// Error raised while handling a single request.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("render engine failed: {0:#}")]
    Engine(anyhow::Error),

    #[error("no render result returned")]
    MissingRenderResult,

    #[error("engine signaled both not-found and redirect")]
    ConflictingSignals,

    #[error("invalid redirect page props: {0}")]
    InvalidRedirect(String),

    #[error("failed to serialize page data: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Error that ends the worker loop.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("unexpected message type: {0}")]
    Protocol(String),

    #[error("channel error: {0}")]
    Ipc(#[from] IpcError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl WorkerError {
    /// Whether the host should have received an error report for this.
    ///
    /// Protocol violations are treated as upstream bugs and only end the
    /// process.
    pub fn is_reported(&self) -> bool {
        !matches!(self, Self::Protocol(_))
    }
}
