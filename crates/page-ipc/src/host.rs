//! Host-side end of the channel.

use page_core::RenderRequest;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::error::IpcError;
use crate::frame::{read_frame, write_frame, DEFAULT_MAX_FRAME_BYTES};
use crate::message::{IncomingMessage, OutgoingMessage};

/// The host's end of a worker channel.
///
/// Used by hosts driving a worker and by tests.
pub struct HostChannel<R, W> {
    reader: R,
    writer: W,
    max_frame_bytes: usize,
}

impl<R, W> HostChannel<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Create a host channel from a reader and a writer.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }

    /// Send a render request.
    pub async fn send_request(&mut self, request: &RenderRequest) -> Result<(), IpcError> {
        let payload = IncomingMessage::Headers(request.clone()).encode()?;
        self.send_raw(&payload).await
    }

    /// Send an arbitrary payload as one frame.
    pub async fn send_raw(&mut self, payload: &[u8]) -> Result<(), IpcError> {
        write_frame(&mut self.writer, payload, self.max_frame_bytes).await
    }

    /// Signal that no more requests will be sent.
    ///
    /// The worker sees the channel close after draining pending requests.
    pub async fn finish(&mut self) -> Result<(), IpcError> {
        self.writer.shutdown().await?;
        Ok(())
    }

    /// Receive the worker's next message, or `None` once the worker is gone.
    pub async fn recv(&mut self) -> Result<Option<OutgoingMessage>, IpcError> {
        match read_frame(&mut self.reader, self.max_frame_bytes).await? {
            Some(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
            None => Ok(None),
        }
    }
}
