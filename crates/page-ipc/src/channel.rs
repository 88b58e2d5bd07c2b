//! Worker-side channel.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

use crate::error::IpcError;
use crate::frame::{read_frame, write_frame, DEFAULT_MAX_FRAME_BYTES};
use crate::message::{ErrorReport, IncomingMessage, OutgoingMessage, OutgoingResponse};

/// The worker's view of the inter-process channel.
#[async_trait]
pub trait IpcChannel: Send {
    /// Wait for the next message from the host.
    async fn recv(&mut self) -> Result<IncomingMessage, IpcError>;

    /// Send the response for the current request.
    async fn send(&mut self, response: OutgoingResponse) -> Result<(), IpcError>;

    /// Report a fatal failure. The channel is unusable afterwards.
    async fn send_error(&mut self, report: ErrorReport) -> Result<(), IpcError>;
}

/// State of a stream channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelState {
    /// Messages can flow both ways.
    Open,
    /// An error report was sent; nothing else may be sent.
    Errored,
    /// The host hung up.
    Closed,
}

/// `IpcChannel` over a pair of async byte streams.
pub struct StreamChannel<R, W> {
    reader: R,
    writer: W,
    state: ChannelState,
    max_frame_bytes: usize,
    frames_sent: u64,
}

impl<R, W> StreamChannel<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Create a channel from a reader and a writer.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            state: ChannelState::Open,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            frames_sent: 0,
        }
    }

    /// Set the maximum frame size accepted and produced.
    pub fn with_max_frame_bytes(mut self, bytes: usize) -> Self {
        self.max_frame_bytes = bytes;
        self
    }

    /// Number of frames written so far.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    async fn write_message(&mut self, message: &OutgoingMessage) -> Result<(), IpcError> {
        let payload = serde_json::to_vec(message)?;
        write_frame(&mut self.writer, &payload, self.max_frame_bytes).await?;
        self.frames_sent += 1;
        debug!(bytes = payload.len(), "sent frame");
        Ok(())
    }
}

impl StreamChannel<OwnedReadHalf, OwnedWriteHalf> {
    /// Connect to the host's TCP listener.
    pub async fn connect_tcp<A: ToSocketAddrs>(addr: A) -> Result<Self, IpcError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        Ok(Self::new(reader, writer))
    }
}

impl StreamChannel<tokio::io::Stdin, tokio::io::Stdout> {
    /// Use the process's stdin/stdout as the channel.
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

#[async_trait]
impl<R, W> IpcChannel for StreamChannel<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn recv(&mut self) -> Result<IncomingMessage, IpcError> {
        if self.state != ChannelState::Open {
            return Err(IpcError::Closed);
        }

        match read_frame(&mut self.reader, self.max_frame_bytes).await? {
            Some(payload) => {
                debug!(bytes = payload.len(), "received frame");
                IncomingMessage::decode(&payload)
            }
            None => {
                self.state = ChannelState::Closed;
                Err(IpcError::Closed)
            }
        }
    }

    async fn send(&mut self, response: OutgoingResponse) -> Result<(), IpcError> {
        if self.state != ChannelState::Open {
            return Err(IpcError::Closed);
        }
        self.write_message(&response.into()).await
    }

    async fn send_error(&mut self, report: ErrorReport) -> Result<(), IpcError> {
        if self.state == ChannelState::Errored {
            return Err(IpcError::Closed);
        }
        self.state = ChannelState::Errored;
        self.write_message(&report.into()).await
    }
}
