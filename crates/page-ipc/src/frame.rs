//! Length-prefixed framing.
//!
//! Every frame is a big-endian `u32` byte length followed by the payload.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::IpcError;

/// Default upper bound for a single frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Read one frame.
///
/// Returns `Ok(None)` if the stream ends cleanly before a length prefix.
/// A stream that ends partway through the prefix is an I/O error.
pub async fn read_frame<R>(reader: &mut R, max_bytes: usize) -> Result<Option<Vec<u8>>, IpcError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    let mut filled = 0;
    while filled < prefix.len() {
        let n = reader.read(&mut prefix[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("stream ended after {} of 4 length prefix bytes", filled),
            )
            .into());
        }
        filled += n;
    }
    let len = u32::from_be_bytes(prefix) as usize;

    if len > max_bytes {
        return Err(IpcError::FrameTooLarge {
            size: len,
            limit: max_bytes,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Write one frame and flush it.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8], max_bytes: usize) -> Result<(), IpcError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > max_bytes || payload.len() > u32::MAX as usize {
        return Err(IpcError::FrameTooLarge {
            size: payload.len(),
            limit: max_bytes,
        });
    }

    writer.write_u32(payload.len() as u32).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}
