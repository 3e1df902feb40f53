//! Transfer-plane framing.
//!
//! Each frame is a 4-byte big-endian length followed by the bincode encoding
//! of one [`TransferMessage`].

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::types::{MAX_FRAME_BYTES, TransferMessage};
use crate::error::{OverlayError, OverlayResult};

pub async fn write_message<S>(io: &mut S, message: &TransferMessage) -> OverlayResult<()>
where
    S: AsyncWrite + Unpin,
{
    let encoded = bincode::serialize(message)?;
    if encoded.len() > MAX_FRAME_BYTES {
        return Err(OverlayError::Protocol(format!(
            "frame of {} bytes exceeds limit",
            encoded.len()
        )));
    }
    let len = u32::try_from(encoded.len())
        .map_err(|_| OverlayError::Protocol("frame too large for length prefix".into()))?;

    io.write_u32(len).await?;
    io.write_all(&encoded).await?;
    io.flush().await?;
    Ok(())
}

/// Reads the next frame. `Ok(None)` means the peer closed the connection
/// cleanly between frames; a close inside the length prefix is an error.
pub async fn read_message<S>(io: &mut S) -> OverlayResult<Option<TransferMessage>>
where
    S: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    let mut filled = 0;
    while filled < prefix.len() {
        let n = io.read(&mut prefix[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(OverlayError::Protocol(format!(
                "connection closed after {} of 4 length bytes",
                filled
            )));
        }
        filled += n;
    }
    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(OverlayError::Protocol(format!(
            "incoming frame of {} bytes exceeds limit",
            len
        )));
    }

    let mut data = vec![0u8; len];
    io.read_exact(&mut data).await?;
    Ok(Some(bincode::deserialize(&data)?))
}
