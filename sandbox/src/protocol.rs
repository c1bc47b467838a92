//! Length-prefixed frame wire format for the worker -> host result channel
//! (spec §4.11: "returns a Sandbox Result by length-prefixed frames over a
//! pipe"). The channel itself is a dedicated temp file rather than a raw
//! OS pipe: a worker process is free-standing (it may be any interpreter
//! the host configures, not a child of this crate's own code), and a temp
//! file needs no extra-fd plumbing to hand a worker its write end. The
//! frame format worker implementations must produce is: a 4-byte
//! little-endian length, followed by that many bytes of UTF-8 JSON
//! encoding a `SandboxResult`.

use std::io;

use mlpy_types::SandboxResult;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const LENGTH_PREFIX_BYTES: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame channel I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("frame is truncated: declared {declared} bytes, channel had {available}")]
    Truncated { declared: usize, available: usize },
    #[error("frame payload is not valid SandboxResult JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub async fn write_frame<W: tokio::io::AsyncWrite + Unpin>(writer: &mut W, result: &SandboxResult) -> Result<(), FrameError> {
    let payload = serde_json::to_vec(result)?;
    let len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_frame<R: tokio::io::AsyncRead + Unpin>(reader: &mut R) -> Result<SandboxResult, FrameError> {
    let mut header = [0u8; LENGTH_PREFIX_BYTES];
    reader.read_exact(&mut header).await?;
    let declared = u32::try_from(u32::from_le_bytes(header)).unwrap_or(0) as usize;

    let mut payload = vec![0u8; declared];
    let read = read_as_much_as_available(reader, &mut payload).await?;
    if read < declared {
        return Err(FrameError::Truncated { declared, available: read });
    }
    Ok(serde_json::from_slice(&payload)?)
}

async fn read_as_much_as_available<R: tokio::io::AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlpy_types::ExitReason;

    #[tokio::test]
    async fn round_trips_a_result_through_the_frame_format() {
        let result = SandboxResult::success(Some(serde_json::json!(14)), "out".to_string(), String::new(), 12, 5, 1024);
        let mut buf = Vec::new();
        write_frame(&mut buf, &result).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let decoded = read_frame(&mut cursor).await.unwrap();
        assert_eq!(decoded, result);
    }

    #[tokio::test]
    async fn truncated_frame_is_an_error() {
        let result = SandboxResult::failure(ExitReason::WorkerCrashed, "boom");
        let mut buf = Vec::new();
        write_frame(&mut buf, &result).await.unwrap();
        buf.truncate(buf.len() - 2);

        let mut cursor = std::io::Cursor::new(buf);
        assert!(matches!(read_frame(&mut cursor).await, Err(FrameError::Truncated { .. })));
    }
}
