// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Length-prefixed JSON framing.

use crate::WireError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single frame. File-transfer bodies are capped at
/// 512 KiB of payload, but JSON encoding of bytes inflates them; events
/// and requests are far smaller.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Serializes a message to its JSON wire form (no length prefix).
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, WireError> {
    serde_json::to_vec(msg).map_err(WireError::Encode)
}

/// Deserializes a message from its JSON wire form.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, WireError> {
    serde_json::from_slice(bytes).map_err(WireError::Decode)
}

/// Writes one length-prefixed message.
pub async fn write_message<W>(writer: &mut W, payload: &[u8]) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge(payload.len()));
    }
    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one length-prefixed message.
///
/// Returns `Ok(None)` on a clean EOF at a frame boundary; EOF inside a
/// frame is an error.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Vec<u8>>, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge(len));
    }
    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => WireError::UnexpectedEof,
            _ => WireError::Io(e),
        })?;
    Ok(Some(payload))
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
