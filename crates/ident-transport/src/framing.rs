//! Length-prefixed framing for reliable message delimiting.
//!
//! Format: unsigned LEB128 varint length || data. One frame per stream use.

use bytes::Bytes;
use ident_proto::consts::MAX_MESSAGE_SIZE;
use prost::encoding::{encode_varint, encoded_len_varint};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Longest valid varint encoding of a u64.
pub const MAX_VARINT_LEN: usize = 10;

/// Framing error
#[derive(Debug, Error)]
pub enum FramingError {
    #[error("Frame too large: {0} bytes (max: {1})")]
    TooLarge(usize, usize),

    #[error("Stream ended inside a frame")]
    Truncated,

    #[error("Invalid length prefix")]
    InvalidLength,

    #[error("Operation timed out")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Varint length-prefixed frame codec
#[derive(Clone, Copy, Debug)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a new codec with the specified maximum frame size
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Encode data with length prefix
    pub fn encode(&self, data: &[u8]) -> Result<Vec<u8>, FramingError> {
        if data.len() > self.max_frame_size {
            return Err(FramingError::TooLarge(data.len(), self.max_frame_size));
        }

        let len = data.len() as u64;
        let mut encoded = Vec::with_capacity(encoded_len_varint(len) + data.len());
        encode_varint(len, &mut encoded);
        encoded.extend_from_slice(data);
        Ok(encoded)
    }

    /// Read one frame from `reader`.
    ///
    /// Returns `Ok(None)` if the stream ends before the first byte of a frame.
    /// A stream that ends anywhere after that is `Truncated`.
    pub async fn read_frame<R>(&self, reader: &mut R) -> Result<Option<Bytes>, FramingError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut prefix = [0u8; MAX_VARINT_LEN];
        let mut filled = 0;

        let len = loop {
            let mut byte = [0u8; 1];
            if reader.read(&mut byte).await? == 0 {
                return if filled == 0 {
                    Ok(None)
                } else {
                    Err(FramingError::Truncated)
                };
            }
            prefix[filled] = byte[0];
            filled += 1;
            if let Some((len, _)) = parse_prefix(&prefix[..filled])? {
                break len;
            }
        };
        let len = self.check_len(len)?;

        let mut data = vec![0u8; len];
        reader.read_exact(&mut data).await.map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => FramingError::Truncated,
            _ => FramingError::Io(e),
        })?;
        Ok(Some(Bytes::from(data)))
    }

    /// Write `data` as one frame and flush.
    pub async fn write_frame<W>(&self, writer: &mut W, data: &[u8]) -> Result<(), FramingError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let framed = self.encode(data)?;
        writer.write_all(&framed).await?;
        writer.flush().await?;
        Ok(())
    }

    fn check_len(&self, len: u64) -> Result<usize, FramingError> {
        let len = usize::try_from(len).map_err(|_| FramingError::InvalidLength)?;
        if len > self.max_frame_size {
            return Err(FramingError::TooLarge(len, self.max_frame_size));
        }
        Ok(len)
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(MAX_MESSAGE_SIZE)
    }
}

/// Parse a varint length prefix. `None` if more bytes are needed.
fn parse_prefix(bytes: &[u8]) -> Result<Option<(u64, usize)>, FramingError> {
    let mut value = 0u64;
    for (i, b) in bytes.iter().take(MAX_VARINT_LEN).enumerate() {
        // The tenth byte may only carry the top bit of a u64.
        if i == MAX_VARINT_LEN - 1 && *b > 1 {
            return Err(FramingError::InvalidLength);
        }
        value |= u64::from(b & 0x7f) << (7 * i);
        if b & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
    }
    if bytes.len() >= MAX_VARINT_LEN {
        return Err(FramingError::InvalidLength);
    }
    Ok(None)
}
