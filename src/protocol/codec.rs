//! Length-prefixed JSON framing
//!
//! Encoding produces a ready-to-write `Bytes` frame so the server can encode
//! an `updated` event once and share it between every room member.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{CodecError, Error, Result};

use super::constants::{DEFAULT_MAX_FRAME_SIZE, DEFAULT_READ_BUFFER_SIZE, FRAME_HEADER_SIZE};

/// Frame encoder/decoder
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a codec with the given frame body limit
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Maximum accepted frame body size
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Encode one event into a complete frame
    pub fn encode<T: Serialize>(&self, event: &T) -> std::result::Result<Bytes, CodecError> {
        let body = serde_json::to_vec(event)?;

        if body.len() > self.max_frame_size {
            return Err(CodecError::FrameTooLarge {
                size: body.len(),
                max: self.max_frame_size,
            });
        }

        let mut frame = BytesMut::with_capacity(FRAME_HEADER_SIZE + body.len());
        frame.put_u32(body.len() as u32);
        frame.put_slice(&body);
        Ok(frame.freeze())
    }

    /// Try to decode one event from the front of `buf`
    ///
    /// Returns `Ok(None)` when more data is needed. A frame with an invalid
    /// body is still consumed, so the caller may keep decoding after a
    /// [`CodecError::Malformed`].
    pub fn decode<T: DeserializeOwned>(
        &self,
        buf: &mut BytesMut,
    ) -> std::result::Result<Option<T>, CodecError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if len > self.max_frame_size {
            return Err(CodecError::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }

        let total = FRAME_HEADER_SIZE + len;
        if buf.len() < total {
            buf.reserve(total - buf.len());
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE);
        let body = buf.split_to(len);
        let event = serde_json::from_slice(&body)?;
        Ok(Some(event))
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

/// Buffered frame reader over any async byte source
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
    codec: FrameCodec,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap a reader
    pub fn new(inner: R, codec: FrameCodec) -> Self {
        Self::with_capacity(inner, codec, DEFAULT_READ_BUFFER_SIZE)
    }

    /// Wrap a reader with a specific initial buffer capacity
    pub fn with_capacity(inner: R, codec: FrameCodec, capacity: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(capacity),
            codec,
        }
    }

    /// Read the next event
    ///
    /// Returns `Ok(None)` on a clean end of stream (EOF between frames) and
    /// [`Error::ConnectionClosed`] when the peer disconnects mid-frame.
    pub async fn next<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        loop {
            if let Some(event) = self.codec.decode(&mut self.buf)? {
                return Ok(Some(event));
            }

            if self.inner.read_buf(&mut self.buf).await? == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(Error::ConnectionClosed);
            }
        }
    }

    /// Give back the underlying reader
    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Write one encoded frame and flush it
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &[u8]) -> Result<()> {
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}
