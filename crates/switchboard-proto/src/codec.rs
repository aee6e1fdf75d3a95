//! Length-prefixed framing over async streams
//!
//! On the wire each frame is a `u32` body length (big-endian) followed by
//! the [`PublishFrame`] body.

use crate::{ProtocolError, PublishFrame};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame size (16MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

const LENGTH_PREFIX: usize = 4;

/// Codec for length-prefixed publish frames over async streams
pub struct FrameCodec {
    /// Bytes received but not yet decoded
    read_buf: BytesMut,
    /// Largest body accepted or produced
    max_frame_size: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    /// Create a codec with the default size limit
    pub fn new() -> Self {
        Self::with_max_frame_size(MAX_FRAME_SIZE)
    }

    /// Create a codec with a custom size limit
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            read_buf: BytesMut::with_capacity(8192),
            max_frame_size,
        }
    }

    /// Encode a frame with its length prefix
    pub fn encode_frame(&self, frame: &PublishFrame) -> Result<Bytes, ProtocolError> {
        let body = frame.encode_body()?;
        let body_len = self.prefix_for(body.len())?;

        let mut buf = BytesMut::with_capacity(LENGTH_PREFIX + body.len());
        buf.put_u32(body_len);
        buf.put_slice(&body);
        Ok(buf.freeze())
    }

    /// Write a frame to an async writer.
    ///
    /// The frame goes out in a single `write_all`, so callers holding
    /// exclusive access to the writer never interleave frames.
    pub async fn write_frame<W>(&self, writer: &mut W, frame: &PublishFrame) -> Result<(), ProtocolError>
    where
        W: AsyncWrite + Unpin,
    {
        let encoded = self.encode_frame(frame)?;
        writer.write_all(&encoded).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read the next frame, or `None` on a clean end of stream.
    ///
    /// A body that fails to decode is consumed before the error is returned,
    /// so the caller may keep reading after [`ProtocolError::InvalidFrame`].
    pub async fn read_frame<R>(&mut self, reader: &mut R) -> Result<Option<PublishFrame>, ProtocolError>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            if let Some(frame) = self.try_decode_frame()? {
                return Ok(Some(frame));
            }

            if reader.read_buf(&mut self.read_buf).await? == 0 {
                return match self.read_buf.len() {
                    0 => Ok(None),
                    buffered => {
                        self.read_buf.clear();
                        Err(ProtocolError::Truncated(buffered))
                    }
                };
            }
        }
    }

    /// Decode one frame from the bytes buffered so far
    pub fn try_decode_frame(&mut self) -> Result<Option<PublishFrame>, ProtocolError> {
        let mut prefix = &self.read_buf[..];
        if prefix.remaining() < LENGTH_PREFIX {
            return Ok(None);
        }
        let body_len = prefix.get_u32() as usize;
        if body_len > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: body_len,
                max: self.max_frame_size,
            });
        }

        let frame_len = LENGTH_PREFIX + body_len;
        if self.read_buf.len() < frame_len {
            self.read_buf.reserve(frame_len - self.read_buf.len());
            return Ok(None);
        }

        let mut frame = self.read_buf.split_to(frame_len);
        frame.advance(LENGTH_PREFIX);
        PublishFrame::decode_body(frame.freeze()).map(Some)
    }

    fn prefix_for(&self, size: usize) -> Result<u32, ProtocolError> {
        if size > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge { size, max: self.max_frame_size });
        }
        u32::try_from(size).map_err(|_| ProtocolError::FrameTooLarge {
            size,
            max: u32::MAX as usize,
        })
    }
}
