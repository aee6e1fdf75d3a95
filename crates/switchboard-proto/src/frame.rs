//! Publish frame structure

use bytes::{Buf, BufMut, Bytes, BytesMut};
use crate::ProtocolError;

/// A payload addressed to a named pub/sub channel.
///
/// Body layout: `u16` channel length (big-endian), channel bytes (UTF-8),
/// then the payload up to the end of the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishFrame {
    /// Destination channel
    pub channel: String,
    /// Frame payload
    pub payload: Bytes,
}

impl PublishFrame {
    /// Create a new frame
    pub fn new(channel: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }

    /// Encode the frame body
    pub fn encode_body(&self) -> Result<Bytes, ProtocolError> {
        let channel = self.channel.as_bytes();
        let channel_len = u16::try_from(channel.len())
            .map_err(|_| ProtocolError::ChannelTooLong(channel.len()))?;

        let mut buf = BytesMut::with_capacity(2 + channel.len() + self.payload.len());
        buf.put_u16(channel_len);
        buf.put_slice(channel);
        buf.put_slice(&self.payload);
        Ok(buf.freeze())
    }

    /// Decode a frame body
    pub fn decode_body(mut body: Bytes) -> Result<Self, ProtocolError> {
        if body.len() < 2 {
            return Err(ProtocolError::InvalidFrame);
        }
        let channel_len = body.get_u16() as usize;
        if body.len() < channel_len {
            return Err(ProtocolError::InvalidFrame);
        }

        let channel_bytes = body.split_to(channel_len);
        let channel = String::from_utf8(channel_bytes.to_vec())
            .map_err(|_| ProtocolError::InvalidFrame)?;

        Ok(Self { channel, payload: body })
    }

    /// Get the payload size
    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_body_layout() {
        let frame = PublishFrame::new("m1", Bytes::from_static(b"{}"));
        let body = frame.encode_body().unwrap();

        assert_eq!(&body[..2], &[0u8, 2]);
        assert_eq!(&body[2..4], b"m1");
        assert_eq!(&body[4..], b"{}");
    }

    #[test]
    fn test_frame_decode() {
        let frame = PublishFrame::new("rpc:agent:a1", Bytes::from("payload"));
        let decoded = PublishFrame::decode_body(frame.encode_body().unwrap()).unwrap();

        assert_eq!(decoded, frame);
        assert_eq!(decoded.payload_size(), 7);
    }

    #[test]
    fn test_empty_payload() {
        let frame = PublishFrame::new("reply", Bytes::new());
        let decoded = PublishFrame::decode_body(frame.encode_body().unwrap()).unwrap();

        assert_eq!(decoded.channel, "reply");
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_truncated_body() {
        assert!(matches!(
            PublishFrame::decode_body(Bytes::from_static(&[0])),
            Err(ProtocolError::InvalidFrame)
        ));
        assert!(matches!(
            PublishFrame::decode_body(Bytes::from_static(&[0, 10, b'a'])),
            Err(ProtocolError::InvalidFrame)
        ));
    }

    #[test]
    fn test_invalid_utf8_channel() {
        let body = Bytes::from_static(&[0, 2, 0xFF, 0xFE]);
        assert!(matches!(
            PublishFrame::decode_body(body),
            Err(ProtocolError::InvalidFrame)
        ));
    }

    #[test]
    fn test_channel_too_long() {
        let frame = PublishFrame::new("c".repeat(70_000), Bytes::new());
        assert!(matches!(
            frame.encode_body(),
            Err(ProtocolError::ChannelTooLong(70_000))
        ));
    }
}
