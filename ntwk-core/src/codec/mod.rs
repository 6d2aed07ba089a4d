//! Stream framing for `tokio_util::codec::Framed`.
//!
//! Each direction of a connection carries a different item:
//!
//! ```text
//! publisher ──[ header | payload ]──► subscriber
//! publisher ◄────────[ ACK ]──────── subscriber
//! ```
//!
//! [`SubscriberCodec`] decodes frames and encodes control bytes;
//! [`PublisherCodec`] is its mirror image.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::NtwkError;
use crate::frame::{Frame, MAX_PAYLOAD_SIZE};
use crate::header::MsgHeader;
use crate::message::MsgCtrl;

// ── SubscriberCodec ──────────────────────────────────────────────

/// Receiving side: incremental header-then-payload decoder.
#[derive(Debug)]
pub struct SubscriberCodec {
    max_payload: usize,
    /// Header already consumed from the buffer, awaiting its payload.
    pending: Option<MsgHeader>,
}

impl SubscriberCodec {
    pub fn new(max_payload: usize) -> Self {
        Self {
            max_payload,
            pending: None,
        }
    }
}

impl Default for SubscriberCodec {
    fn default() -> Self {
        Self::new(MAX_PAYLOAD_SIZE)
    }
}

impl Decoder for SubscriberCodec {
    type Item = Frame;
    type Error = NtwkError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let header = match self.pending {
            Some(header) => header,
            None => {
                if src.len() < MsgHeader::SIZE {
                    src.reserve(MsgHeader::SIZE - src.len());
                    return Ok(None);
                }
                let header = MsgHeader::decode(&src[..MsgHeader::SIZE])?;
                if header.msg_size as usize > self.max_payload {
                    return Err(NtwkError::PayloadTooLarge {
                        size: header.msg_size as usize,
                        max: self.max_payload,
                    });
                }
                src.advance(MsgHeader::SIZE);
                self.pending = Some(header);
                header
            }
        };

        let size = header.msg_size as usize;
        if src.len() < size {
            src.reserve(size - src.len());
            return Ok(None);
        }

        self.pending = None;
        let payload = src.split_to(size).freeze();
        Ok(Some(Frame {
            msg_type: header.msg_type,
            payload,
        }))
    }
}

impl Encoder<MsgCtrl> for SubscriberCodec {
    type Error = NtwkError;

    fn encode(&mut self, item: MsgCtrl, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.put_u8(item as u8);
        Ok(())
    }
}

// ── PublisherCodec ───────────────────────────────────────────────

/// Sending side: frame encoder and ACK decoder.
#[derive(Debug)]
pub struct PublisherCodec {
    max_payload: usize,
}

impl PublisherCodec {
    pub fn new(max_payload: usize) -> Self {
        Self { max_payload }
    }
}

impl Default for PublisherCodec {
    fn default() -> Self {
        Self::new(MAX_PAYLOAD_SIZE)
    }
}

impl Encoder<Frame> for PublisherCodec {
    type Error = NtwkError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.payload.len() > self.max_payload {
            return Err(NtwkError::PayloadTooLarge {
                size: item.payload.len(),
                max: self.max_payload,
            });
        }
        let header = item.header()?;
        dst.reserve(item.wire_len());
        dst.extend_from_slice(&header.encode());
        dst.extend_from_slice(&item.payload);
        Ok(())
    }
}

impl Decoder for PublisherCodec {
    type Item = MsgCtrl;
    type Error = NtwkError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        let byte = src.get_u8();
        MsgCtrl::try_from(byte).map(Some).map_err(|_| NtwkError::UnexpectedAck(byte))
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MsgTypeId;

    fn encode_all(frames: &[Frame]) -> BytesMut {
        let mut codec = PublisherCodec::default();
        let mut buf = BytesMut::new();
        for f in frames {
            codec.encode(f.clone(), &mut buf).unwrap();
        }
        buf
    }

    #[test]
    fn decodes_from_single_byte_chunks() {
        let frames = vec![
            Frame::new(MsgTypeId::Image, vec![1u8; 300]),
            Frame::new(MsgTypeId::Vector3, Vec::new()),
            Frame::new(MsgTypeId::Twist, vec![7u8, 8, 9]),
        ];
        let wire = encode_all(&frames);

        let mut codec = SubscriberCodec::default();
        let mut src = BytesMut::new();
        let mut out = Vec::new();
        for byte in wire.iter() {
            src.put_u8(*byte);
            while let Some(frame) = codec.decode(&mut src).unwrap() {
                out.push(frame);
            }
        }

        assert_eq!(out, frames);
        assert!(src.is_empty());
    }

    #[test]
    fn zero_length_payload_yields_immediately() {
        let wire = encode_all(&[Frame::new(MsgTypeId::Joystick, Vec::new())]);
        assert_eq!(wire.len(), MsgHeader::SIZE);

        let mut codec = SubscriberCodec::default();
        let mut src = wire;
        let frame = codec.decode(&mut src).unwrap().unwrap();
        assert_eq!(frame.msg_type, MsgTypeId::Joystick);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn oversized_header_is_rejected() {
        let mut src = BytesMut::new();
        src.extend_from_slice(&MsgHeader::new(MsgTypeId::Image, 2048).encode());

        let mut codec = SubscriberCodec::new(1024);
        assert!(matches!(
            codec.decode(&mut src),
            Err(NtwkError::PayloadTooLarge { size: 2048, max: 1024 })
        ));
    }

    #[test]
    fn publisher_rejects_oversized_frame() {
        let mut codec = PublisherCodec::new(4);
        let mut buf = BytesMut::new();
        let err = codec
            .encode(Frame::new(MsgTypeId::Uint8Array, vec![0u8; 5]), &mut buf)
            .unwrap_err();
        assert!(matches!(err, NtwkError::PayloadTooLarge { .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn ack_roundtrip_and_garbage() {
        let mut sub = SubscriberCodec::default();
        let mut buf = BytesMut::new();
        sub.encode(MsgCtrl::Ack, &mut buf).unwrap();
        assert_eq!(&buf[..], &[0x06]);

        let mut publisher = PublisherCodec::default();
        assert_eq!(publisher.decode(&mut buf).unwrap(), Some(MsgCtrl::Ack));
        assert_eq!(publisher.decode(&mut buf).unwrap(), None);

        let mut garbage = BytesMut::from(&[0x42u8][..]);
        assert!(matches!(
            publisher.decode(&mut garbage),
            Err(NtwkError::UnexpectedAck(0x42))
        ));
    }
}
