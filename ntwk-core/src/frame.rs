use bytes::Bytes;

use crate::error::NtwkError;
use crate::header::MsgHeader;
use crate::message::MsgTypeId;

/// Default upper bound on a single payload.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

/// One framed message: a header's type id plus its payload bytes.
///
/// The payload is reference counted so one published buffer can be
/// fanned out to every socket without copying.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    pub msg_type: MsgTypeId,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(msg_type: MsgTypeId, payload: impl Into<Bytes>) -> Self {
        Self {
            msg_type,
            payload: payload.into(),
        }
    }

    /// The header announcing this frame.
    pub fn header(&self) -> Result<MsgHeader, NtwkError> {
        let size = u32::try_from(self.payload.len()).map_err(|_| NtwkError::PayloadTooLarge {
            size: self.payload.len(),
            max: u32::MAX as usize,
        })?;
        Ok(MsgHeader::new(self.msg_type, size))
    }

    /// Header plus payload length.
    pub fn wire_len(&self) -> usize {
        MsgHeader::SIZE + self.payload.len()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("msg_type", &self.msg_type)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}
