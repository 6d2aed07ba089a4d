//! Fixed-size message header.
//!
//! ## Wire format
//!
//! ```text
//! msg_type_id: u32  (4)
//! msg_size:    u32  (4)
//! ```
//!
//! Both fields little-endian, no padding. Exactly `msg_size` payload
//! bytes follow every header.

use crate::error::NtwkError;
use crate::message::MsgTypeId;

/// Header preceding every payload on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgHeader {
    pub msg_type: MsgTypeId,
    pub msg_size: u32,
}

impl MsgHeader {
    /// Encoded size on the wire.
    pub const SIZE: usize = 8;

    pub fn new(msg_type: MsgTypeId, msg_size: u32) -> Self {
        Self { msg_type, msg_size }
    }

    /// Serialize to bytes (little-endian).
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.msg_type.as_u32().to_le_bytes());
        buf[4..8].copy_from_slice(&self.msg_size.to_le_bytes());
        buf
    }

    /// Deserialize from bytes. Extra trailing bytes are ignored.
    pub fn decode(data: &[u8]) -> Result<Self, NtwkError> {
        if data.len() < Self::SIZE {
            return Err(NtwkError::InvalidHeader("fewer than 8 header bytes"));
        }
        let mut id = [0u8; 4];
        id.copy_from_slice(&data[0..4]);
        let mut size = [0u8; 4];
        size.copy_from_slice(&data[4..8]);

        Ok(Self {
            msg_type: MsgTypeId::try_from(u32::from_le_bytes(id))?,
            msg_size: u32::from_le_bytes(size),
        })
    }
}
