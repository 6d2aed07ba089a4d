//! Message type identifiers and control bytes.
//!
//! Uses closed enums with `TryFrom`; no panics on unknown values.

use std::fmt;

use crate::error::NtwkError;

// ── MsgTypeId ────────────────────────────────────────────────────

/// Identifies the schema of the payload following a header.
///
/// One TCP stream multiplexes every type; backpressure is tracked per
/// type per socket.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MsgTypeId {
    /// Camera / pixel buffer.
    Image = 0,
    /// Two-axis joystick input.
    Joystick = 1,
    /// Control message.
    MsgCtrl = 2,
    /// Linear + angular velocity command.
    Twist = 3,
    /// Opaque byte array.
    Uint8Array = 4,
    /// Three-component vector.
    Vector3 = 5,
}

impl MsgTypeId {
    /// The on-wire discriminant.
    pub const fn as_u32(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for MsgTypeId {
    type Error = NtwkError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MsgTypeId::Image),
            1 => Ok(MsgTypeId::Joystick),
            2 => Ok(MsgTypeId::MsgCtrl),
            3 => Ok(MsgTypeId::Twist),
            4 => Ok(MsgTypeId::Uint8Array),
            5 => Ok(MsgTypeId::Vector3),
            _ => Err(NtwkError::UnknownVariant {
                type_name: "MsgTypeId",
                value: value as u64,
            }),
        }
    }
}

impl fmt::Display for MsgTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ── MsgCtrl ──────────────────────────────────────────────────────

/// Single-byte control signal sent from receiver back to sender.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgCtrl {
    /// Payload fully received and handed off; the sender may send the
    /// next message on this socket.
    Ack = 0x06,
}

impl MsgCtrl {
    /// Encoded size on the wire.
    pub const SIZE: usize = 1;
}

impl TryFrom<u8> for MsgCtrl {
    type Error = NtwkError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x06 => Ok(MsgCtrl::Ack),
            _ => Err(NtwkError::UnknownVariant {
                type_name: "MsgCtrl",
                value: value as u64,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msg_type_discriminants_are_stable() {
        let all = [
            MsgTypeId::Image,
            MsgTypeId::Joystick,
            MsgTypeId::MsgCtrl,
            MsgTypeId::Twist,
            MsgTypeId::Uint8Array,
            MsgTypeId::Vector3,
        ];
        for (i, t) in all.iter().enumerate() {
            assert_eq!(t.as_u32(), i as u32);
            assert_eq!(MsgTypeId::try_from(i as u32).unwrap(), *t);
        }
    }

    #[test]
    fn msg_type_invalid() {
        let err = MsgTypeId::try_from(6).unwrap_err();
        assert!(err.to_string().contains("MsgTypeId"));
    }

    #[test]
    fn msg_ctrl_only_accepts_ack() {
        assert_eq!(MsgCtrl::try_from(0x06).unwrap(), MsgCtrl::Ack);
        assert!(MsgCtrl::try_from(0x00).is_err());
        assert!(MsgCtrl::try_from(0x15).is_err());
    }

    #[test]
    fn display_uses_variant_name() {
        assert_eq!(MsgTypeId::Vector3.to_string(), "Vector3");
    }
}
