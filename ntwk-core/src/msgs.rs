//! Typed message schemas.
//!
//! These are the application payloads carried inside frames. Sensor
//! and control types are `bincode`-encoded through
//! [`Bincode`](crate::policy::Bincode); images go through an image
//! policy ([`RawImage`](crate::policy::RawImage), [`Jpeg`](crate::policy::Jpeg), ...).

use serde::{Deserialize, Serialize};

use crate::error::NtwkError;
use crate::message::MsgTypeId;

/// Binds a schema type to the message type id it travels under.
pub trait Schema {
    const MSG_TYPE: MsgTypeId;
}

// ── Image ────────────────────────────────────────────────────────

/// A tightly packed pixel buffer: `height` rows of `width * channels` bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    /// Interleaved channels per pixel (1 = gray, 3 = RGB, 4 = RGBA).
    pub channels: u8,
    pub data: Vec<u8>,
}

impl Image {
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels,
            data,
        }
    }

    /// Bytes required by the dimensions.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }

    /// Checks that `data` matches the dimensions.
    pub fn validate(&self) -> Result<(), NtwkError> {
        if self.data.len() != self.byte_len() {
            return Err(NtwkError::ImageSize {
                expected: self.byte_len(),
                actual: self.data.len(),
            });
        }
        Ok(())
    }
}

impl Schema for Image {
    const MSG_TYPE: MsgTypeId = MsgTypeId::Image;
}

// ── Geometry / control ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl Schema for Vector3 {
    const MSG_TYPE: MsgTypeId = MsgTypeId::Vector3;
}

/// Velocity command: linear m/s and angular rad/s.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Twist {
    pub linear: Vector3,
    pub angular: Vector3,
}

impl Schema for Twist {
    const MSG_TYPE: MsgTypeId = MsgTypeId::Twist;
}

/// Joystick deflection, each axis in `-1.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Joystick {
    pub x: f32,
    pub y: f32,
}

impl Schema for Joystick {
    const MSG_TYPE: MsgTypeId = MsgTypeId::Joystick;
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Uint8Array {
    pub data: Vec<u8>,
}

impl Schema for Uint8Array {
    const MSG_TYPE: MsgTypeId = MsgTypeId::Uint8Array;
}
