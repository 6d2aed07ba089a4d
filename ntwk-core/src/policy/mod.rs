//! Codec policies: paired encode/decode strategies applied to every
//! payload of one channel.
//!
//! | Policy             | Message          | Wire form                          |
//! |--------------------|------------------|------------------------------------|
//! | [`Identity`]       | `Bytes`          | unchanged                          |
//! | [`Zlib`]           | `Bytes`          | `u32` length + zlib stream         |
//! | [`Zstd`]           | `Bytes`          | `u32` length + zstd frame          |
//! | [`RawImage`]       | [`Image`]        | bincode-encoded image schema       |
//! | [`Jpeg`]           | [`Image`]        | baseline JPEG                      |
//! | [`Bincode<T>`]     | `T`              | bincode-encoded schema             |
//! | [`ImageCompression`] | [`Image`]      | runtime choice of the image forms  |
//!
//! A policy never changes framing, only the payload bytes and hence
//! the header's `msg_size`. Decode failures on the receive path are
//! treated as a desynchronised connection.

mod compress;
mod jpeg;
mod serialized;

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use crate::error::NtwkError;
use crate::msgs::Image;

pub use compress::{Zlib, Zstd};
pub use jpeg::{DEFAULT_JPEG_QUALITY, Jpeg};
pub use serialized::{Bincode, RawImage};

/// Encode/decode capability pair selected per channel.
pub trait CodecPolicy: Send + Sync + 'static {
    /// The decoded application payload.
    type Message: Send + 'static;

    fn encode(&self, msg: &Self::Message) -> Result<Bytes, NtwkError>;

    fn decode(&self, wire: Bytes) -> Result<Self::Message, NtwkError>;
}

// ── Identity ─────────────────────────────────────────────────────

/// Payload bytes pass through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl CodecPolicy for Identity {
    type Message = Bytes;

    fn encode(&self, msg: &Bytes) -> Result<Bytes, NtwkError> {
        Ok(msg.clone())
    }

    fn decode(&self, wire: Bytes) -> Result<Bytes, NtwkError> {
        Ok(wire)
    }
}

// ── ImageCompression ─────────────────────────────────────────────

/// Image policy chosen at runtime, e.g. from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageCompression {
    /// Raw image schema.
    #[default]
    None,
    /// Raw image schema, deflated.
    Zlib,
    /// Raw image schema, zstd-compressed.
    Zstd,
    /// Lossy JPEG at the given quality (1..=100).
    Jpeg { quality: u8 },
}

impl CodecPolicy for ImageCompression {
    type Message = Image;

    fn encode(&self, msg: &Image) -> Result<Bytes, NtwkError> {
        match self {
            ImageCompression::None => RawImage.encode(msg),
            ImageCompression::Zlib => Zlib::default().encode(&RawImage.encode(msg)?),
            ImageCompression::Zstd => Zstd::default().encode(&RawImage.encode(msg)?),
            ImageCompression::Jpeg { quality } => Jpeg::new(*quality).encode(msg),
        }
    }

    fn decode(&self, wire: Bytes) -> Result<Image, NtwkError> {
        match self {
            ImageCompression::None => RawImage.decode(wire),
            ImageCompression::Zlib => RawImage.decode(Zlib::default().decode(wire)?),
            ImageCompression::Zstd => RawImage.decode(Zstd::default().decode(wire)?),
            ImageCompression::Jpeg { quality } => Jpeg::new(*quality).decode(wire),
        }
    }
}

impl FromStr for ImageCompression {
    type Err = NtwkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "identity" => Ok(ImageCompression::None),
            "zlib" => Ok(ImageCompression::Zlib),
            "zstd" => Ok(ImageCompression::Zstd),
            "jpeg" | "jpg" => Ok(ImageCompression::Jpeg {
                quality: DEFAULT_JPEG_QUALITY,
            }),
            other => Err(NtwkError::InvalidConfig(format!(
                "unknown image compression {other:?}"
            ))),
        }
    }
}

impl fmt::Display for ImageCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageCompression::None => write!(f, "none"),
            ImageCompression::Zlib => write!(f, "zlib"),
            ImageCompression::Zstd => write!(f, "zstd"),
            ImageCompression::Jpeg { quality } => write!(f, "jpeg(q={quality})"),
        }
    }
}

// ── Length prefix helpers ────────────────────────────────────────

/// Prepend the uncompressed length used to validate inflation.
fn with_length_prefix(raw_len: usize, body: &[u8]) -> Result<Bytes, NtwkError> {
    let len = u32::try_from(raw_len).map_err(|_| NtwkError::PayloadTooLarge {
        size: raw_len,
        max: u32::MAX as usize,
    })?;
    let mut out = Vec::with_capacity(4 + body.len());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(body);
    Ok(Bytes::from(out))
}

/// Split a length-prefixed buffer into `(expected_len, body)`.
///
/// The declared length comes from the peer and is checked against
/// `limit` before anything is allocated for it.
fn split_length_prefix(wire: &[u8], limit: usize) -> Result<(usize, &[u8]), NtwkError> {
    if wire.len() < 4 {
        return Err(NtwkError::codec("compressed buffer shorter than its length prefix"));
    }
    let mut len = [0u8; 4];
    len.copy_from_slice(&wire[..4]);
    let len = u32::from_le_bytes(len) as usize;
    if len > limit {
        return Err(NtwkError::codec(format!(
            "declared length {len} exceeds the {limit} byte limit"
        )));
    }
    Ok((len, &wire[4..]))
}

// ── Tests ────────────────────────────────────────────────────────
