//! General-purpose byte compressors.
//!
//! Both lay out the wire buffer as a 4-byte little-endian uncompressed
//! length followed by the compressed stream, so a decoder can reject
//! streams that inflate to the wrong size. Decoded output is capped at
//! `max_output` bytes (default [`MAX_PAYLOAD_SIZE`]) and inflation stops
//! one byte past the declared length.

use std::io::{Read, Write};

use bytes::Bytes;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use super::{CodecPolicy, split_length_prefix, with_length_prefix};
use crate::error::NtwkError;
use crate::frame::MAX_PAYLOAD_SIZE;

// ── Zlib ─────────────────────────────────────────────────────────

/// Deflate / inflate with a zlib wrapper.
#[derive(Debug, Clone, Copy)]
pub struct Zlib {
    /// 0 (store) ..= 9 (best).
    level: u32,
    max_output: usize,
}

impl Zlib {
    pub fn new(level: u32) -> Self {
        Self {
            level: level.min(9),
            max_output: MAX_PAYLOAD_SIZE,
        }
    }

    /// Largest decoded buffer accepted from a peer.
    pub fn with_max_output(mut self, max_output: usize) -> Self {
        self.max_output = max_output;
        self
    }
}

impl Default for Zlib {
    fn default() -> Self {
        Self::new(6)
    }
}

impl CodecPolicy for Zlib {
    type Message = Bytes;

    fn encode(&self, msg: &Bytes) -> Result<Bytes, NtwkError> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(self.level));
        encoder
            .write_all(msg)
            .map_err(|e| NtwkError::codec(format!("zlib encode failed: {e}")))?;
        let body = encoder
            .finish()
            .map_err(|e| NtwkError::codec(format!("zlib encode failed: {e}")))?;
        with_length_prefix(msg.len(), &body)
    }

    fn decode(&self, wire: Bytes) -> Result<Bytes, NtwkError> {
        let (expected, body) = split_length_prefix(&wire, self.max_output)?;
        inflate_exact("zlib", ZlibDecoder::new(body), expected)
    }
}

// ── Zstd ─────────────────────────────────────────────────────────

/// Zstandard compression (level 1 favours speed).
#[derive(Debug, Clone, Copy)]
pub struct Zstd {
    level: i32,
    max_output: usize,
}

impl Zstd {
    pub fn new(level: i32) -> Self {
        Self {
            level,
            max_output: MAX_PAYLOAD_SIZE,
        }
    }

    /// Largest decoded buffer accepted from a peer.
    pub fn with_max_output(mut self, max_output: usize) -> Self {
        self.max_output = max_output;
        self
    }
}

impl Default for Zstd {
    fn default() -> Self {
        Self::new(1)
    }
}

impl CodecPolicy for Zstd {
    type Message = Bytes;

    fn encode(&self, msg: &Bytes) -> Result<Bytes, NtwkError> {
        let body = zstd::encode_all(msg.as_ref(), self.level)
            .map_err(|e| NtwkError::codec(format!("zstd encode failed: {e}")))?;
        with_length_prefix(msg.len(), &body)
    }

    fn decode(&self, wire: Bytes) -> Result<Bytes, NtwkError> {
        let (expected, body) = split_length_prefix(&wire, self.max_output)?;
        let decoder = zstd::stream::read::Decoder::new(body)
            .map_err(|e| NtwkError::codec(format!("zstd decode failed: {e}")))?;
        inflate_exact("zstd", decoder, expected)
    }
}

/// Inflate exactly `expected` bytes from `reader`.
///
/// Reads at most one byte past `expected`, so an over-long stream is
/// rejected without being expanded.
fn inflate_exact(name: &str, reader: impl Read, expected: usize) -> Result<Bytes, NtwkError> {
    let mut out = Vec::with_capacity(expected);
    reader
        .take(expected as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| NtwkError::codec(format!("{name} decode failed: {e}")))?;

    if out.len() > expected {
        return Err(NtwkError::codec(format!(
            "{name} stream inflates past the declared {expected} bytes"
        )));
    }
    if out.len() < expected {
        return Err(NtwkError::codec(format!(
            "{name} inflated to {} bytes, expected {expected}",
            out.len()
        )));
    }
    Ok(Bytes::from(out))
}

// ── Tests ────────────────────────────────────────────────────────
