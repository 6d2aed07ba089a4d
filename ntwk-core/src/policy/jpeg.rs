//! Lossy JPEG image policy.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::{JpegDecoder, JpegEncoder};
use image::{ColorType, ExtendedColorType, ImageDecoder};

use super::CodecPolicy;
use crate::error::NtwkError;
use crate::frame::MAX_PAYLOAD_SIZE;
use crate::msgs::Image;

/// Quality used when none is configured.
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// JPEG compression of camera frames.
///
/// Channel mapping: 1 → gray, 3 → RGB, 4 → RGBA. JPEG has no alpha
/// plane, so RGBA input is flattened to RGB and decodes as 3 channels.
/// Only 1- and 3-component streams decode; CMYK and YCCK are rejected.
///
/// Decoded frames larger than `max_output` bytes (default
/// [`MAX_PAYLOAD_SIZE`]) are rejected from the header alone.
#[derive(Debug, Clone, Copy)]
pub struct Jpeg {
    quality: u8,
    max_output: usize,
}

impl Jpeg {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            max_output: MAX_PAYLOAD_SIZE,
        }
    }

    /// Largest decoded pixel buffer accepted from a peer.
    pub fn with_max_output(mut self, max_output: usize) -> Self {
        self.max_output = max_output;
        self
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for Jpeg {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl CodecPolicy for Jpeg {
    type Message = Image;

    fn encode(&self, msg: &Image) -> Result<Bytes, NtwkError> {
        let color = match msg.channels {
            1 => ExtendedColorType::L8,
            3 | 4 => ExtendedColorType::Rgb8,
            other => return Err(NtwkError::UnsupportedChannels(other)),
        };
        msg.validate()?;

        let rgb;
        let pixels: &[u8] = if msg.channels == 4 {
            rgb = strip_alpha(&msg.data);
            &rgb
        } else {
            &msg.data
        };

        let mut out = Vec::with_capacity(msg.byte_len() / 4);
        JpegEncoder::new_with_quality(&mut out, self.quality).encode(
            pixels,
            msg.width,
            msg.height,
            color,
        )?;
        Ok(Bytes::from(out))
    }

    fn decode(&self, wire: Bytes) -> Result<Image, NtwkError> {
        // The decoder reports CMYK as RGB, so check the frame header itself.
        match frame_header_offset(&wire).and_then(|at| wire.get(at + 9).copied()) {
            Some(1 | 3) => {}
            Some(n) => {
                return Err(NtwkError::codec(format!("jpeg with {n} colour components")));
            }
            None => return Err(NtwkError::codec("jpeg has no frame header")),
        }

        let decoder = JpegDecoder::new(Cursor::new(wire.as_ref()))?;
        let (width, height) = decoder.dimensions();
        let channels = match decoder.color_type() {
            ColorType::L8 => 1u8,
            ColorType::Rgb8 => 3u8,
            other => {
                return Err(NtwkError::codec(format!(
                    "unsupported jpeg colour type {other:?}"
                )));
            }
        };

        let expected = width as u64 * height as u64 * channels as u64;
        if expected > self.max_output as u64 {
            return Err(NtwkError::codec(format!(
                "jpeg {width}x{height}x{channels} exceeds the {} byte limit",
                self.max_output
            )));
        }
        if decoder.total_bytes() != expected {
            return Err(NtwkError::ImageSize {
                expected: expected as usize,
                actual: decoder.total_bytes() as usize,
            });
        }

        let mut data = vec![0u8; expected as usize];
        decoder.read_image(&mut data)?;

        Ok(Image::new(width, height, channels, data))
    }
}

/// Position of the first SOFn marker, or `None` if scanning reaches the
/// image data without one.
///
/// Frame header layout after the marker: length (2), precision (1),
/// height (2), width (2), component count (1).
fn frame_header_offset(jpeg: &[u8]) -> Option<usize> {
    if !jpeg.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut at = 2;
    while at + 4 <= jpeg.len() {
        if jpeg[at] != 0xFF {
            return None;
        }
        let marker = jpeg[at + 1];
        match marker {
            // Fill byte.
            0xFF => {
                at += 1;
                continue;
            }
            // Standalone markers carry no length.
            0x01 | 0xD0..=0xD7 => {
                at += 2;
                continue;
            }
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => return Some(at),
            // Start of scan or end of image before any frame header.
            0xDA | 0xD9 => return None,
            _ => {}
        }
        let len = u16::from_be_bytes([jpeg[at + 2], jpeg[at + 3]]) as usize;
        at += 2 + len;
    }
    None
}

fn strip_alpha(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for px in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
    }
    rgb
}
