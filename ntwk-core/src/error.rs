//! Domain-specific error types for the ntwk transport.
//!
//! All fallible operations return `Result<T, NtwkError>`.
//! Transport and codec failures inside the I/O loops are recovered
//! locally (reconnect / socket removal); only setup errors and explicit
//! encode calls surface to application code.

use std::net::SocketAddr;

use thiserror::Error;

/// Shorthand result type used across the crate.
pub type Result<T> = std::result::Result<T, NtwkError>;

/// The canonical error type for the ntwk transport.
#[derive(Debug, Error)]
pub enum NtwkError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u64 },

    /// A message header could not be parsed.
    #[error("invalid header: {0}")]
    InvalidHeader(&'static str),

    /// A state transition was attempted from the wrong phase.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// The peer answered a message with something other than ACK.
    #[error("unexpected control byte {0:#04x}, expected ACK")]
    UnexpectedAck(u8),

    /// The payload exceeds the configured maximum size.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// A host name did not resolve to any socket address.
    #[error("failed to resolve {0}")]
    Resolve(String),

    /// The peer closed the stream.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// The owning node or object has been shut down.
    #[error("transport shut down")]
    Shutdown,

    // ── Codec Errors ─────────────────────────────────────────────
    /// Encoding or decoding of a payload failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// The image channel count has no matching pixel format.
    #[error("unsupported channel count: {0}")]
    UnsupportedChannels(u8),

    /// Pixel buffer length disagrees with the image dimensions.
    #[error("image buffer holds {actual} bytes, dimensions require {expected}")]
    ImageSize { expected: usize, actual: usize },

    // ── Setup Errors ─────────────────────────────────────────────
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl NtwkError {
    /// Shorthand for [`NtwkError::Codec`].
    pub fn codec(msg: impl Into<String>) -> Self {
        NtwkError::Codec(msg.into())
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<Box<bincode::ErrorKind>> for NtwkError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        NtwkError::Codec(e.to_string())
    }
}

impl From<image::ImageError> for NtwkError {
    fn from(e: image::ImageError) -> Self {
        NtwkError::Codec(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = NtwkError::PayloadTooLarge {
            size: 1000,
            max: 500,
        };
        assert!(e.to_string().contains("1000"));
        assert!(e.to_string().contains("500"));

        let e = NtwkError::UnexpectedAck(0x15);
        assert!(e.to_string().contains("0x15"));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: NtwkError = io_err.into();
        assert!(matches!(e, NtwkError::Io(_)));
    }

    #[test]
    fn from_bincode() {
        let err = bincode::deserialize::<u64>(&[1, 2]).unwrap_err();
        let e: NtwkError = err.into();
        assert!(matches!(e, NtwkError::Codec(_)));
    }
}
