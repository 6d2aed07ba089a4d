//! Subscriber link state machine.
//!
//! Transitions are validated and return `Result` instead of panicking.

use std::time::{Duration, Instant};

use crate::error::NtwkError;

// ── LinkPhase ────────────────────────────────────────────────────

/// The current phase of a subscriber's outbound connection.
///
/// ```text
///  Disconnected ──► Connecting ──► Connected
///       ▲               │              │
///       └───────────────┴──────────────┘
///            (connect failure / any read, decode or ACK error)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkPhase {
    /// No socket. Initial state and the state between retries.
    #[default]
    Disconnected,

    /// An async connect is in flight.
    Connecting,

    /// The socket is up and the receive loop is running.
    Connected {
        /// When the link entered `Connected`.
        since: Instant,
    },
}

impl std::fmt::Display for LinkPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected { .. } => write!(f, "Connected"),
        }
    }
}

impl LinkPhase {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// How long the link has been up. `None` unless connected.
    pub fn uptime(&self) -> Option<Duration> {
        match self {
            Self::Connected { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Connecting`.
    ///
    /// Valid from: `Disconnected`.
    pub fn begin_connect(&mut self) -> Result<(), NtwkError> {
        match self {
            Self::Disconnected => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(NtwkError::ProtocolViolation(
                "cannot connect: not in Disconnected state",
            )),
        }
    }

    /// Transition to `Connected`.
    ///
    /// Valid from: `Connecting`.
    pub fn establish(&mut self) -> Result<(), NtwkError> {
        match self {
            Self::Connecting => {
                *self = Self::Connected {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(NtwkError::ProtocolViolation(
                "cannot establish: not in Connecting state",
            )),
        }
    }

    /// Transition to `Disconnected` after a failure.
    ///
    /// Valid from: `Connecting`, `Connected`.
    pub fn drop_link(&mut self) -> Result<(), NtwkError> {
        match self {
            Self::Connecting | Self::Connected { .. } => {
                *self = Self::Disconnected;
                Ok(())
            }
            Self::Disconnected => Err(NtwkError::ProtocolViolation(
                "cannot drop link: already Disconnected",
            )),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
