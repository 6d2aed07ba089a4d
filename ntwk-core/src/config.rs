//! Node configuration.
//!
//! Every struct is `#[serde(default)]` so a partial TOML table only
//! overrides the keys it names. Durations are written as milliseconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::NtwkError;
use crate::frame::MAX_PAYLOAD_SIZE;

/// Default fixed retry interval.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(30);

/// Queue depth used when an application does not pick one.
pub const DEFAULT_QUEUE_SIZE: usize = 2;

/// Settings shared by every publisher and subscriber of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Interface publishers bind to.
    pub bind_host: String,
    /// Largest payload accepted in either direction.
    pub max_payload: usize,
    /// Disable Nagle on every socket.
    pub tcp_nodelay: bool,
    /// Subscriber queue depth for callers that do not choose one.
    pub default_queue_size: usize,
    /// Subscriber retry policy.
    pub reconnect: ReconnectConfig,
}

/// Subscriber reconnect timing.
///
/// `delay == max_delay` gives a fixed retry interval. A larger
/// `max_delay` doubles the delay after each failed attempt up to the cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    #[serde(rename = "delay_ms", with = "millis")]
    pub delay: Duration,
    #[serde(rename = "max_delay_ms", with = "millis")]
    pub max_delay: Duration,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".into(),
            max_payload: MAX_PAYLOAD_SIZE,
            tcp_nodelay: true,
            default_queue_size: DEFAULT_QUEUE_SIZE,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectConfig {
    /// Constant retry interval.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            max_delay: delay,
        }
    }

    /// Doubling retry interval starting at `delay`, capped at `max_delay`.
    pub fn exponential(delay: Duration, max_delay: Duration) -> Self {
        Self { delay, max_delay }
    }
}

// ── Validation ───────────────────────────────────────────────────

impl NodeConfig {
    /// Reject values the transport cannot run with.
    pub fn validate(&self) -> Result<(), NtwkError> {
        if self.bind_host.trim().is_empty() {
            return Err(NtwkError::InvalidConfig("bind_host is empty".into()));
        }
        if self.max_payload == 0 || self.max_payload > u32::MAX as usize {
            return Err(NtwkError::InvalidConfig(format!(
                "max_payload must be in 1..={}, got {}",
                u32::MAX,
                self.max_payload
            )));
        }
        if self.default_queue_size == 0 {
            return Err(NtwkError::InvalidConfig(
                "default_queue_size must be at least 1".into(),
            ));
        }
        self.reconnect.validate()
    }
}

impl ReconnectConfig {
    pub fn validate(&self) -> Result<(), NtwkError> {
        if self.delay.is_zero() {
            return Err(NtwkError::InvalidConfig("reconnect delay must be non-zero".into()));
        }
        if self.max_delay < self.delay {
            return Err(NtwkError::InvalidConfig(format!(
                "reconnect max_delay ({:?}) is below delay ({:?})",
                self.max_delay, self.delay
            )));
        }
        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = NodeConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.reconnect.delay, Duration::from_millis(30));
        assert_eq!(cfg.reconnect.delay, cfg.reconnect.max_delay);
        assert_eq!(cfg.default_queue_size, 2);
    }

    #[test]
    fn rejects_bad_values() {
        let cfg = NodeConfig {
            default_queue_size: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(NtwkError::InvalidConfig(_))));

        let cfg = NodeConfig {
            max_payload: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = NodeConfig {
            reconnect: ReconnectConfig::exponential(
                Duration::from_millis(100),
                Duration::from_millis(10),
            ),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        assert!(ReconnectConfig::fixed(Duration::ZERO).validate().is_err());
    }

    #[test]
    fn millis_roundtrip_through_bincode() {
        let cfg = ReconnectConfig::exponential(Duration::from_millis(30), Duration::from_secs(2));
        let bytes = bincode::serialize(&cfg).unwrap();
        let back: ReconnectConfig = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, cfg);
    }
}
