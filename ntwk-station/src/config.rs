//! Configuration for the station binary.

use std::path::Path;

use serde::{Deserialize, Serialize};

use ntwk_core::{ImageCompression, NodeConfig, NtwkError};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Transport settings shared by publisher and subscriber.
    pub node: NodeConfig,
    /// Endpoint settings.
    pub network: NetworkConfig,
    /// Synthetic camera feed.
    pub camera: CameraConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Port the publisher advertises on and the subscriber dials.
    pub port: u16,
    /// Publisher host the subscriber connects to.
    pub host: String,
    /// Subscriber queue depth; 0 uses `node.default_queue_size`.
    pub queue_size: usize,
}

/// Camera feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub width: u32,
    pub height: u32,
    /// 1 = gray, 3 = RGB, 4 = RGBA.
    pub channels: u8,
    /// Frames per second.
    pub fps: u32,
    /// "none", "zlib", "zstd" or "jpeg". Both ends must agree.
    pub compression: String,
    /// JPEG quality, 1..=100.
    pub jpeg_quality: u8,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is unset.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: 9000,
            host: "127.0.0.1".into(),
            queue_size: 0,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            channels: 3,
            fps: 30,
            compression: "jpeg".into(),
            jpeg_quality: ntwk_core::policy::DEFAULT_JPEG_QUALITY,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl StationConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Effective subscriber queue depth.
    pub fn queue_size(&self) -> usize {
        match self.network.queue_size {
            0 => self.node.default_queue_size,
            n => n,
        }
    }
}

impl CameraConfig {
    /// The image policy both ends apply to the feed.
    pub fn policy(&self) -> Result<ImageCompression, NtwkError> {
        match self.compression.parse()? {
            ImageCompression::Jpeg { .. } => Ok(ImageCompression::Jpeg {
                quality: self.jpeg_quality.clamp(1, 100),
            }),
            other => Ok(other),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
