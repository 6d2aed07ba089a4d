//! Station service core logic.
//!
//! Runs either end of the camera link: a publisher streaming the test
//! pattern at the configured rate, or a subscriber pumping its node and
//! reporting what arrives. Both loops block the calling thread until
//! stopped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::{debug, info};

use ntwk_core::{CodecPolicy, Image, MsgTypeId, Node, NtwkError, Rate, Received};

use crate::config::StationConfig;
use crate::meter::ThroughputMeter;
use crate::pattern::TestPattern;

/// Subscriber pump rate when the camera rate is lower.
const MIN_PUMP_HZ: u32 = 100;

// ── StationService ───────────────────────────────────────────────

/// The top-level station service.
pub struct StationService {
    config: StationConfig,
    running: Arc<AtomicBool>,
    /// Frames published or delivered, depending on the mode.
    frames: Arc<AtomicU64>,
}

impl StationService {
    pub fn new(config: StationConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            frames: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Obtain a handle that can be used to stop the service from
    /// another thread or a signal handler.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Frames handled so far.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Stream the test pattern until stopped.
    pub fn run_publisher(&self) -> Result<(), NtwkError> {
        self.running.store(true, Ordering::SeqCst);

        let camera = &self.config.camera;
        let policy = camera.policy()?;
        let mut pattern = TestPattern::new(camera.width, camera.height, camera.channels)?;
        let mut rate = Rate::new(camera.fps)?;

        let node = Node::with_config(self.config.node.clone())?;
        let publisher = node.advertise(self.config.network.port)?;
        info!(
            addr = %publisher.local_addr(),
            %policy,
            "streaming {}x{}x{} at {} fps",
            camera.width, camera.height, camera.channels, camera.fps
        );

        let mut meter = ThroughputMeter::new();
        while self.is_running() {
            let frame = pattern.next_frame();
            let wire = policy.encode(&frame)?;
            meter.record(wire.len() as u64);
            publisher.publish(MsgTypeId::Image, wire)?;
            self.frames.fetch_add(1, Ordering::Relaxed);

            if meter.report_due() {
                let stats = publisher.stats();
                info!(
                    fps = format_args!("{:.1}", meter.frames_per_sec()),
                    kib_per_sec = meter.bytes_per_sec() / 1024,
                    peers = publisher.connection_count(),
                    sent = stats.frames_sent,
                    superseded = stats.superseded,
                    "publishing"
                );
            }
            rate.sleep();
        }

        publisher.shutdown();
        info!(frames = pattern.frame_index(), "publisher stopped");
        Ok(())
    }

    /// Subscribe to the configured publisher and report frames until
    /// stopped.
    pub fn run_subscriber(&self) -> Result<(), NtwkError> {
        self.running.store(true, Ordering::SeqCst);

        let policy = self.config.camera.policy()?;
        let node = Node::with_config(self.config.node.clone())?;
        let host = self.config.network.host.as_str();
        let port = self.config.network.port;

        let frames = Arc::clone(&self.frames);
        let mut meter = ThroughputMeter::new();
        let handler = move |msg: Received<Image>| {
            let img = msg.payload;
            meter.record(img.data.len() as u64);
            frames.fetch_add(1, Ordering::Relaxed);
            debug!(width = img.width, height = img.height, channels = img.channels, "frame");
            if meter.report_due() {
                info!(
                    fps = format_args!("{:.1}", meter.frames_per_sec()),
                    kib_per_sec = meter.bytes_per_sec() / 1024,
                    "{}x{}x{} frames",
                    img.width, img.height, img.channels
                );
            }
        };

        let subscriber = node.subscribe(host, port, handler, self.config.queue_size(), policy)?;
        info!(endpoint = %subscriber.endpoint(), %policy, "subscriber started");

        let mut rate = Rate::new(self.config.camera.fps.max(MIN_PUMP_HZ))?;
        while self.is_running() {
            node.run_once();
            rate.sleep();
        }

        let stats = subscriber.stats();
        subscriber.shutdown();
        info!(
            received = stats.received,
            dropped = stats.dropped,
            reconnects = stats.connections.saturating_sub(1),
            "subscriber stopped"
        );
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
