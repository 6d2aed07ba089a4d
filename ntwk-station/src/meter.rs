//! Throughput meter for the station's periodic reports.
//!
//! Tracks frames and bytes over a rolling window and derives the
//! current frame rate and bytes/second.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Rolling-window frame and byte counter.
pub struct ThroughputMeter {
    /// Samples: `(when, bytes)`, one per frame.
    samples: VecDeque<(Instant, u64)>,
    window: Duration,
    /// Running total of bytes in the window.
    total_bytes: u64,
    last_report: Instant,
}

impl ThroughputMeter {
    /// Create a meter with a 1-second rolling window.
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(1))
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(128),
            window,
            total_bytes: 0,
            last_report: Instant::now(),
        }
    }

    /// Record one frame of `bytes` at the current instant.
    pub fn record(&mut self, bytes: u64) {
        self.record_at(Instant::now(), bytes);
    }

    /// Record with an explicit timestamp (useful for testing).
    pub fn record_at(&mut self, when: Instant, bytes: u64) {
        self.samples.push_back((when, bytes));
        self.total_bytes += bytes;
        self.evict(when);
    }

    /// Bytes per second over the window.
    pub fn bytes_per_sec(&self) -> u64 {
        match self.span() {
            Some(span) => (self.total_bytes as f64 / span.as_secs_f64()) as u64,
            None => 0,
        }
    }

    /// Frames per second over the window.
    pub fn frames_per_sec(&self) -> f64 {
        match self.span() {
            Some(span) if self.samples.len() > 1 => {
                (self.samples.len() - 1) as f64 / span.as_secs_f64()
            }
            _ => 0.0,
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// `true` at most once per window; used to throttle log lines.
    pub fn report_due(&mut self) -> bool {
        if self.last_report.elapsed() >= self.window {
            self.last_report = Instant::now();
            true
        } else {
            false
        }
    }

    // ── Internal ─────────────────────────────────────────────────

    fn span(&self) -> Option<Duration> {
        let (first, last) = (self.samples.front()?, self.samples.back()?);
        let d = last.0.duration_since(first.0);
        Some(if d.is_zero() { Duration::from_millis(1) } else { d })
    }

    fn evict(&mut self, now: Instant) {
        while let Some(&(ts, bytes)) = self.samples.front() {
            if now.duration_since(ts) > self.window {
                self.samples.pop_front();
                self.total_bytes = self.total_bytes.saturating_sub(bytes);
            } else {
                break;
            }
        }
    }
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_meter_returns_zero() {
        let meter = ThroughputMeter::new();
        assert_eq!(meter.bytes_per_sec(), 0);
        assert_eq!(meter.frames_per_sec(), 0.0);
    }

    #[test]
    fn ten_frames_over_one_second() {
        let mut meter = ThroughputMeter::with_window(Duration::from_secs(5));
        let t0 = Instant::now();
        for i in 0..=10 {
            meter.record_at(t0 + Duration::from_millis(100 * i), 1000);
        }
        let fps = meter.frames_per_sec();
        assert!((fps - 10.0).abs() < 0.01, "fps = {fps}");
        let bps = meter.bytes_per_sec();
        assert!((10_900..=11_100).contains(&bps), "bps = {bps}");
    }

    #[test]
    fn evicts_old_samples() {
        let mut meter = ThroughputMeter::with_window(Duration::from_millis(500));
        let t0 = Instant::now();
        meter.record_at(t0, 1000);
        meter.record_at(t0 + Duration::from_secs(1), 500);
        assert_eq!(meter.sample_count(), 1);
    }

    #[test]
    fn report_is_throttled() {
        let mut meter = ThroughputMeter::with_window(Duration::from_secs(60));
        assert!(!meter.report_due());
    }
}
