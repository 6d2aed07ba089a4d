//! Fixed-rate loop pacing.

use std::time::{Duration, Instant};

use crate::error::NtwkError;

/// Paces a loop to at most `hz` iterations per second.
///
/// ```no_run
/// # fn main() -> Result<(), ntwk_core::NtwkError> {
/// let mut rate = ntwk_core::Rate::new(30)?;
/// loop {
///     // produce a frame ...
///     rate.sleep();
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Rate {
    period: Duration,
    last: Instant,
}

impl Rate {
    pub fn new(hz: u32) -> Result<Self, NtwkError> {
        if hz == 0 {
            return Err(NtwkError::InvalidConfig("rate must be at least 1 Hz".into()));
        }
        Ok(Self {
            period: Duration::from_secs(1) / hz,
            last: Instant::now(),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Sleep out whatever remains of the period since the previous call.
    /// Returns immediately if the period has already elapsed.
    pub fn sleep(&mut self) {
        let elapsed = self.last.elapsed();
        if elapsed < self.period {
            std::thread::sleep(self.period - elapsed);
        }
        self.last = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_hz_is_rejected() {
        assert!(matches!(Rate::new(0), Err(NtwkError::InvalidConfig(_))));
    }

    #[test]
    fn period_from_hz() {
        assert_eq!(Rate::new(50).unwrap().period(), Duration::from_millis(20));
    }

    #[test]
    fn sleep_paces_iterations() {
        let mut rate = Rate::new(100).unwrap();
        let start = Instant::now();
        for _ in 0..5 {
            rate.sleep();
        }
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[test]
    fn overrun_does_not_sleep() {
        let mut rate = Rate::new(100).unwrap();
        std::thread::sleep(Duration::from_millis(15));
        let start = Instant::now();
        rate.sleep();
        assert!(start.elapsed() < Duration::from_millis(10));
    }
}
