//! Monotonic timers for statistics and limit checks.

use std::time::{Duration, Instant};

/// Accumulating stopwatch over a monotonic clock.
///
/// Mirrors the start/stop discipline of the statistics record: a timer may
/// be started and stopped repeatedly and reports the total time spent
/// running. Stopping an already stopped timer is a no-op, so unwinding
/// paths can stop unconditionally.
#[derive(Debug, Clone, Default)]
pub struct Timer {
    accumulated: Duration,
    running_since: Option<Instant>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    pub fn stop(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.accumulated += since.elapsed();
        }
    }

    /// Total accumulated time, including the currently running span.
    pub fn time(&self) -> Duration {
        match self.running_since {
            Some(since) => self.accumulated + since.elapsed(),
            None => self.accumulated,
        }
    }

    pub fn time_ms(&self) -> u64 {
        self.time().as_millis() as u64
    }

    pub fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
        self.running_since = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_stop() {
        let mut t = Timer::new();
        assert_eq!(t.time(), Duration::ZERO);

        t.start();
        t.stop();
        // double stop is a no-op
        t.stop();
        let after_first = t.time();

        t.start();
        t.stop();
        assert!(t.time() >= after_first);
    }

    #[test]
    fn test_reset() {
        let mut t = Timer::new();
        t.start();
        t.stop();
        t.reset();
        assert_eq!(t.time(), Duration::ZERO);
    }
}
