//! Stall detection: prune when no new coverage shows up for too long

use std::sync::Arc;
use tracing::info;

use crate::coord::engine::ExecutionEngine;
use crate::coord::manager::StateManager;
use crate::core::clock::Clock;
use crate::core::errors::Result;
use crate::shared::segment::SharedSegment;

/// Compares the fleet's last progress timestamp against a timeout
pub struct StallDetector {
    timeout_secs: u64,
    clock: Arc<dyn Clock>,
}

impl StallDetector {
    pub fn new(timeout_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self { timeout_secs, clock }
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Seconds since the last recorded progress
    pub fn idle_secs(&self, segment: &SharedSegment) -> i64 {
        self.clock.now_secs() - segment.last_progress()
    }

    pub fn timeout_reached(&self, segment: &SharedSegment) -> bool {
        if self.timeout_secs == 0 {
            return false;
        }
        self.idle_secs(segment) >= self.timeout_secs as i64
    }

    pub fn reset(&self, segment: &SharedSegment) {
        segment.record_progress(self.clock.now_secs());
    }
}

impl<E: ExecutionEngine> StateManager<E> {
    pub fn timeout_reached(&self) -> bool {
        self.stall.timeout_reached(&self.segment)
    }

    pub fn reset_timeout(&self) {
        self.stall.reset(&self.segment);
    }

    /// Run an election if the fleet has stalled. Must be called with the lock held.
    pub fn kill_on_timeout(&mut self) -> Result<()> {
        if !self.timeout_reached() {
            return Ok(());
        }

        info!(
            "Process {}: no new blocks found in {} seconds, killing states",
            self.process_id,
            self.stall.timeout_secs()
        );

        // Reset first so the prune in progress does not trigger again,
        // including when it ends by terminating the current state.
        self.reset_timeout();
        self.stats.timeouts_fired += 1;

        if !self.kill_all_but_one_successful()? {
            info!("Process {}: there are no successful states to kill", self.process_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;

    #[test]
    fn test_disabled_detector_never_fires() {
        let clock = Arc::new(ManualClock::new(0));
        let segment = SharedSegment::new(1, 0);
        let detector = StallDetector::new(0, clock.clone());

        clock.advance(1_000_000);
        assert!(!detector.timeout_reached(&segment));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let clock = Arc::new(ManualClock::new(100));
        let segment = SharedSegment::new(1, 100);
        let detector = StallDetector::new(10, clock.clone());

        clock.advance(9);
        assert!(!detector.timeout_reached(&segment));
        clock.advance(1);
        assert!(detector.timeout_reached(&segment));
        assert_eq!(detector.idle_secs(&segment), 10);

        detector.reset(&segment);
        assert_eq!(segment.last_progress(), 110);
        assert!(!detector.timeout_reached(&segment));
    }

    #[test]
    fn test_clock_behind_segment_does_not_fire() {
        let clock = Arc::new(ManualClock::new(50));
        let segment = SharedSegment::new(1, 100);
        let detector = StallDetector::new(10, clock);
        assert!(!detector.timeout_reached(&segment));
    }
}
