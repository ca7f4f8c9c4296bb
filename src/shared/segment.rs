//! Fixed-layout coordination block shared by every worker of a fleet
//!
//! All fields are scalar atomics updated in place; the block never grows
//! after creation. Slot tables are sized once from the fleet size.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::warn;

use crate::coord::types::ProcessId;
use crate::core::errors::{CoordError, Result};
use crate::shared::directive::Directive;

const LOCK_FREE: u32 = 0;

#[derive(Debug)]
pub struct SharedSegment {
    /// 0 when free, otherwise holder id + 1
    lock_owner: AtomicU32,
    command: AtomicU64,
    suspend_all: AtomicBool,
    waiting: AtomicUsize,
    last_progress: AtomicI64,
    success_counts: Box<[AtomicU64]>,
}

impl SharedSegment {
    /// Create the segment for a fleet; done once by the launching process
    pub fn new(fleet_size: usize, now_secs: i64) -> Self {
        let success_counts = (0..fleet_size).map(|_| AtomicU64::new(0)).collect();
        Self {
            lock_owner: AtomicU32::new(LOCK_FREE),
            command: AtomicU64::new(Directive::Empty.encode()),
            suspend_all: AtomicBool::new(false),
            waiting: AtomicUsize::new(0),
            last_progress: AtomicI64::new(now_secs),
            success_counts,
        }
    }

    pub fn fleet_size(&self) -> usize {
        self.success_counts.len()
    }

    pub fn check_process(&self, process_id: ProcessId) -> Result<()> {
        if process_id.index() < self.fleet_size() {
            Ok(())
        } else {
            Err(CoordError::UnknownProcess {
                process_id,
                fleet_size: self.fleet_size(),
            })
        }
    }

    // Lock ownership

    /// Single non-blocking attempt to take the coordination lock
    pub fn try_acquire(&self, process_id: ProcessId) -> bool {
        self.lock_owner
            .compare_exchange(LOCK_FREE, process_id.0 + 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release the lock; fails if `process_id` is not the holder
    pub fn release(&self, process_id: ProcessId) -> bool {
        let released = self
            .lock_owner
            .compare_exchange(process_id.0 + 1, LOCK_FREE, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !released {
            warn!("Process {} released a coordination lock it does not hold", process_id);
        }
        released
    }

    pub fn lock_owner(&self) -> Option<ProcessId> {
        match self.lock_owner.load(Ordering::Acquire) {
            LOCK_FREE => None,
            owner => Some(ProcessId(owner - 1)),
        }
    }

    // Barrier

    pub fn is_suspending(&self) -> bool {
        self.suspend_all.load(Ordering::Acquire)
    }

    pub fn set_suspending(&self, on: bool) {
        self.suspend_all.store(on, Ordering::Release);
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting.load(Ordering::Acquire)
    }

    pub fn announce_waiting(&self) {
        self.waiting.fetch_add(1, Ordering::AcqRel);
    }

    pub fn leave_waiting(&self) {
        self.waiting.fetch_sub(1, Ordering::AcqRel);
    }

    // Mailbox

    /// Publish a directive; the mailbox must be observed empty first
    pub fn publish(&self, directive: Directive) -> Result<()> {
        let empty = Directive::Empty.encode();
        self.command
            .compare_exchange(empty, directive.encode(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|found| {
                CoordError::protocol(
                    format!("publish {:?} over pending word {:#x}", directive, found),
                    Duration::ZERO,
                )
            })
    }

    /// Raw mailbox word, for drains that must see undecodable values too
    pub fn read_command(&self) -> u64 {
        self.command.load(Ordering::Acquire)
    }

    pub fn clear_mailbox(&self) {
        self.command.store(Directive::Empty.encode(), Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn store_raw_command(&self, word: u64) {
        self.command.store(word, Ordering::Release);
    }

    // Success slots

    pub fn success_count(&self, process_id: ProcessId) -> Result<u64> {
        self.check_process(process_id)?;
        Ok(self.success_counts[process_id.index()].load(Ordering::Acquire))
    }

    /// Written only by the slot's owning process
    pub fn set_success_count(&self, process_id: ProcessId, count: u64) -> Result<()> {
        self.check_process(process_id)?;
        self.success_counts[process_id.index()].store(count, Ordering::Release);
        Ok(())
    }

    /// Slots in ascending process order
    pub fn success_counts(&self) -> Vec<u64> {
        self.success_counts
            .iter()
            .map(|c| c.load(Ordering::Acquire))
            .collect()
    }

    // Progress clock

    pub fn last_progress(&self) -> i64 {
        self.last_progress.load(Ordering::Acquire)
    }

    pub fn record_progress(&self, now_secs: i64) {
        self.last_progress.store(now_secs, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_lock_ownership() {
        let seg = SharedSegment::new(3, 0);
        assert_eq!(seg.lock_owner(), None);

        assert!(seg.try_acquire(ProcessId(0)));
        assert!(!seg.try_acquire(ProcessId(1)));
        assert!(!seg.try_acquire(ProcessId(0)));
        assert_eq!(seg.lock_owner(), Some(ProcessId(0)));

        // only the holder may release
        assert!(!seg.release(ProcessId(1)));
        assert_eq!(seg.lock_owner(), Some(ProcessId(0)));
        assert!(seg.release(ProcessId(0)));
        assert_eq!(seg.lock_owner(), None);

        assert!(seg.try_acquire(ProcessId(2)));
        assert_eq!(seg.lock_owner(), Some(ProcessId(2)));
    }

    #[test]
    fn test_publish_requires_empty_mailbox() {
        let seg = SharedSegment::new(2, 0);
        seg.publish(Directive::Resume).unwrap();
        assert!(seg.publish(Directive::Kill { keeper: None }).is_err());
        assert_eq!(Directive::decode(seg.read_command()).unwrap(), Directive::Resume);

        seg.clear_mailbox();
        seg.publish(Directive::Kill { keeper: None }).unwrap();
    }

    #[test]
    fn test_success_slots_bounds_checked() {
        let seg = SharedSegment::new(4, 0);
        seg.set_success_count(ProcessId(2), 3).unwrap();
        assert_eq!(seg.success_count(ProcessId(2)).unwrap(), 3);
        assert_eq!(seg.success_counts(), vec![0, 0, 3, 0]);

        assert!(matches!(
            seg.set_success_count(ProcessId(4), 1),
            Err(CoordError::UnknownProcess { fleet_size: 4, .. })
        ));
        assert!(seg.success_count(ProcessId(10)).is_err());
    }

    #[test]
    fn test_waiting_counter_concurrent() {
        let seg = Arc::new(SharedSegment::new(8, 0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let seg = Arc::clone(&seg);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        seg.announce_waiting();
                        seg.leave_waiting();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(seg.waiting_count(), 0);
    }

    #[test]
    fn test_progress_timestamp() {
        let seg = SharedSegment::new(1, 42);
        assert_eq!(seg.last_progress(), 42);
        seg.record_progress(50);
        assert_eq!(seg.last_progress(), 50);
    }
}
