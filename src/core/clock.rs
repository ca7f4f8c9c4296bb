use std::sync::atomic::{AtomicI64, Ordering};

/// Wall-clock source for the stall detector, in whole seconds
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> i64;
}

/// Real time from the system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicI64,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            secs: AtomicI64::new(start),
        }
    }

    pub fn set(&self, secs: i64) {
        self.secs.store(secs, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> i64 {
        self.secs.load(Ordering::SeqCst)
    }
}
