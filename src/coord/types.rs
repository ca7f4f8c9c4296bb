//! Identifiers and counters used across the coordination layer

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a worker process within the fleet
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessId(pub u32);

impl ProcessId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to an execution state owned by the traversal engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateId(pub u64);

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-process coordination counters
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorStats {
    /// Directives drained while parked at a barrier
    pub directives_consumed: u64,
    /// Barrier rounds this process led as lock holder
    pub barrier_rounds: u64,
    /// Elections that found a winner
    pub elections: u64,
    /// Elections that found no successful state anywhere
    pub empty_elections: u64,
    /// Stall timeouts acted upon
    pub timeouts_fired: u64,
    /// States terminated by this process
    pub states_terminated: u64,
    /// States newly held as successful
    pub successes_marked: u64,
    /// Success marks ignored as duplicates
    pub duplicate_marks: u64,
}
