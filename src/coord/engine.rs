//! Narrow view of the traversal engine the coordinator rides on

use crate::coord::types::{ProcessId, StateId};

/// Operations the coordinator needs from the engine that expands states.
///
/// The coordinator never looks inside a state; it only classifies states as
/// kept, held (suspended as successful) or terminated.
pub trait ExecutionEngine {
    /// Id of the process this engine runs in
    fn process_id(&self) -> ProcessId;

    /// Number of processes in the fleet
    fn fleet_size(&self) -> usize;

    /// State the engine is executing right now, if any
    fn current_state(&self) -> Option<StateId>;

    /// Every live state, suspended ones included
    fn all_states(&self) -> Vec<StateId>;

    /// States the engine can still pick from
    fn schedulable_count(&self) -> usize;

    /// Remove `state` from scheduling. Returns false if the engine refuses.
    fn suspend_state(&mut self, state: StateId) -> bool;

    /// Put a suspended state back into the schedulable pool
    fn resume_state(&mut self, state: StateId);

    /// Destroy `state` for good. When `state` is the current one the caller
    /// is responsible for unwinding afterwards.
    fn terminate_state(&mut self, state: StateId, reason: &str);
}
