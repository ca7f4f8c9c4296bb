//! In-memory traversal engine
//!
//! Stands in for the real engine in tests and the demo: keeps an ordered
//! table of states with a suspended flag and logs every call the
//! coordinator makes into it.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::coord::engine::ExecutionEngine;
use crate::coord::types::{ProcessId, StateId};
use crate::shared::segment::SharedSegment;

/// Something the coordinator asked the engine to do
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    Suspended(StateId),
    Resumed(StateId),
    /// `lock_owner` is sampled from the probe segment, if one is attached
    Terminated {
        state: StateId,
        lock_owner: Option<ProcessId>,
    },
}

pub struct SimEngine {
    process_id: ProcessId,
    fleet_size: usize,
    /// state -> suspended
    states: BTreeMap<StateId, bool>,
    current: Option<StateId>,
    next_seq: u64,
    events: Vec<EngineEvent>,
    lock_probe: Option<Arc<SharedSegment>>,
    reject_suspend: bool,
    rng: fastrand::Rng,
}

impl SimEngine {
    pub fn new(process_id: ProcessId, fleet_size: usize) -> Self {
        Self {
            process_id,
            fleet_size,
            states: BTreeMap::new(),
            current: None,
            next_seq: 0,
            events: Vec::new(),
            lock_probe: None,
            reject_suspend: false,
            rng: fastrand::Rng::new(),
        }
    }

    /// Start with `count` fresh schedulable states
    pub fn with_states(mut self, count: usize) -> Self {
        for _ in 0..count {
            self.spawn_state();
        }
        self
    }

    /// Record the lock owner at every termination
    pub fn with_lock_probe(mut self, segment: Arc<SharedSegment>) -> Self {
        self.lock_probe = Some(segment);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    /// Refuse (or accept again) suspend requests
    pub fn reject_suspend(&mut self, reject: bool) {
        self.reject_suspend = reject;
    }

    /// Ids carry the owning process in the upper half so logs stay readable
    pub fn spawn_state(&mut self) -> StateId {
        let id = StateId(((self.process_id.0 as u64) << 32) | self.next_seq);
        self.next_seq += 1;
        self.states.insert(id, false);
        id
    }

    /// Branch a live state into a new schedulable one
    pub fn fork(&mut self, parent: StateId) -> Option<StateId> {
        if !self.states.contains_key(&parent) {
            return None;
        }
        let child = self.spawn_state();
        debug!("Process {}: state {} forked {}", self.process_id, parent, child);
        Some(child)
    }

    pub fn set_current(&mut self, state: Option<StateId>) {
        self.current = state;
    }

    /// Randomly pick a schedulable state and make it current
    pub fn pick_next(&mut self) -> Option<StateId> {
        let schedulable: Vec<StateId> = self
            .states
            .iter()
            .filter(|(_, suspended)| !**suspended)
            .map(|(id, _)| *id)
            .collect();
        let next = if schedulable.is_empty() {
            None
        } else {
            Some(schedulable[self.rng.usize(..schedulable.len())])
        };
        self.current = next;
        next
    }

    /// The current state ran to completion on its own
    pub fn finish_current(&mut self) -> Option<StateId> {
        let state = self.current.take()?;
        self.states.remove(&state);
        Some(state)
    }

    pub fn rng(&mut self) -> &mut fastrand::Rng {
        &mut self.rng
    }

    pub fn live_count(&self) -> usize {
        self.states.len()
    }

    pub fn contains(&self, state: StateId) -> bool {
        self.states.contains_key(&state)
    }

    pub fn is_suspended(&self, state: StateId) -> bool {
        self.states.get(&state).copied().unwrap_or(false)
    }

    pub fn events(&self) -> &[EngineEvent] {
        &self.events
    }

    /// States terminated through the coordinator, in order
    pub fn terminated(&self) -> Vec<StateId> {
        self.events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::Terminated { state, .. } => Some(*state),
                _ => None,
            })
            .collect()
    }
}

impl ExecutionEngine for SimEngine {
    fn process_id(&self) -> ProcessId {
        self.process_id
    }

    fn fleet_size(&self) -> usize {
        self.fleet_size
    }

    fn current_state(&self) -> Option<StateId> {
        self.current
    }

    fn all_states(&self) -> Vec<StateId> {
        self.states.keys().copied().collect()
    }

    fn schedulable_count(&self) -> usize {
        self.states.values().filter(|suspended| !**suspended).count()
    }

    fn suspend_state(&mut self, state: StateId) -> bool {
        if self.reject_suspend {
            return false;
        }
        match self.states.get_mut(&state) {
            Some(suspended) if !*suspended => {
                *suspended = true;
                if self.current == Some(state) {
                    self.current = None;
                }
                self.events.push(EngineEvent::Suspended(state));
                true
            }
            _ => false,
        }
    }

    fn resume_state(&mut self, state: StateId) {
        if let Some(suspended) = self.states.get_mut(&state) {
            *suspended = false;
            self.events.push(EngineEvent::Resumed(state));
        }
    }

    fn terminate_state(&mut self, state: StateId, reason: &str) {
        if self.states.remove(&state).is_none() {
            warn!("Process {}: terminate of unknown state {}", self.process_id, state);
            return;
        }
        if self.current == Some(state) {
            self.current = None;
        }
        let lock_owner = self.lock_probe.as_ref().and_then(|s| s.lock_owner());
        debug!("Process {}: {} ({})", self.process_id, reason, state);
        self.events.push(EngineEvent::Terminated { state, lock_owner });
    }
}
