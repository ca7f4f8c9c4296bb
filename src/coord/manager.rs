//! Per-process coordinator state and success bookkeeping

use std::sync::Arc;
use tracing::{debug, info};

use crate::coord::engine::ExecutionEngine;
use crate::coord::stall::StallDetector;
use crate::coord::types::{CoordinatorStats, ProcessId, StateId};
use crate::core::clock::{Clock, SystemClock};
use crate::core::config::CoordinatorConfig;
use crate::core::errors::{CoordError, Result};
use crate::shared::segment::SharedSegment;

/// Coordinates one worker process with the rest of the fleet.
///
/// Owns the process' held-success set and its slot of the shared success
/// table; every other slot is only read. Lock discipline, elections and the
/// stall check are implemented in sibling modules on this type.
pub struct StateManager<E: ExecutionEngine> {
    pub(crate) engine: E,
    pub(crate) segment: Arc<SharedSegment>,
    pub(crate) config: CoordinatorConfig,
    pub(crate) stall: StallDetector,
    pub(crate) process_id: ProcessId,
    /// Insertion ordered; the first entry survives a local election
    pub(crate) held: Vec<StateId>,
    pub(crate) holding_lock: bool,
    pub(crate) stats: CoordinatorStats,
}

impl<E: ExecutionEngine> StateManager<E> {
    /// Attach a coordinator to an engine, using the system clock
    pub fn new(engine: E, segment: Arc<SharedSegment>, config: CoordinatorConfig) -> Result<Self> {
        Self::with_clock(engine, segment, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        engine: E,
        segment: Arc<SharedSegment>,
        config: CoordinatorConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        if segment.fleet_size() != config.fleet_size || engine.fleet_size() != config.fleet_size {
            return Err(CoordError::InvalidConfiguration(format!(
                "fleet size mismatch: config {}, segment {}, engine {}",
                config.fleet_size,
                segment.fleet_size(),
                engine.fleet_size()
            )));
        }
        let process_id = engine.process_id();
        segment.check_process(process_id)?;

        let stall = StallDetector::new(config.timeout_secs, clock);
        let manager = Self {
            engine,
            segment,
            config,
            stall,
            process_id,
            held: Vec::new(),
            holding_lock: false,
            stats: CoordinatorStats::default(),
        };
        manager.reset_timeout();

        info!(
            "State manager ready on process {} (fleet {}, timeout {}s)",
            manager.process_id, manager.config.fleet_size, manager.config.timeout_secs
        );
        Ok(manager)
    }

    pub fn process_id(&self) -> ProcessId {
        self.process_id
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn segment(&self) -> &Arc<SharedSegment> {
        &self.segment
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn stats(&self) -> &CoordinatorStats {
        &self.stats
    }

    pub fn holds_lock(&self) -> bool {
        self.holding_lock
    }

    pub fn held_successes(&self) -> &[StateId] {
        &self.held
    }

    pub fn is_held(&self, state: StateId) -> bool {
        self.held.contains(&state)
    }

    /// Hold `state` as a successful outcome until the next election.
    ///
    /// Returns false when the state was already held or the engine refused
    /// to suspend it.
    pub fn mark_successful(&mut self, state: StateId) -> Result<bool> {
        self.acquire()?;

        debug!("Process {} succeeding state {}", self.process_id, state);

        // a kill received while parking for the lock may have taken it
        if !self.engine.all_states().contains(&state) {
            debug!(
                "Process {}: state {} was terminated before it could be held",
                self.process_id, state
            );
            self.release();
            return Ok(false);
        }

        if self.is_held(state) {
            debug!(
                "Process {}: state {} was already marked as succeeded",
                self.process_id, state
            );
            self.stats.duplicate_marks += 1;
            self.release();
            return Ok(false);
        }
        self.held.push(state);
        self.stats.successes_marked += 1;

        let suspended = self.engine.suspend_state(state);
        if !suspended {
            debug!("Process {}: engine refused to suspend state {}", self.process_id, state);
        }
        let published = self.publish_success_count();

        self.release();
        published.map(|_| suspended)
    }

    /// Give a held state back to the scheduler before the engine kills it
    pub fn resume_one_if_held(&mut self, state: StateId) -> Result<bool> {
        let Some(pos) = self.held.iter().position(|s| *s == state) else {
            return Ok(false);
        };
        self.held.remove(pos);
        self.engine.resume_state(state);
        self.publish_success_count()?;
        debug!("Process {} resumed held state {}", self.process_id, state);
        Ok(true)
    }

    /// Resume every held state and forget them
    pub(crate) fn resume_succeeded(&mut self) -> Result<()> {
        for state in std::mem::take(&mut self.held) {
            self.engine.resume_state(state);
        }
        self.publish_success_count()
    }

    pub(crate) fn publish_success_count(&self) -> Result<()> {
        self.segment
            .set_success_count(self.process_id, self.held.len() as u64)
    }
}
