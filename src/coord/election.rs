//! Fleet-wide election of a single surviving successful state

use tracing::{debug, info, warn};

use crate::coord::engine::ExecutionEngine;
use crate::coord::manager::StateManager;
use crate::coord::types::{ProcessId, StateId};
use crate::core::errors::{CoordError, Result};
use crate::shared::directive::Directive;

const KILL_REASON: &str = "StateManager: killing state";

impl<E: ExecutionEngine> StateManager<E> {
    /// Keep exactly one successful state across the whole fleet and
    /// terminate everything else. Must be called with the lock held.
    ///
    /// Returns `Ok(false)` when no process holds a success. When the local
    /// current state is among the victims the call ends with
    /// `StateTerminated` after the lock has been released.
    pub fn kill_all_but_one_successful(&mut self) -> Result<bool> {
        self.require_lock("elect surviving state")?;

        let counts = self.segment.success_counts();
        let Some(index) = counts.iter().position(|&count| count > 0) else {
            self.stats.empty_elections += 1;
            info!("Process {}: no successful states anywhere, nothing to prune", self.process_id);
            return Ok(false);
        };
        let winner = ProcessId(index as u32);
        self.stats.elections += 1;

        info!(
            "Process {}: killing all but one successful state on process {} (success counts {:?})",
            self.process_id, winner, counts
        );

        if winner == self.process_id {
            if self.held.is_empty() {
                return Err(CoordError::internal(format!(
                    "process {} advertises {} successes but holds none",
                    self.process_id, counts[index]
                )));
            }
            self.broadcast(Directive::Kill { keeper: None })?;
            self.kill_all_but_one_successful_local()?;
        } else {
            self.broadcast(Directive::Kill { keeper: Some(winner) })?;
            self.kill_all_except(&[])?;
        }
        Ok(true)
    }

    /// Keep the first held success, resume it into the pool and kill the rest
    pub(crate) fn kill_all_but_one_successful_local(&mut self) -> Result<()> {
        let Some(&survivor) = self.held.first() else {
            warn!(
                "Process {} was elected to keep a success but holds none",
                self.process_id
            );
            return self.kill_all_except(&[]);
        };

        self.resume_succeeded()?;
        info!("Process {} keeps successful state {}", self.process_id, survivor);
        self.kill_all_except(&[survivor])
    }

    /// Terminate every known state not in `keep`.
    ///
    /// The current state, if doomed, goes last: the lock is released first
    /// and the call returns `StateTerminated`.
    pub(crate) fn kill_all_except(&mut self, keep: &[StateId]) -> Result<()> {
        let current = self.engine.current_state();
        let mut kill_current = None;
        let mut terminated = Vec::new();

        for state in self.engine.all_states() {
            if keep.contains(&state) {
                continue;
            }
            if Some(state) == current {
                kill_current = Some(state);
                continue;
            }
            self.engine.terminate_state(state, KILL_REASON);
            terminated.push(state);
        }

        let held_before = self.held.len();
        self.held
            .retain(|s| !terminated.contains(s) && Some(*s) != kill_current);
        if self.held.len() != held_before {
            self.publish_success_count()?;
        }

        self.stats.states_terminated += terminated.len() as u64;
        debug!(
            "Process {} terminated {} state(s), kept {:?}",
            self.process_id,
            terminated.len(),
            keep
        );

        if let Some(state) = kill_current {
            self.release();
            self.engine.terminate_state(state, KILL_REASON);
            self.stats.states_terminated += 1;
            debug!("Process {} terminated its current state {}", self.process_id, state);
            return Err(CoordError::StateTerminated { state });
        }
        Ok(())
    }
}
