//! Entry points the traversal engine calls into

use tracing::{debug, info, warn};

use crate::coord::engine::ExecutionEngine;
use crate::coord::manager::StateManager;
use crate::coord::types::StateId;
use crate::core::errors::Result;

/// Guest subfunction that marks the calling state successful
pub const SUBFUNCTION_SUCCEED: u8 = 0x00;

/// Signal decoded from a guest custom instruction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuestSignal {
    Succeed,
    Unknown(u8),
}

impl GuestSignal {
    /// Decode `opcode` if its opcode byte (bits 8..16) is `claimed`.
    /// The subfunction sits in bits 16..24.
    pub fn decode(opcode: u64, claimed: u8) -> Option<Self> {
        if ((opcode >> 8) & 0xff) as u8 != claimed {
            return None;
        }
        match ((opcode >> 16) & 0xff) as u8 {
            SUBFUNCTION_SUCCEED => Some(GuestSignal::Succeed),
            other => Some(GuestSignal::Unknown(other)),
        }
    }
}

impl<E: ExecutionEngine> StateManager<E> {
    /// Called at every scheduler decision point.
    ///
    /// `killing` is set when the engine is about to destroy `state`. Any
    /// `StateTerminated` result means the engine's current state is gone
    /// and control belongs to the scheduler again.
    pub fn on_schedule(&mut self, state: Option<StateId>, killing: bool) -> Result<()> {
        self.acquire()?;

        let outcome = match state {
            Some(state) if killing => self.resume_one_if_held(state).map(|_| ()),
            // Out of work locally: settle on a single success fleet-wide
            _ if self.engine.schedulable_count() == 0 => {
                self.kill_all_but_one_successful().map(|_| ())
            }
            _ => self.kill_on_timeout(),
        };

        self.release();
        outcome
    }

    /// Guest-issued custom instruction
    pub fn on_custom_instruction(&mut self, state: StateId, opcode: u64) -> Result<()> {
        match GuestSignal::decode(opcode, self.config.guest_opcode) {
            None => Ok(()),
            Some(GuestSignal::Succeed) => self.mark_successful(state).map(|_| ()),
            Some(GuestSignal::Unknown(subfunction)) => {
                warn!(
                    "Process {}: incorrect state manager opcode {:#x}",
                    self.process_id, subfunction
                );
                Ok(())
            }
        }
    }

    /// The engine translated a block of the module under analysis for the first time
    pub fn on_new_coverage(&self, pc: u64) {
        debug!("Process {}: new block {:#x} discovered", self.process_id, pc);
        self.reset_timeout();
    }

    /// A freshly forked worker starts without successes of its own
    pub fn on_process_fork(&mut self) -> Result<()> {
        let process_id = self.engine.process_id();
        self.segment.check_process(process_id)?;
        self.process_id = process_id;
        self.held.clear();
        self.holding_lock = false;
        self.publish_success_count()?;
        info!("Process {} started from fork", self.process_id);
        Ok(())
    }
}
