//! # statefleet
//!
//! Keeps a fleet of symbolic-execution workers coordinated through a small
//! shared segment: a spin lock that cooperates with fleet-wide barriers, a
//! stall detector, and an election that prunes every state but one
//! successful outcome.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use statefleet::{CoordinatorConfig, ProcessId, SharedSegment, SimEngine, StateManager};
//!
//! # fn main() -> statefleet::Result<()> {
//! let config = CoordinatorConfig::builder().fleet_size(1).timeout_secs(60).build()?;
//! let segment = Arc::new(SharedSegment::new(config.fleet_size, 0));
//! let engine = SimEngine::new(ProcessId(0), config.fleet_size).with_states(4);
//!
//! let mut manager = StateManager::new(engine, segment, config)?;
//! let state = manager.engine_mut().pick_next();
//! manager.on_schedule(state, false)?;
//! # Ok(())
//! # }
//! ```

// Core infrastructure modules
pub mod core {
    pub mod errors;
    pub mod config;
    pub mod clock;
}

pub mod shared;   // Segment layout and mailbox encoding
pub mod coord;    // Per-process coordinator
pub mod sim;      // In-memory engine for tests and demos

// Re-exports for convenience
pub use crate::core::errors::{CoordError, Result};
pub use crate::core::config::{CoordinatorConfig, CoordinatorConfigBuilder};
pub use crate::core::clock::{Clock, ManualClock, SystemClock};
pub use shared::{Directive, SharedSegment};
pub use coord::{
    CoordinatorStats, ExecutionEngine, GuestSignal, ProcessId, StallDetector, StateId,
    StateManager,
};
pub use sim::{EngineEvent, SimEngine};
