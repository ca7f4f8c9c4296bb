//! Cross-process coordination of state pruning
//!
//! A `StateManager` runs inside every worker. Workers agree through the
//! shared segment on who holds the coordination lock, park at barriers
//! raised by the holder, and elect a single surviving successful state when
//! exploration stalls or runs dry.

pub mod types;
pub mod engine;
pub mod manager;
pub mod lock;
pub mod election;
pub mod stall;
pub mod hooks;

pub use types::*;
pub use engine::*;
pub use manager::*;
pub use stall::*;
pub use hooks::*;
