use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::coord::types::{ProcessId, StateId};

/// Errors raised by the coordination layer
#[derive(Error, Debug)]
pub enum CoordError {
    // Fleet protocol errors
    #[error("Protocol violation during {operation} (waited {waited:?})")]
    ProtocolViolation { operation: String, waited: Duration },

    #[error("Unknown process {process_id} (fleet size {fleet_size})")]
    UnknownProcess { process_id: ProcessId, fleet_size: usize },

    #[error("Undecodable mailbox word: {word:#x}")]
    UnknownDirective { word: u64 },

    // Control transfer, not a failure
    #[error("Active state {state} was terminated")]
    StateTerminated { state: StateId },

    // Configuration errors
    #[error("Configuration invalid: {0}")]
    InvalidConfiguration(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoordError {
    /// Create a protocol violation for the given operation
    pub fn protocol(operation: impl Into<String>, waited: Duration) -> Self {
        Self::ProtocolViolation {
            operation: operation.into(),
            waited,
        }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True when the current unit of work ended because its own state was killed.
    /// Callers hand control back to the scheduler instead of reporting it.
    pub fn is_control_transfer(&self) -> bool {
        matches!(self, Self::StateTerminated { .. })
    }

    /// Check if this error means the worker cannot keep participating in the fleet
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::ProtocolViolation { .. } |
            Self::UnknownProcess { .. } |
            Self::Internal(_) => true,

            Self::StateTerminated { .. } |
            Self::UnknownDirective { .. } |
            Self::InvalidConfiguration(_) |
            Self::Io(_) |
            Self::Yaml(_) |
            Self::Json(_) |
            Self::Other(_) => false,
        }
    }
}

impl From<String> for CoordError {
    fn from(s: String) -> Self {
        CoordError::Internal(s)
    }
}

impl From<&str> for CoordError {
    fn from(s: &str) -> Self {
        CoordError::Internal(s.to_string())
    }
}

/// Result type alias for CoordError
pub type Result<T> = std::result::Result<T, CoordError>;
