use crate::coord::types::ProcessId;
use crate::core::errors::{CoordError, Result};

const TAG_MASK: u64 = 0xff;
const TAG_EMPTY: u64 = 0;
const TAG_KILL: u64 = 1;
const TAG_RESUME: u64 = 2;
const TARGET_SHIFT: u32 = 8;
const TARGET_ALL: u32 = u32::MAX;

/// Content of the single-slot mailbox
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Directive {
    Empty,
    /// Discard states. `keeper` may retain one held success; every other process keeps nothing.
    Kill { keeper: Option<ProcessId> },
    Resume,
}

impl Directive {
    /// Pack into the mailbox word
    pub fn encode(self) -> u64 {
        match self {
            Directive::Empty => TAG_EMPTY,
            Directive::Kill { keeper } => {
                let target = keeper.map(|p| p.0).unwrap_or(TARGET_ALL);
                ((target as u64) << TARGET_SHIFT) | TAG_KILL
            }
            Directive::Resume => TAG_RESUME,
        }
    }

    pub fn decode(word: u64) -> Result<Self> {
        match word & TAG_MASK {
            TAG_EMPTY if word == TAG_EMPTY => Ok(Directive::Empty),
            TAG_KILL => {
                let target = (word >> TARGET_SHIFT) as u32;
                if word >> (TARGET_SHIFT + 32) != 0 {
                    return Err(CoordError::UnknownDirective { word });
                }
                let keeper = (target != TARGET_ALL).then_some(ProcessId(target));
                Ok(Directive::Kill { keeper })
            }
            TAG_RESUME if word == TAG_RESUME => Ok(Directive::Resume),
            _ => Err(CoordError::UnknownDirective { word }),
        }
    }

    pub fn is_empty(self) -> bool {
        matches!(self, Directive::Empty)
    }
}
