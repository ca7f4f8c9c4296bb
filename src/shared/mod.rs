//! Cross-process shared state: the coordination segment and its mailbox encoding

pub mod directive;
pub mod segment;

pub use directive::*;
pub use segment::*;
