//! Type-flow analysis over dex method bodies.
//!
//! Tracks, for each virtual register at each program point, the set of
//! reference types that may flow into it, as a forward monotone fixpoint over
//! the method's CFG. The upcast detector in `molt-enums` replays the transfer
//! function against the fixpoint result.

mod analyzer;
mod domain;

pub use crate::analyzer::EnumFixpointIterator;
pub use crate::domain::{EnumTypeEnvironment, EnumTypes};
