//! Enum-to-integer safety analysis.
//!
//! Given the set of enum classes tentatively eligible for replacement by
//! boxed integers, this pass rejects every candidate whose values can be
//! observed through a supertype (Object, Enum, Class, or an interface),
//! since any such "upcast" would break the integer-substitution rewrite.
//! The surviving candidates are what the surrounding optimizer may
//! transform.
//!
//! The analysis is intra-procedural: a per-method type-flow fixpoint
//! (`molt-flow`) followed by an instruction walk that flags inconsistencies
//! between inferred and required types. Methods are analyzed in parallel;
//! the rejection set is shared and insert-only until the final prune.

mod driver;
mod upcast;

pub use crate::driver::{
    is_enum_valueof, is_enum_values, is_static_method_on_enum_class, reject_unsafe_enums,
    reject_unsafe_enums_with, CandidateEnums, EnumAnalysisConfig,
};
pub use crate::upcast::Reason;
