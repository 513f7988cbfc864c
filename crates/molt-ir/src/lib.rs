//! Dex-level IR consumed by molt's analyses.
//!
//! The shrinker's optimization passes operate on a register-machine view of
//! Dalvik bytecode: interned type descriptors, classes with fields and
//! methods, instruction lists per method body, and a non-editable control-flow
//! graph built on demand. This crate carries no analysis logic of its own.

mod cfg;
mod code;
mod error;
mod id;
mod instruction;
mod name;
mod program;
mod types;

pub use crate::cfg::{BasicBlock, BlockId, ControlFlowGraph};
pub use crate::code::{CodeBuilder, Label, MethodCode};
pub use crate::error::{Error, Result};
pub use crate::id::{ClassId, FieldId, MethodId};
pub use crate::instruction::{FieldRef, Instruction, MethodRef, Opcode, Proto, Reg};
pub use crate::name::Name;
pub use crate::program::{DexClass, DexField, DexMethod, Program, ProgramBuilder};
pub use crate::types::{TypeId, TypeStore, WellKnownTypes};
