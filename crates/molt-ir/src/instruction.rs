//! Registers, opcodes, and instructions.

use crate::name::Name;
use crate::types::TypeId;

/// A virtual register.
///
/// `Reg::RESULT` is the reserved pseudo-register carrying the value produced
/// by an invocation (or an instruction with a pseudo result, such as
/// `check-cast` and the `*get-object` family) until the immediately following
/// `move-result*` copies it out.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(transparent)]
pub struct Reg(pub u32);

impl Reg {
    pub const RESULT: Reg = Reg(u32::MAX);

    /// The second half of a wide register pair.
    #[inline]
    pub const fn pair(self) -> Reg {
        Reg(self.0 + 1)
    }
}

impl std::fmt::Debug for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if *self == Reg::RESULT {
            write!(f, "vRESULT")
        } else {
            write!(f, "v{}", self.0)
        }
    }
}

/// A method signature: return type plus argument types, receiver excluded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Proto {
    pub rtype: TypeId,
    pub args: Vec<TypeId>,
}

impl Proto {
    pub fn new(rtype: TypeId, args: Vec<TypeId>) -> Self {
        Self { rtype, args }
    }

    /// Every type the signature names.
    pub fn gather_types(&self, out: &mut Vec<TypeId>) {
        out.push(self.rtype);
        out.extend_from_slice(&self.args);
    }
}

/// An unresolved field reference carried by a `*get`/`*put` instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub class: TypeId,
    pub name: Name,
    pub type_id: TypeId,
}

/// An unresolved method reference carried by an `invoke-*` instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRef {
    pub class: TypeId,
    pub name: Name,
    pub proto: Proto,
}

/// The analyzed subset of Dalvik opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    LoadParam,
    LoadParamObject,
    LoadParamWide,
    Nop,
    Const,
    ConstWide,
    ConstString,
    ConstClass,
    Move,
    MoveObject,
    MoveWide,
    MoveResult,
    MoveResultObject,
    MoveResultWide,
    MoveResultPseudo,
    MoveResultPseudoObject,
    MoveResultPseudoWide,
    ReturnVoid,
    Return,
    ReturnObject,
    ReturnWide,
    CheckCast,
    InstanceOf,
    NewInstance,
    NewArray,
    FilledNewArray,
    Aget,
    AgetObject,
    Aput,
    AputObject,
    Iget,
    IgetObject,
    Iput,
    IputObject,
    Sget,
    SgetObject,
    Sput,
    SputObject,
    InvokeVirtual,
    InvokeSuper,
    InvokeDirect,
    InvokeStatic,
    InvokeInterface,
    Goto,
    IfEqz,
    IfEq,
    Throw,
    AddInt,
}

impl Opcode {
    pub fn is_invoke(self) -> bool {
        matches!(
            self,
            Opcode::InvokeVirtual
                | Opcode::InvokeSuper
                | Opcode::InvokeDirect
                | Opcode::InvokeStatic
                | Opcode::InvokeInterface
        )
    }

    pub fn is_load_param(self) -> bool {
        matches!(
            self,
            Opcode::LoadParam | Opcode::LoadParamObject | Opcode::LoadParamWide
        )
    }

    pub fn is_return(self) -> bool {
        matches!(
            self,
            Opcode::ReturnVoid | Opcode::Return | Opcode::ReturnObject | Opcode::ReturnWide
        )
    }

    pub fn is_conditional_branch(self) -> bool {
        matches!(self, Opcode::IfEqz | Opcode::IfEq)
    }

    /// Instructions after which control never falls through.
    pub fn is_terminator(self) -> bool {
        self.is_return() || matches!(self, Opcode::Goto | Opcode::Throw)
    }

    /// Whether the instruction ends its basic block.
    pub(crate) fn ends_block(self) -> bool {
        self.is_terminator() || self.is_conditional_branch()
    }

    /// Instructions that deposit their result in [`Reg::RESULT`] for a
    /// following `move-result-pseudo*` instruction.
    pub fn has_move_result_pseudo(self) -> bool {
        matches!(
            self,
            Opcode::ConstClass
                | Opcode::CheckCast
                | Opcode::InstanceOf
                | Opcode::NewInstance
                | Opcode::NewArray
                | Opcode::Aget
                | Opcode::AgetObject
                | Opcode::Iget
                | Opcode::IgetObject
                | Opcode::Sget
                | Opcode::SgetObject
        )
    }

    /// Instructions whose value is delivered through [`Reg::RESULT`], either
    /// by a real `move-result*` (invokes, `filled-new-array`) or by a pseudo
    /// one.
    pub fn writes_result_register(self) -> bool {
        self.is_invoke() || self.has_move_result_pseudo() || matches!(self, Opcode::FilledNewArray)
    }
}

/// A single instruction: opcode plus its operands.
///
/// Built through [`crate::CodeBuilder`]; branch targets are resolved to
/// instruction indices when the builder finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub(crate) op: Opcode,
    pub(crate) dest: Option<Reg>,
    pub(crate) dest_wide: bool,
    pub(crate) srcs: Vec<Reg>,
    pub(crate) type_op: Option<TypeId>,
    pub(crate) field_op: Option<FieldRef>,
    pub(crate) method_op: Option<MethodRef>,
    pub(crate) literal: Option<i64>,
    pub(crate) target: Option<usize>,
}

impl Instruction {
    pub(crate) fn new(op: Opcode) -> Self {
        Self {
            op,
            dest: None,
            dest_wide: false,
            srcs: Vec::new(),
            type_op: None,
            field_op: None,
            method_op: None,
            literal: None,
            target: None,
        }
    }

    pub fn op(&self) -> Opcode {
        self.op
    }

    pub fn dest(&self) -> Option<Reg> {
        self.dest
    }

    pub fn dest_is_wide(&self) -> bool {
        self.dest_wide
    }

    pub fn srcs(&self) -> &[Reg] {
        &self.srcs
    }

    pub fn src(&self, i: usize) -> Reg {
        self.srcs[i]
    }

    pub fn has_type(&self) -> bool {
        self.type_op.is_some()
    }

    pub fn type_operand(&self) -> TypeId {
        self.type_op.expect("instruction has no type operand")
    }

    pub fn has_field(&self) -> bool {
        self.field_op.is_some()
    }

    pub fn field_operand(&self) -> &FieldRef {
        self.field_op
            .as_ref()
            .expect("instruction has no field operand")
    }

    pub fn has_method(&self) -> bool {
        self.method_op.is_some()
    }

    pub fn method_operand(&self) -> &MethodRef {
        self.method_op
            .as_ref()
            .expect("instruction has no method operand")
    }

    pub fn literal(&self) -> Option<i64> {
        self.literal
    }

    /// Branch target as an instruction index.
    pub fn target(&self) -> Option<usize> {
        self.target
    }

    pub fn has_move_result_pseudo(&self) -> bool {
        self.op.has_move_result_pseudo()
    }
}
