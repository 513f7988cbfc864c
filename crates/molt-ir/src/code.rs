//! Method bodies and the instruction-list builder.

use crate::cfg::{self, ControlFlowGraph};
use crate::instruction::{FieldRef, Instruction, MethodRef, Opcode, Reg};
use crate::types::TypeId;

/// A method body: the instruction list plus CFG construction.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCode {
    insns: Vec<Instruction>,
}

impl MethodCode {
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.insns
    }

    /// The leading `load-param*` run that binds parameter registers.
    #[must_use]
    pub fn param_instructions(&self) -> &[Instruction] {
        let end = self
            .insns
            .iter()
            .position(|insn| !insn.op().is_load_param())
            .unwrap_or(self.insns.len());
        &self.insns[..end]
    }

    /// Every type referenced by the body's instructions: type operands plus
    /// the classes and types named by field and method references.
    pub fn gather_types(&self, out: &mut Vec<TypeId>) {
        for insn in &self.insns {
            if let Some(t) = insn.type_op {
                out.push(t);
            }
            if let Some(field) = &insn.field_op {
                out.push(field.class);
                out.push(field.type_id);
            }
            if let Some(method) = &insn.method_op {
                out.push(method.class);
                method.proto.gather_types(out);
            }
        }
    }

    #[must_use]
    pub fn build_cfg(&self) -> ControlFlowGraph {
        cfg::build(&self.insns)
    }
}

/// A forward-reference branch target used while building code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// Assembles a [`MethodCode`] instruction by instruction.
///
/// Branches name [`Label`]s; `finish` resolves them to instruction indices
/// and asserts every label was bound.
#[derive(Debug, Default)]
pub struct CodeBuilder {
    insns: Vec<Instruction>,
    labels: Vec<Option<usize>>,
    pending: Vec<(usize, Label)>,
}

impl CodeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Binds `label` to the next emitted instruction.
    pub fn bind(&mut self, label: Label) {
        assert!(
            self.labels[label.0].is_none(),
            "label bound more than once"
        );
        self.labels[label.0] = Some(self.insns.len());
    }

    fn push(&mut self, insn: Instruction) -> &mut Self {
        self.insns.push(insn);
        self
    }

    fn push_branch(&mut self, insn: Instruction, label: Label) -> &mut Self {
        self.pending.push((self.insns.len(), label));
        self.insns.push(insn);
        self
    }

    pub fn load_param(&mut self, dest: Reg) -> &mut Self {
        let mut insn = Instruction::new(Opcode::LoadParam);
        insn.dest = Some(dest);
        self.push(insn)
    }

    pub fn load_param_object(&mut self, dest: Reg) -> &mut Self {
        let mut insn = Instruction::new(Opcode::LoadParamObject);
        insn.dest = Some(dest);
        self.push(insn)
    }

    pub fn load_param_wide(&mut self, dest: Reg) -> &mut Self {
        let mut insn = Instruction::new(Opcode::LoadParamWide);
        insn.dest = Some(dest);
        insn.dest_wide = true;
        self.push(insn)
    }

    pub fn nop(&mut self) -> &mut Self {
        self.push(Instruction::new(Opcode::Nop))
    }

    pub fn const_(&mut self, dest: Reg, literal: i64) -> &mut Self {
        let mut insn = Instruction::new(Opcode::Const);
        insn.dest = Some(dest);
        insn.literal = Some(literal);
        self.push(insn)
    }

    pub fn const_wide(&mut self, dest: Reg, literal: i64) -> &mut Self {
        let mut insn = Instruction::new(Opcode::ConstWide);
        insn.dest = Some(dest);
        insn.dest_wide = true;
        insn.literal = Some(literal);
        self.push(insn)
    }

    pub fn const_string(&mut self, dest: Reg) -> &mut Self {
        let mut insn = Instruction::new(Opcode::ConstString);
        insn.dest = Some(dest);
        self.push(insn)
    }

    pub fn const_class(&mut self, ty: TypeId) -> &mut Self {
        let mut insn = Instruction::new(Opcode::ConstClass);
        insn.type_op = Some(ty);
        self.push(insn)
    }

    pub fn move_reg(&mut self, dest: Reg, src: Reg) -> &mut Self {
        let mut insn = Instruction::new(Opcode::Move);
        insn.dest = Some(dest);
        insn.srcs = vec![src];
        self.push(insn)
    }

    pub fn move_object(&mut self, dest: Reg, src: Reg) -> &mut Self {
        let mut insn = Instruction::new(Opcode::MoveObject);
        insn.dest = Some(dest);
        insn.srcs = vec![src];
        self.push(insn)
    }

    pub fn move_wide(&mut self, dest: Reg, src: Reg) -> &mut Self {
        let mut insn = Instruction::new(Opcode::MoveWide);
        insn.dest = Some(dest);
        insn.dest_wide = true;
        insn.srcs = vec![src];
        self.push(insn)
    }

    pub fn move_result(&mut self, dest: Reg) -> &mut Self {
        let mut insn = Instruction::new(Opcode::MoveResult);
        insn.dest = Some(dest);
        self.push(insn)
    }

    pub fn move_result_object(&mut self, dest: Reg) -> &mut Self {
        let mut insn = Instruction::new(Opcode::MoveResultObject);
        insn.dest = Some(dest);
        self.push(insn)
    }

    pub fn move_result_wide(&mut self, dest: Reg) -> &mut Self {
        let mut insn = Instruction::new(Opcode::MoveResultWide);
        insn.dest = Some(dest);
        insn.dest_wide = true;
        self.push(insn)
    }

    pub fn move_result_pseudo(&mut self, dest: Reg) -> &mut Self {
        let mut insn = Instruction::new(Opcode::MoveResultPseudo);
        insn.dest = Some(dest);
        self.push(insn)
    }

    pub fn move_result_pseudo_object(&mut self, dest: Reg) -> &mut Self {
        let mut insn = Instruction::new(Opcode::MoveResultPseudoObject);
        insn.dest = Some(dest);
        self.push(insn)
    }

    pub fn move_result_pseudo_wide(&mut self, dest: Reg) -> &mut Self {
        let mut insn = Instruction::new(Opcode::MoveResultPseudoWide);
        insn.dest = Some(dest);
        insn.dest_wide = true;
        self.push(insn)
    }

    pub fn ret_void(&mut self) -> &mut Self {
        self.push(Instruction::new(Opcode::ReturnVoid))
    }

    pub fn ret(&mut self, src: Reg) -> &mut Self {
        let mut insn = Instruction::new(Opcode::Return);
        insn.srcs = vec![src];
        self.push(insn)
    }

    pub fn ret_object(&mut self, src: Reg) -> &mut Self {
        let mut insn = Instruction::new(Opcode::ReturnObject);
        insn.srcs = vec![src];
        self.push(insn)
    }

    pub fn ret_wide(&mut self, src: Reg) -> &mut Self {
        let mut insn = Instruction::new(Opcode::ReturnWide);
        insn.srcs = vec![src];
        self.push(insn)
    }

    pub fn check_cast(&mut self, src: Reg, ty: TypeId) -> &mut Self {
        let mut insn = Instruction::new(Opcode::CheckCast);
        insn.srcs = vec![src];
        insn.type_op = Some(ty);
        self.push(insn)
    }

    pub fn instance_of(&mut self, src: Reg, ty: TypeId) -> &mut Self {
        let mut insn = Instruction::new(Opcode::InstanceOf);
        insn.srcs = vec![src];
        insn.type_op = Some(ty);
        self.push(insn)
    }

    pub fn new_instance(&mut self, ty: TypeId) -> &mut Self {
        let mut insn = Instruction::new(Opcode::NewInstance);
        insn.type_op = Some(ty);
        self.push(insn)
    }

    pub fn new_array(&mut self, size: Reg, ty: TypeId) -> &mut Self {
        let mut insn = Instruction::new(Opcode::NewArray);
        insn.srcs = vec![size];
        insn.type_op = Some(ty);
        self.push(insn)
    }

    pub fn filled_new_array(&mut self, srcs: Vec<Reg>, ty: TypeId) -> &mut Self {
        let mut insn = Instruction::new(Opcode::FilledNewArray);
        insn.srcs = srcs;
        insn.type_op = Some(ty);
        self.push(insn)
    }

    pub fn aget(&mut self, array: Reg, index: Reg) -> &mut Self {
        let mut insn = Instruction::new(Opcode::Aget);
        insn.srcs = vec![array, index];
        self.push(insn)
    }

    pub fn aget_object(&mut self, array: Reg, index: Reg) -> &mut Self {
        let mut insn = Instruction::new(Opcode::AgetObject);
        insn.srcs = vec![array, index];
        self.push(insn)
    }

    pub fn aput(&mut self, value: Reg, array: Reg, index: Reg) -> &mut Self {
        let mut insn = Instruction::new(Opcode::Aput);
        insn.srcs = vec![value, array, index];
        self.push(insn)
    }

    pub fn aput_object(&mut self, value: Reg, array: Reg, index: Reg) -> &mut Self {
        let mut insn = Instruction::new(Opcode::AputObject);
        insn.srcs = vec![value, array, index];
        self.push(insn)
    }

    pub fn iget(&mut self, obj: Reg, field: FieldRef) -> &mut Self {
        let mut insn = Instruction::new(Opcode::Iget);
        insn.srcs = vec![obj];
        insn.field_op = Some(field);
        self.push(insn)
    }

    pub fn iget_object(&mut self, obj: Reg, field: FieldRef) -> &mut Self {
        let mut insn = Instruction::new(Opcode::IgetObject);
        insn.srcs = vec![obj];
        insn.field_op = Some(field);
        self.push(insn)
    }

    pub fn iput(&mut self, value: Reg, obj: Reg, field: FieldRef) -> &mut Self {
        let mut insn = Instruction::new(Opcode::Iput);
        insn.srcs = vec![value, obj];
        insn.field_op = Some(field);
        self.push(insn)
    }

    pub fn iput_object(&mut self, value: Reg, obj: Reg, field: FieldRef) -> &mut Self {
        let mut insn = Instruction::new(Opcode::IputObject);
        insn.srcs = vec![value, obj];
        insn.field_op = Some(field);
        self.push(insn)
    }

    pub fn sget(&mut self, field: FieldRef) -> &mut Self {
        let mut insn = Instruction::new(Opcode::Sget);
        insn.field_op = Some(field);
        self.push(insn)
    }

    pub fn sget_object(&mut self, field: FieldRef) -> &mut Self {
        let mut insn = Instruction::new(Opcode::SgetObject);
        insn.field_op = Some(field);
        self.push(insn)
    }

    pub fn sput(&mut self, value: Reg, field: FieldRef) -> &mut Self {
        let mut insn = Instruction::new(Opcode::Sput);
        insn.srcs = vec![value];
        insn.field_op = Some(field);
        self.push(insn)
    }

    pub fn sput_object(&mut self, value: Reg, field: FieldRef) -> &mut Self {
        let mut insn = Instruction::new(Opcode::SputObject);
        insn.srcs = vec![value];
        insn.field_op = Some(field);
        self.push(insn)
    }

    pub fn invoke_virtual(&mut self, method: MethodRef, srcs: Vec<Reg>) -> &mut Self {
        self.invoke(Opcode::InvokeVirtual, method, srcs)
    }

    pub fn invoke_super(&mut self, method: MethodRef, srcs: Vec<Reg>) -> &mut Self {
        self.invoke(Opcode::InvokeSuper, method, srcs)
    }

    pub fn invoke_direct(&mut self, method: MethodRef, srcs: Vec<Reg>) -> &mut Self {
        self.invoke(Opcode::InvokeDirect, method, srcs)
    }

    pub fn invoke_static(&mut self, method: MethodRef, srcs: Vec<Reg>) -> &mut Self {
        self.invoke(Opcode::InvokeStatic, method, srcs)
    }

    pub fn invoke_interface(&mut self, method: MethodRef, srcs: Vec<Reg>) -> &mut Self {
        self.invoke(Opcode::InvokeInterface, method, srcs)
    }

    fn invoke(&mut self, op: Opcode, method: MethodRef, srcs: Vec<Reg>) -> &mut Self {
        let mut insn = Instruction::new(op);
        insn.srcs = srcs;
        insn.method_op = Some(method);
        self.push(insn)
    }

    pub fn goto(&mut self, label: Label) -> &mut Self {
        self.push_branch(Instruction::new(Opcode::Goto), label)
    }

    pub fn if_eqz(&mut self, src: Reg, label: Label) -> &mut Self {
        let mut insn = Instruction::new(Opcode::IfEqz);
        insn.srcs = vec![src];
        self.push_branch(insn, label)
    }

    pub fn if_eq(&mut self, a: Reg, b: Reg, label: Label) -> &mut Self {
        let mut insn = Instruction::new(Opcode::IfEq);
        insn.srcs = vec![a, b];
        self.push_branch(insn, label)
    }

    pub fn throw(&mut self, src: Reg) -> &mut Self {
        let mut insn = Instruction::new(Opcode::Throw);
        insn.srcs = vec![src];
        self.push(insn)
    }

    pub fn add_int(&mut self, dest: Reg, a: Reg, b: Reg) -> &mut Self {
        let mut insn = Instruction::new(Opcode::AddInt);
        insn.dest = Some(dest);
        insn.srcs = vec![a, b];
        self.push(insn)
    }

    #[must_use]
    pub fn finish(mut self) -> MethodCode {
        for (insn_idx, label) in &self.pending {
            let target = self.labels[label.0].expect("branch to unbound label");
            assert!(target < self.insns.len(), "label bound past end of code");
            self.insns[*insn_idx].target = Some(target);
        }
        MethodCode { insns: self.insns }
    }
}
