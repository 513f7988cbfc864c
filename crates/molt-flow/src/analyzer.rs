//! Per-opcode transfer function and the forward fixpoint engine.

use std::collections::VecDeque;

use molt_ir::{
    BlockId, ControlFlowGraph, DexMethod, Instruction, MethodCode, Opcode, Reg, TypeStore,
};

use crate::domain::{EnumTypeEnvironment, EnumTypes};

/// Forward monotone iteration of the enum type-flow transfer function over a
/// method's CFG.
///
/// After [`run`](Self::run), per-block entry states are available through
/// [`entry_state_at`](Self::entry_state_at) and clients replay
/// [`analyze_instruction`](Self::analyze_instruction) to recover the state at
/// any program point inside a block.
pub struct EnumFixpointIterator<'a> {
    cfg: &'a ControlFlowGraph,
    code: &'a MethodCode,
    store: &'a TypeStore,
    entry_states: Vec<EnumTypeEnvironment>,
}

impl<'a> EnumFixpointIterator<'a> {
    pub fn new(cfg: &'a ControlFlowGraph, code: &'a MethodCode, store: &'a TypeStore) -> Self {
        let entry_states = vec![EnumTypeEnvironment::bottom(); cfg.block_count()];
        Self {
            cfg,
            code,
            store,
            entry_states,
        }
    }

    /// Seeds the entry block with the parameter environment of `method`.
    ///
    /// Non-static methods bind the receiver register to the declaring class
    /// first; each following `load-param*` binds its formal's declared type.
    pub fn gen_env(method: &DexMethod, store: &TypeStore) -> EnumTypeEnvironment {
        let code = method
            .code
            .as_ref()
            .expect("cannot seed an environment for an abstract method");
        let params = code.param_instructions();
        let has_this = !method.is_static;
        assert_eq!(
            params.len(),
            method.proto.args.len() + usize::from(has_this),
            "load-param count does not match arity of {}.{}",
            store.descriptor(method.class),
            method.name,
        );

        let mut env = EnumTypeEnvironment::empty();
        let mut params = params.iter();
        if has_this {
            let insn = params.next().expect("receiver load-param");
            env.set(param_dest(insn), EnumTypes::of(method.class));
        }
        for (insn, &ty) in params.zip(&method.proto.args) {
            env.set(param_dest(insn), EnumTypes::of(ty));
        }
        env
    }

    /// Runs chaotic iteration to the least fixpoint from `init_env`.
    pub fn run(&mut self, init_env: EnumTypeEnvironment) {
        let cfg = self.cfg;
        let code = self.code;
        for state in &mut self.entry_states {
            *state = EnumTypeEnvironment::bottom();
        }
        self.entry_states[cfg.entry().index()] = init_env;

        let mut worklist = VecDeque::from([cfg.entry()]);
        while let Some(block) = worklist.pop_front() {
            let mut env = self.entry_states[block.index()].clone();
            for insn in &code.instructions()[cfg.block(block).range()] {
                self.analyze_instruction(insn, &mut env);
            }
            for succ in cfg.successors(block) {
                if self.entry_states[succ.index()].join_with(&env) {
                    worklist.push_back(succ);
                }
            }
        }
    }

    #[must_use]
    pub fn entry_state_at(&self, block: BlockId) -> &EnumTypeEnvironment {
        &self.entry_states[block.index()]
    }

    /// Applies one instruction's abstract semantics to `env`.
    ///
    /// Instructions that produce their value through a following
    /// `move-result*` write [`Reg::RESULT`]; the move then copies it out.
    pub fn analyze_instruction(&self, insn: &Instruction, env: &mut EnumTypeEnvironment) {
        let use_result = insn.op().writes_result_register();
        let dest = if use_result {
            Reg::RESULT
        } else {
            match insn.dest() {
                Some(dest) => dest,
                None => return,
            }
        };

        match insn.op() {
            // Parameters are seeded before the fixpoint starts.
            Opcode::LoadParam | Opcode::LoadParamObject | Opcode::LoadParamWide => {}
            Opcode::MoveObject => {
                let types = env.get(insn.src(0));
                env.set(dest, types);
            }
            Opcode::InvokeVirtual
            | Opcode::InvokeSuper
            | Opcode::InvokeDirect
            | Opcode::InvokeStatic
            | Opcode::InvokeInterface => {
                let rtype = insn.method_operand().proto.rtype;
                env.set(dest, EnumTypes::of(rtype));
            }
            // A const-class binds a Class object, not an instance of the
            // named type.
            Opcode::ConstClass => {
                env.set(dest, EnumTypes::of(self.store.well_known().class));
            }
            Opcode::CheckCast => {
                env.set(dest, EnumTypes::of(insn.type_operand()));
            }
            Opcode::MoveResultObject | Opcode::MoveResultPseudoObject => {
                let types = env.get(Reg::RESULT);
                env.set(dest, types);
            }
            Opcode::SgetObject | Opcode::IgetObject => {
                let ty = insn.field_operand().type_id;
                if !self.store.is_primitive(ty) {
                    env.set(dest, EnumTypes::of(ty));
                }
            }
            Opcode::AgetObject => {
                let mut types = EnumTypes::empty();
                for array_type in env.get(insn.src(0)).elements() {
                    if let Some(component) = self.store.component_type(array_type) {
                        if !self.store.is_primitive(component) {
                            types.add(component);
                        }
                    }
                }
                env.set(dest, types);
            }
            _ => {
                if insn.has_type() {
                    env.set(dest, EnumTypes::of(insn.type_operand()));
                } else {
                    env.set(dest, EnumTypes::empty());
                }
                // Writing a wide register overrides its pair register too.
                if let Some(dest) = insn.dest() {
                    if insn.dest_is_wide() {
                        env.set(dest.pair(), EnumTypes::empty());
                    }
                }
            }
        }
    }
}

fn param_dest(insn: &Instruction) -> Reg {
    insn.dest().expect("load-param instruction has a dest")
}
