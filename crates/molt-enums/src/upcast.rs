//! Post-fixpoint instruction walk that rejects upcast-observed candidates.

use std::collections::BTreeSet;
use std::fmt;

use molt_flow::{EnumFixpointIterator, EnumTypeEnvironment, EnumTypes};
use molt_ir::{
    ControlFlowGraph, DexMethod, Instruction, MethodCode, MethodRef, Name, Opcode, Program, Proto,
    TypeId, TypeStore,
};

use crate::driver::{is_enum_valueof, is_enum_values, CandidateEnums, RejectedEnums};

/// Why an enum candidate cannot be converted to an integer object.
///
/// Retained for logging only; some enums are rejected for several reasons
/// and only the first one observed is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    Unknown,
    CastWhenReturn,
    CastThisPointer,
    CastParameter,
    UsedAsClassObject,
    CastCheckCast,
    CastIsputObject,
    CastAputObject,
    MultiEnumTypes,
    UnsafeInvocationOnCandidateEnum,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reason::Unknown => "unknown",
            Reason::CastWhenReturn => "cast_when_return",
            Reason::CastThisPointer => "cast_this_pointer",
            Reason::CastParameter => "cast_parameter",
            Reason::UsedAsClassObject => "used_as_class_object",
            Reason::CastCheckCast => "cast_check_cast",
            Reason::CastIsputObject => "cast_isput_object",
            Reason::CastAputObject => "cast_aput_object",
            Reason::MultiEnumTypes => "multi_enum_types",
            Reason::UnsafeInvocationOnCandidateEnum => "unsafe_invocation_on_candidate_enum",
        };
        f.write_str(name)
    }
}

/// The `java.lang.Enum` virtual methods (plus `StringBuilder.append`) whose
/// invocations are modeled instead of treated as upcasts.
///
/// `equals` and `compareTo` are final; `toString` on a candidate behaves like
/// `name()` because candidates overriding `toString` are rejected elsewhere.
pub(crate) struct SafeEnumMethods {
    equals: (Name, Proto),
    compare_to: (Name, Proto),
    to_string: (Name, Proto),
    name: (Name, Proto),
    ordinal: (Name, Proto),
    string_builder_append: MethodRef,
}

impl SafeEnumMethods {
    pub(crate) fn new(store: &TypeStore) -> Self {
        let wk = store.well_known();
        Self {
            equals: (
                Name::new("equals"),
                Proto::new(wk.boolean, vec![wk.object]),
            ),
            compare_to: (
                Name::new("compareTo"),
                Proto::new(wk.int, vec![wk.enum_type]),
            ),
            to_string: (Name::new("toString"), Proto::new(wk.string, vec![])),
            name: (Name::new("name"), Proto::new(wk.string, vec![])),
            ordinal: (Name::new("ordinal"), Proto::new(wk.int, vec![])),
            string_builder_append: MethodRef {
                class: wk.string_builder,
                name: Name::new("append"),
                proto: Proto::new(wk.string_builder, vec![wk.object]),
            },
        }
    }

    fn signature_matches(r: &MethodRef, signature: &(Name, Proto)) -> bool {
        r.name == signature.0 && r.proto == signature.1
    }

    fn is_equals_or_compare_to(&self, r: &MethodRef) -> bool {
        Self::signature_matches(r, &self.equals) || Self::signature_matches(r, &self.compare_to)
    }

    fn is_to_string_name_or_ordinal(&self, r: &MethodRef) -> bool {
        Self::signature_matches(r, &self.to_string)
            || Self::signature_matches(r, &self.name)
            || Self::signature_matches(r, &self.ordinal)
    }

    fn is_string_builder_append(&self, r: &MethodRef) -> bool {
        *r == self.string_builder_append
    }
}

/// Inspects instructions against the fixpoint result and rejects candidates
/// that may be observed as another type. Writes only to the rejected set.
pub(crate) struct UpcastDetector<'a> {
    method: &'a DexMethod,
    program: &'a Program,
    candidates: &'a CandidateEnums,
    safe: &'a SafeEnumMethods,
}

impl<'a> UpcastDetector<'a> {
    pub(crate) fn new(
        method: &'a DexMethod,
        program: &'a Program,
        candidates: &'a CandidateEnums,
        safe: &'a SafeEnumMethods,
    ) -> Self {
        Self {
            method,
            program,
            candidates,
            safe,
        }
    }

    pub(crate) fn run(
        &self,
        engine: &EnumFixpointIterator<'_>,
        cfg: &ControlFlowGraph,
        code: &MethodCode,
        rejected: &RejectedEnums,
    ) {
        for block in cfg.block_ids() {
            let mut env = engine.entry_state_at(block).clone();
            if env.is_bottom() {
                continue;
            }
            for insn in &code.instructions()[cfg.block(block).range()] {
                engine.analyze_instruction(insn, &mut env);
                self.process_instruction(insn, &env, rejected);
            }
        }
    }

    fn process_instruction(
        &self,
        insn: &Instruction,
        env: &EnumTypeEnvironment,
        rejected: &RejectedEnums,
    ) {
        match insn.op() {
            Opcode::CheckCast => {
                self.reject_if_inconsistent(
                    &env.get(insn.src(0)),
                    insn.type_operand(),
                    rejected,
                    Reason::CastCheckCast,
                );
            }
            Opcode::ConstClass => {
                self.reject(insn.type_operand(), rejected, Reason::UsedAsClassObject);
            }
            Opcode::InvokeInterface | Opcode::InvokeSuper => {
                self.process_general_invocation(insn, env, rejected);
            }
            Opcode::InvokeDirect => self.process_direct_invocation(insn, env, rejected),
            Opcode::InvokeStatic => self.process_static_invocation(insn, env, rejected),
            Opcode::InvokeVirtual => self.process_virtual_invocation(insn, env, rejected),
            Opcode::ReturnObject => self.process_return_object(insn, env, rejected),
            Opcode::AputObject => self.process_aput_object(insn, env, rejected),
            Opcode::IgetObject => {
                // Candidate enums do not contain any instance field.
                assert!(
                    !self.candidates.contains(insn.field_operand().class),
                    "instance field read on candidate enum in {}",
                    self.method.name,
                );
            }
            Opcode::IputObject => {
                assert!(
                    !self.candidates.contains(insn.field_operand().class),
                    "instance field write on candidate enum in {}",
                    self.method.name,
                );
                self.process_isput_object(insn, env, rejected);
            }
            Opcode::SputObject => self.process_isput_object(insn, env, rejected),
            _ => {}
        }
    }

    fn process_return_object(
        &self,
        insn: &Instruction,
        env: &EnumTypeEnvironment,
        rejected: &RejectedEnums,
    ) {
        let types = env.get(insn.src(0));
        assert!(
            types.is_value(),
            "return-object reads an undefined register in {}.{}",
            self.program.store().descriptor(self.method.class),
            self.method.name,
        );
        self.reject_if_inconsistent(&types, self.method.proto.rtype, rejected, Reason::CastWhenReturn);
    }

    fn process_isput_object(
        &self,
        insn: &Instruction,
        env: &EnumTypeEnvironment,
        rejected: &RejectedEnums,
    ) {
        let field_type = insn.field_operand().type_id;
        self.reject_if_inconsistent(
            &env.get(insn.src(0)),
            field_type,
            rejected,
            Reason::CastIsputObject,
        );
    }

    fn process_aput_object(
        &self,
        insn: &Instruction,
        env: &EnumTypeEnvironment,
        rejected: &RejectedEnums,
    ) {
        // The array register may hold non-array types or arrays of
        // primitives; those contribute no acceptable element type.
        let store = self.program.store();
        let array_types = env.get(insn.src(1));
        let elem_types = env.get(insn.src(0));
        let mut acceptable_elem_types = BTreeSet::new();
        for array_type in array_types.elements() {
            if let Some(component) = store.component_type(array_type) {
                if !store.is_primitive(component) {
                    acceptable_elem_types.insert(component);
                }
            }
        }
        if acceptable_elem_types.len() > 1 {
            // An array register holding arrays of several element types is
            // beyond this analysis; reject everything involved.
            for t in elem_types.elements() {
                self.reject(t, rejected, Reason::CastAputObject);
            }
            for &t in &acceptable_elem_types {
                self.reject(t, rejected, Reason::CastAputObject);
            }
        } else if let Some(&acceptable) = acceptable_elem_types.iter().next() {
            self.reject_if_inconsistent(&elem_types, acceptable, rejected, Reason::CastAputObject);
        }
    }

    /// Candidate enum constructors are only invoked from their `<clinit>`,
    /// which the driver skips, so a direct invocation on a candidate here is
    /// an invariant violation.
    fn process_direct_invocation(
        &self,
        insn: &Instruction,
        env: &EnumTypeEnvironment,
        rejected: &RejectedEnums,
    ) {
        let container = insn.method_operand().class;
        assert!(
            !self.candidates.contains(container),
            "direct invocation on candidate enum {} in {}",
            self.program.store().descriptor(container),
            self.method.name,
        );
        self.process_general_invocation(insn, env, rejected);
    }

    /// `CandidateEnum.values()` and `CandidateEnum.valueOf(String)` are
    /// rewritten by the transformer itself; other static calls go through the
    /// general argument check.
    fn process_static_invocation(
        &self,
        insn: &Instruction,
        env: &EnumTypeEnvironment,
        rejected: &RejectedEnums,
    ) {
        let method = insn.method_operand();
        if self.candidates.contains(method.class)
            && (is_enum_values(self.program, method) || is_enum_valueof(self.program, method))
        {
            return;
        }
        self.process_general_invocation(insn, env, rejected);
    }

    fn process_virtual_invocation(
        &self,
        insn: &Instruction,
        env: &EnumTypeEnvironment,
        rejected: &RejectedEnums,
    ) {
        let store = self.program.store();
        let method = insn.method_operand();
        let container = method.class;

        // Receiver class is Enum itself or a candidate enum.
        if container == store.well_known().enum_type || self.candidates.contains(container) {
            let this_types = discard_primitives(&env.get(insn.src(0)), store);
            if self.safe.is_equals_or_compare_to(method) {
                let that_types = discard_primitives(&env.get(insn.src(1)), store);
                let this_type = this_types.iter().next();
                let that_type = that_types.iter().next();
                let singletons_differ = match (this_type, that_type) {
                    (Some(a), Some(b)) => a != b,
                    _ => false,
                };
                if this_types.len() > 1 || that_types.len() > 1 || singletons_differ {
                    self.reject_all(&this_types, rejected, Reason::CastThisPointer);
                    self.reject_all(&that_types, rejected, Reason::CastParameter);
                }
                return;
            }
            if self.safe.is_to_string_name_or_ordinal(method) {
                if this_types.len() > 1 {
                    self.reject_all(&this_types, rejected, Reason::MultiEnumTypes);
                }
                return;
            }
        } else if self.safe.is_string_builder_append(method) {
            let that_types = discard_primitives(&env.get(insn.src(1)), store);
            if that_types.len() > 1 {
                self.reject_all(&that_types, rejected, Reason::MultiEnumTypes);
            }
            return;
        }

        self.process_general_invocation(insn, env, rejected);
    }

    /// Checks every actual argument against the formal signature and, for
    /// non-static calls, the receiver against the declaring class.
    fn process_general_invocation(
        &self,
        insn: &Instruction,
        env: &EnumTypeEnvironment,
        rejected: &RejectedEnums,
    ) {
        assert!(insn.has_method());
        let method = insn.method_operand();
        let container = method.class;
        // Non-static invocations on candidate enum classes are unsafe to
        // optimize no matter how the arguments check out.
        if insn.op() != Opcode::InvokeStatic && self.candidates.contains(container) {
            tracing::trace!(
                method = %self.method.name,
                callee = self.program.store().descriptor(container),
                "unsafe invocation on candidate enum"
            );
            self.reject(container, rejected, Reason::UnsafeInvocationOnCandidateEnum);
        }

        let args = &method.proto.args;
        let srcs = insn.srcs().len();
        assert!(
            srcs == args.len() || srcs == args.len() + 1,
            "invocation arity mismatch in {}",
            self.method.name,
        );
        let mut arg_id = 0;
        if srcs == args.len() + 1 {
            // this pointer
            self.reject_if_inconsistent(
                &env.get(insn.src(arg_id)),
                container,
                rejected,
                Reason::CastThisPointer,
            );
            arg_id += 1;
        }
        for &formal in args {
            self.reject_if_inconsistent(
                &env.get(insn.src(arg_id)),
                formal,
                rejected,
                Reason::CastParameter,
            );
            arg_id += 1;
        }
    }

    /// If the register's inferred types disagree with `required_type`, both
    /// sides of the disagreement leave the candidate set.
    fn reject_if_inconsistent(
        &self,
        types: &EnumTypes,
        required_type: TypeId,
        rejected: &RejectedEnums,
        reason: Reason,
    ) {
        let store = self.program.store();
        if self.candidates.contains(required_type) {
            let mut need_delete = false;
            for possible_type in types.elements() {
                if !store.is_primitive(possible_type) && possible_type != required_type {
                    need_delete = true;
                    self.reject(possible_type, rejected, reason);
                }
            }
            if need_delete {
                self.reject(required_type, rejected, reason);
            }
        } else {
            for possible_type in types.elements() {
                self.reject(possible_type, rejected, reason);
            }
        }
    }

    fn reject_all(&self, types: &BTreeSet<TypeId>, rejected: &RejectedEnums, reason: Reason) {
        for &t in types {
            self.reject(t, rejected, reason);
        }
    }

    fn reject(&self, t: TypeId, rejected: &RejectedEnums, reason: Reason) {
        if self.candidates.contains(t) {
            rejected.insert(t);
            tracing::trace!(
                enum_type = self.program.store().descriptor(t),
                %reason,
                method = %self.method.name,
                "rejected enum candidate"
            );
        }
    }
}

fn discard_primitives(types: &EnumTypes, store: &TypeStore) -> BTreeSet<TypeId> {
    types
        .elements()
        .filter(|&t| !store.is_primitive(t))
        .collect()
}
