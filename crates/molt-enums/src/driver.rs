//! Parallel per-method orchestration and the candidate/rejected sets.

use std::collections::HashSet;
use std::thread;

use parking_lot::Mutex;
use rayon::prelude::*;

use molt_flow::EnumFixpointIterator;
use molt_ir::{DexField, DexMethod, MethodRef, Program, TypeId};

use crate::upcast::{SafeEnumMethods, UpcastDetector};

/// Enum classes still eligible for the integer rewrite.
///
/// The set must not change while methods are being analyzed: workers read it
/// without synchronization. That lifecycle is enforced here by the borrow
/// checker; [`reject_unsafe_enums`] hands workers a shared borrow and only
/// reclaims the exclusive borrow for the final prune, after the worker
/// barrier.
#[derive(Debug, Default, Clone)]
pub struct CandidateEnums {
    types: HashSet<TypeId>,
}

impl CandidateEnums {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, t: TypeId) -> bool {
        self.types.insert(t)
    }

    pub fn remove(&mut self, t: TypeId) -> bool {
        self.types.remove(&t)
    }

    #[must_use]
    pub fn contains(&self, t: TypeId) -> bool {
        self.types.contains(&t)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.types.iter().copied()
    }
}

impl FromIterator<TypeId> for CandidateEnums {
    fn from_iter<I: IntoIterator<Item = TypeId>>(iter: I) -> Self {
        Self {
            types: iter.into_iter().collect(),
        }
    }
}

/// Candidates proven unsafe. Insert-only while workers run; drained once,
/// sequentially, for the final prune.
#[derive(Debug, Default)]
pub(crate) struct RejectedEnums {
    inner: Mutex<HashSet<TypeId>>,
}

impl RejectedEnums {
    pub(crate) fn insert(&self, t: TypeId) {
        self.inner.lock().insert(t);
    }

    pub(crate) fn contains(&self, t: TypeId) -> bool {
        self.inner.lock().contains(&t)
    }

    pub(crate) fn into_inner(self) -> HashSet<TypeId> {
        self.inner.into_inner()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnumAnalysisConfig {
    /// Worker count; defaults to the available parallelism.
    pub threads: Option<usize>,
}

/// Removes from `candidates` every enum whose values may be observed through
/// a supertype anywhere in `program`.
pub fn reject_unsafe_enums(program: &Program, candidates: &mut CandidateEnums) {
    reject_unsafe_enums_with(program, candidates, EnumAnalysisConfig::default());
}

pub fn reject_unsafe_enums_with(
    program: &Program,
    candidates: &mut CandidateEnums,
    config: EnumAnalysisConfig,
) {
    let rejected = RejectedEnums::default();
    let safe = SafeEnumMethods::new(program.store());
    let pool = build_pool(config.threads.unwrap_or_else(default_threads));

    {
        let candidates = &*candidates;

        // Candidates referenced by un-renameable fields of other classes are
        // pinned by keep rules (reflection, serialization); drop them before
        // looking at any code.
        pool.install(|| {
            program.classes().par_iter().for_each(|class| {
                for &field_id in &class.fields {
                    filter_field(program, program.field(field_id), candidates, &rejected);
                }
            });
        });

        pool.install(|| {
            program.methods().par_iter().for_each(|method| {
                analyze_method(program, method, candidates, &safe, &rejected);
            });
        });
    }

    for t in rejected.into_inner() {
        candidates.remove(t);
    }
}

fn filter_field(
    program: &Program,
    field: &DexField,
    candidates: &CandidateEnums,
    rejected: &RejectedEnums,
) {
    if candidates.contains(field.class) {
        return;
    }
    let ty = program.store().array_element_type(field.type_id);
    if candidates.contains(ty) && !rejected.contains(ty) && !field.can_rename {
        rejected.insert(ty);
    }
}

fn analyze_method(
    program: &Program,
    method: &DexMethod,
    candidates: &CandidateEnums,
    safe: &SafeEnumMethods,
    rejected: &RejectedEnums,
) {
    if is_generated_enum_method(program, method, candidates, rejected) {
        return;
    }

    let store = program.store();
    let mut proto_types = Vec::new();
    method.proto.gather_types(&mut proto_types);
    for t in proto_types {
        let t = store.array_element_type(t);
        if candidates.contains(t) && !rejected.contains(t) && !method.can_rename {
            rejected.insert(t);
        }
    }

    if !need_analyze(program, method, candidates, rejected) {
        return;
    }

    let code = method
        .code
        .as_ref()
        .expect("need_analyze only selects methods with code");
    let env = EnumFixpointIterator::gen_env(method, store);
    let cfg = code.build_cfg();
    let mut engine = EnumFixpointIterator::new(&cfg, code, store);
    engine.run(env);

    let detector = UpcastDetector::new(method, program, candidates, safe);
    detector.run(&engine, &cfg, code, rejected);
}

/// The compiler-emitted members of an enum (`<clinit>`, `<init>`, `values()`,
/// `valueOf(String)`) contain internal upcasts that the transformer rewrites
/// wholesale; analyzing them would reject every candidate.
fn is_generated_enum_method(
    program: &Program,
    method: &DexMethod,
    candidates: &CandidateEnums,
    rejected: &RejectedEnums,
) -> bool {
    candidates.contains(method.class)
        && !rejected.contains(method.class)
        && (method.is_clinit()
            || method.is_init()
            || is_enum_values(program, &method.to_ref())
            || is_enum_valueof(program, &method.to_ref()))
}

/// Most methods never touch a live candidate; skip CFG construction for them.
fn need_analyze(
    program: &Program,
    method: &DexMethod,
    candidates: &CandidateEnums,
    rejected: &RejectedEnums,
) -> bool {
    if method.code.is_none() {
        return false;
    }
    let store = program.store();
    method.gather_types().into_iter().any(|t| {
        let t = store.array_element_type(t);
        candidates.contains(t) && !rejected.contains(t)
    })
}

/// Whether `r` resolves to a defined static method of an enum class.
pub fn is_static_method_on_enum_class(program: &Program, r: &MethodRef) -> bool {
    let Some(method) = program.resolve_method(r) else {
        return false;
    };
    if !method.is_static {
        return false;
    }
    program.class_of(method.class).is_some_and(|c| c.is_enum)
}

/// `values()` of an enum class: no arguments, returns an array of the class.
pub fn is_enum_values(program: &Program, r: &MethodRef) -> bool {
    if !is_static_method_on_enum_class(program, r) || r.name != "values" {
        return false;
    }
    if !r.proto.args.is_empty() {
        return false;
    }
    program.store().component_type(r.proto.rtype) == Some(r.class)
}

/// `valueOf(String)` of an enum class: returns the class itself.
pub fn is_enum_valueof(program: &Program, r: &MethodRef) -> bool {
    if !is_static_method_on_enum_class(program, r) || r.name != "valueOf" {
        return false;
    }
    if r.proto.rtype != r.class {
        return false;
    }
    r.proto.args.len() == 1 && r.proto.args[0] == program.store().well_known().string
}

fn default_threads() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Thread creation can fail in constrained CI environments (low
/// RLIMIT_NPROC); retry with fewer workers rather than failing the pass.
fn build_pool(threads: usize) -> rayon::ThreadPool {
    let requested = threads.max(1);
    let mut desired = requested;
    loop {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(desired)
            .thread_name(|idx| format!("molt-enum-{idx}"))
            .build()
        {
            Ok(pool) => return pool,
            Err(_err) if desired > 1 => {
                desired /= 2;
            }
            Err(err) => panic!(
                "failed to build enum analysis pool (requested {requested} thread(s)): {err}"
            ),
        }
    }
}
