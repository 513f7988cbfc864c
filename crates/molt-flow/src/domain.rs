//! The join-semilattice tracked per register.

use std::collections::{BTreeSet, HashMap};

use molt_ir::{Reg, TypeId};

/// The set of reference types that may inhabit a register.
///
/// - `Bottom`: no information (unreachable, or a register never written);
/// - `Types`: a finite set of named types, possibly empty ("no object
///   types", the value written for instructions the analysis ignores);
/// - `Top`: any type. The transfer function never materializes `Top`, but
///   the algebra accepts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumTypes {
    Bottom,
    Types(BTreeSet<TypeId>),
    Top,
}

impl EnumTypes {
    #[must_use]
    pub fn bottom() -> Self {
        EnumTypes::Bottom
    }

    #[must_use]
    pub fn top() -> Self {
        EnumTypes::Top
    }

    /// The empty value set. Distinct from `Bottom`: it carries the positive
    /// fact "no object type flows here".
    #[must_use]
    pub fn empty() -> Self {
        EnumTypes::Types(BTreeSet::new())
    }

    #[must_use]
    pub fn of(t: TypeId) -> Self {
        EnumTypes::Types(BTreeSet::from([t]))
    }

    pub fn add(&mut self, t: TypeId) {
        match self {
            EnumTypes::Top => {}
            EnumTypes::Bottom => *self = EnumTypes::of(t),
            EnumTypes::Types(set) => {
                set.insert(t);
            }
        }
    }

    /// Least upper bound: set union, `Top` absorbing, `Bottom` the identity.
    #[must_use]
    pub fn join(&self, other: &EnumTypes) -> EnumTypes {
        match (self, other) {
            (EnumTypes::Bottom, x) | (x, EnumTypes::Bottom) => x.clone(),
            (EnumTypes::Top, _) | (_, EnumTypes::Top) => EnumTypes::Top,
            (EnumTypes::Types(a), EnumTypes::Types(b)) => {
                EnumTypes::Types(a.union(b).copied().collect())
            }
        }
    }

    #[must_use]
    pub fn leq(&self, other: &EnumTypes) -> bool {
        match (self, other) {
            (EnumTypes::Bottom, _) | (_, EnumTypes::Top) => true,
            (EnumTypes::Top, _) | (_, EnumTypes::Bottom) => false,
            (EnumTypes::Types(a), EnumTypes::Types(b)) => a.is_subset(b),
        }
    }

    /// The enumerated types; nothing for `Bottom` (and for `Top`, which has
    /// no finite enumeration).
    pub fn elements(&self) -> impl Iterator<Item = TypeId> + '_ {
        match self {
            EnumTypes::Types(set) => Some(set.iter().copied()),
            EnumTypes::Bottom | EnumTypes::Top => None,
        }
        .into_iter()
        .flatten()
    }

    #[must_use]
    pub fn is_value(&self) -> bool {
        matches!(self, EnumTypes::Types(_))
    }

    #[must_use]
    pub fn is_bottom(&self) -> bool {
        matches!(self, EnumTypes::Bottom)
    }
}

/// Register environment: a partial map from register to [`EnumTypes`] with
/// pointwise join. A distinguished `Bottom` marks unreachable block entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumTypeEnvironment {
    Bottom,
    Value(HashMap<Reg, EnumTypes>),
}

impl EnumTypeEnvironment {
    #[must_use]
    pub fn bottom() -> Self {
        EnumTypeEnvironment::Bottom
    }

    /// A reachable environment binding nothing yet.
    #[must_use]
    pub fn empty() -> Self {
        EnumTypeEnvironment::Value(HashMap::new())
    }

    #[must_use]
    pub fn is_bottom(&self) -> bool {
        matches!(self, EnumTypeEnvironment::Bottom)
    }

    /// The binding of `r`; unbound registers read as bottom.
    #[must_use]
    pub fn get(&self, r: Reg) -> EnumTypes {
        match self {
            EnumTypeEnvironment::Bottom => EnumTypes::Bottom,
            EnumTypeEnvironment::Value(map) => {
                map.get(&r).cloned().unwrap_or(EnumTypes::Bottom)
            }
        }
    }

    /// Binds `r`; writing into a bottom environment is a no-op.
    pub fn set(&mut self, r: Reg, types: EnumTypes) {
        if let EnumTypeEnvironment::Value(map) = self {
            map.insert(r, types);
        }
    }

    /// Pointwise join, keeping one-sided bindings. Returns whether `self`
    /// changed, which is the fixpoint engine's convergence signal.
    pub fn join_with(&mut self, other: &EnumTypeEnvironment) -> bool {
        match other {
            EnumTypeEnvironment::Bottom => false,
            EnumTypeEnvironment::Value(other_map) => match self {
                EnumTypeEnvironment::Bottom => {
                    *self = other.clone();
                    true
                }
                EnumTypeEnvironment::Value(map) => {
                    let mut changed = false;
                    for (r, types) in other_map {
                        match map.get_mut(r) {
                            Some(existing) => {
                                let joined = existing.join(types);
                                if joined != *existing {
                                    *existing = joined;
                                    changed = true;
                                }
                            }
                            None => {
                                map.insert(*r, types.clone());
                                changed = true;
                            }
                        }
                    }
                    changed
                }
            },
        }
    }
}
