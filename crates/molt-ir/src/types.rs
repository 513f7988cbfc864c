//! Interned type references and descriptor queries.
//!
//! Types are identified by their JVM descriptor (`I`, `Ljava/lang/Enum;`,
//! `[LFoo;`). Descriptors are interned once while the program is being built;
//! analyses only ever resolve and compare the resulting [`TypeId`]s, so the
//! frozen store is cheap to share across worker threads.

use lasso::{Rodeo, RodeoReader, Spur};

use crate::error::{Error, Result};

/// Interned id of a type descriptor.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct TypeId(Spur);

impl TypeId {
    fn index(self) -> usize {
        lasso::Key::into_usize(self.0)
    }
}

impl Ord for TypeId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index().cmp(&other.index())
    }
}

impl PartialOrd for TypeId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Debug for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TypeId({})", self.index())
    }
}

/// Types the analyses refer to by role rather than by descriptor.
#[derive(Debug, Clone, Copy)]
pub struct WellKnownTypes {
    pub object: TypeId,
    pub enum_type: TypeId,
    pub class: TypeId,
    pub string: TypeId,
    pub string_builder: TypeId,
    pub boolean: TypeId,
    pub int: TypeId,
}

/// Frozen descriptor interner plus the queries analyses need.
pub struct TypeStore {
    rodeo: RodeoReader,
    well_known: WellKnownTypes,
}

impl TypeStore {
    pub fn descriptor(&self, t: TypeId) -> &str {
        self.rodeo.resolve(&t.0)
    }

    pub fn well_known(&self) -> &WellKnownTypes {
        &self.well_known
    }

    /// A descriptor that names neither a class nor an array.
    pub fn is_primitive(&self, t: TypeId) -> bool {
        !matches!(self.descriptor(t).as_bytes().first(), Some(b'L') | Some(b'['))
    }

    pub fn is_array(&self, t: TypeId) -> bool {
        self.descriptor(t).starts_with('[')
    }

    /// Strips one array dimension; `None` for non-array types.
    pub fn component_type(&self, t: TypeId) -> Option<TypeId> {
        let desc = self.descriptor(t);
        let component = desc.strip_prefix('[')?;
        // Components are interned eagerly alongside their array descriptor.
        let spur = self
            .rodeo
            .get(component)
            .expect("array component descriptor must be interned");
        Some(TypeId(spur))
    }

    /// Strips every array dimension; identity for non-array types.
    pub fn array_element_type(&self, t: TypeId) -> TypeId {
        let mut current = t;
        while let Some(component) = self.component_type(current) {
            current = component;
        }
        current
    }

    /// Checks that `desc` is a single well-formed field descriptor.
    pub fn validate_descriptor(desc: &str) -> Result<()> {
        if desc.is_empty() {
            return Err(Error::EmptyDescriptor);
        }
        let element = desc.trim_start_matches('[');
        let valid = match element.as_bytes().first() {
            None => false,
            Some(b'L') => element.ends_with(';') && element.len() > 2,
            Some(c) => element.len() == 1 && b"ZBCSIJFDV".contains(c),
        };
        if valid {
            Ok(())
        } else {
            Err(Error::InvalidDescriptor(desc.to_string()))
        }
    }
}

/// Builder-side interner; freezes into a [`TypeStore`].
pub(crate) struct TypeInterner {
    rodeo: Rodeo,
    well_known: WellKnownTypes,
}

impl TypeInterner {
    pub(crate) fn new() -> Self {
        let mut rodeo = Rodeo::default();
        let mut intern = |desc: &str| TypeId(rodeo.get_or_intern(desc));
        let well_known = WellKnownTypes {
            object: intern("Ljava/lang/Object;"),
            enum_type: intern("Ljava/lang/Enum;"),
            class: intern("Ljava/lang/Class;"),
            string: intern("Ljava/lang/String;"),
            string_builder: intern("Ljava/lang/StringBuilder;"),
            boolean: intern("Z"),
            int: intern("I"),
        };
        Self { rodeo, well_known }
    }

    /// Interns `desc` and, for arrays, every component descriptor down to the
    /// element type, so that `component_type` never misses.
    pub(crate) fn try_intern(&mut self, desc: &str) -> Result<TypeId> {
        TypeStore::validate_descriptor(desc)?;
        let id = TypeId(self.rodeo.get_or_intern(desc));
        let mut rest = desc;
        while let Some(component) = rest.strip_prefix('[') {
            self.rodeo.get_or_intern(component);
            rest = component;
        }
        Ok(id)
    }

    pub(crate) fn well_known(&self) -> &WellKnownTypes {
        &self.well_known
    }

    pub(crate) fn freeze(self) -> TypeStore {
        TypeStore {
            rodeo: self.rodeo.into_reader(),
            well_known: self.well_known,
        }
    }
}
