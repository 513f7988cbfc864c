//! Classes, members, and the program arena.

use std::collections::HashMap;

use crate::code::MethodCode;
use crate::error::{Error, Result};
use crate::id::{ClassId, FieldId, MethodId};
use crate::instruction::{FieldRef, MethodRef, Proto};
use crate::name::Name;
use crate::types::{TypeId, TypeInterner, TypeStore, WellKnownTypes};

#[derive(Debug, Clone)]
pub struct DexClass {
    pub type_id: TypeId,
    pub is_enum: bool,
    pub fields: Vec<FieldId>,
    pub methods: Vec<MethodId>,
}

#[derive(Debug, Clone)]
pub struct DexField {
    pub class: TypeId,
    pub name: Name,
    pub type_id: TypeId,
    pub can_rename: bool,
}

impl DexField {
    pub fn to_ref(&self) -> FieldRef {
        FieldRef {
            class: self.class,
            name: self.name.clone(),
            type_id: self.type_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DexMethod {
    pub class: TypeId,
    pub name: Name,
    pub proto: Proto,
    pub is_static: bool,
    pub can_rename: bool,
    pub code: Option<MethodCode>,
}

impl DexMethod {
    pub fn is_init(&self) -> bool {
        self.name == "<init>"
    }

    pub fn is_clinit(&self) -> bool {
        self.name == "<clinit>"
    }

    pub fn to_ref(&self) -> MethodRef {
        MethodRef {
            class: self.class,
            name: self.name.clone(),
            proto: self.proto.clone(),
        }
    }

    /// Every type named by the signature or the body.
    pub fn gather_types(&self) -> Vec<TypeId> {
        let mut out = Vec::new();
        self.proto.gather_types(&mut out);
        if let Some(code) = &self.code {
            code.gather_types(&mut out);
        }
        out
    }
}

/// The unit an optimization pass runs over: every class of the app, with an
/// index for method resolution.
pub struct Program {
    store: TypeStore,
    classes: Vec<DexClass>,
    fields: Vec<DexField>,
    methods: Vec<DexMethod>,
    class_index: HashMap<TypeId, ClassId>,
    method_index: HashMap<(TypeId, Name, Proto), MethodId>,
}

impl Program {
    pub fn store(&self) -> &TypeStore {
        &self.store
    }

    pub fn classes(&self) -> &[DexClass] {
        &self.classes
    }

    pub fn fields(&self) -> &[DexField] {
        &self.fields
    }

    pub fn methods(&self) -> &[DexMethod] {
        &self.methods
    }

    pub fn field(&self, id: FieldId) -> &DexField {
        &self.fields[id.index()]
    }

    pub fn method(&self, id: MethodId) -> &DexMethod {
        &self.methods[id.index()]
    }

    pub fn class_of(&self, t: TypeId) -> Option<&DexClass> {
        self.class_index.get(&t).map(|id| &self.classes[id.index()])
    }

    /// Resolves a reference to a defined method, if the program has one.
    pub fn resolve_method(&self, r: &MethodRef) -> Option<&DexMethod> {
        self.method_index
            .get(&(r.class, r.name.clone(), r.proto.clone()))
            .map(|id| &self.methods[id.index()])
    }
}

/// Assembles a [`Program`] and freezes its type store.
pub struct ProgramBuilder {
    interner: TypeInterner,
    classes: Vec<DexClass>,
    fields: Vec<DexField>,
    methods: Vec<DexMethod>,
}

impl ProgramBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            interner: TypeInterner::new(),
            classes: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn try_type_id(&mut self, desc: &str) -> Result<TypeId> {
        self.interner.try_intern(desc)
    }

    /// Interns a field descriptor, panicking on malformed input.
    pub fn type_id(&mut self, desc: &str) -> TypeId {
        self.try_type_id(desc).expect("valid type descriptor")
    }

    pub fn well_known(&self) -> &WellKnownTypes {
        self.interner.well_known()
    }

    /// Parses a method descriptor such as `(Ljava/lang/String;I)V`.
    pub fn proto(&mut self, desc: &str) -> Proto {
        self.try_proto(desc).expect("valid method descriptor")
    }

    pub fn try_proto(&mut self, desc: &str) -> Result<Proto> {
        fn invalid(desc: &str) -> Error {
            Error::InvalidDescriptor(desc.to_string())
        }
        let rest = desc.strip_prefix('(').ok_or_else(|| invalid(desc))?;
        let (args_part, rtype_part) = rest.split_once(')').ok_or_else(|| invalid(desc))?;
        let mut args = Vec::new();
        let mut remaining = args_part;
        while !remaining.is_empty() {
            let (arg, rest) = split_field_descriptor(remaining).ok_or_else(|| invalid(desc))?;
            args.push(self.try_type_id(arg)?);
            remaining = rest;
        }
        let rtype = self.try_type_id(rtype_part)?;
        Ok(Proto::new(rtype, args))
    }

    /// A method reference in `Lcls;.name:(args)ret` spirit, split into parts.
    pub fn method_ref(&mut self, class: &str, name: &str, proto: &str) -> MethodRef {
        MethodRef {
            class: self.type_id(class),
            name: Name::new(name),
            proto: self.proto(proto),
        }
    }

    pub fn field_ref(&mut self, class: &str, name: &str, type_desc: &str) -> FieldRef {
        FieldRef {
            class: self.type_id(class),
            name: Name::new(name),
            type_id: self.type_id(type_desc),
        }
    }

    pub fn add_class(&mut self, type_id: TypeId, is_enum: bool) -> ClassId {
        let id = ClassId::from_raw(self.classes.len() as u32);
        self.classes.push(DexClass {
            type_id,
            is_enum,
            fields: Vec::new(),
            methods: Vec::new(),
        });
        id
    }

    pub fn add_field(
        &mut self,
        class: ClassId,
        name: impl Into<Name>,
        type_id: TypeId,
        can_rename: bool,
    ) -> FieldId {
        let id = FieldId::from_raw(self.fields.len() as u32);
        let owner = &mut self.classes[class.index()];
        self.fields.push(DexField {
            class: owner.type_id,
            name: name.into(),
            type_id,
            can_rename,
        });
        owner.fields.push(id);
        id
    }

    pub fn add_method(
        &mut self,
        class: ClassId,
        name: impl Into<Name>,
        proto: Proto,
        is_static: bool,
        can_rename: bool,
        code: Option<MethodCode>,
    ) -> MethodId {
        let id = MethodId::from_raw(self.methods.len() as u32);
        let owner = &mut self.classes[class.index()];
        self.methods.push(DexMethod {
            class: owner.type_id,
            name: name.into(),
            proto,
            is_static,
            can_rename,
            code,
        });
        owner.methods.push(id);
        id
    }

    #[must_use]
    pub fn finish(self) -> Program {
        let class_index = self
            .classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.type_id, ClassId::from_raw(i as u32)))
            .collect();
        let method_index = self
            .methods
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let key = (m.class, m.name.clone(), m.proto.clone());
                (key, MethodId::from_raw(i as u32))
            })
            .collect();
        Program {
            store: self.interner.freeze(),
            classes: self.classes,
            fields: self.fields,
            methods: self.methods,
            class_index,
            method_index,
        }
    }
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits the first field descriptor off `s`, returning `(descriptor, rest)`.
fn split_field_descriptor(s: &str) -> Option<(&str, &str)> {
    let element_start = s.bytes().position(|b| b != b'[')?;
    let end = match s.as_bytes()[element_start] {
        b'L' => s[element_start..].find(';').map(|i| element_start + i + 1)?,
        _ => element_start + 1,
    };
    Some(s.split_at(end))
}
