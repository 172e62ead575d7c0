//! Managed type entry.
//!
//! A [`TypeEntry`] describes one managed type: its shape ([`TypeKind`]),
//! its place in the hierarchy, generic instantiation info and its members.

use crate::primitive_kind::PrimitiveKind;
use crate::type_hash::{TypeHash, primitives};

use super::{CallableCandidate, FieldEntry};

/// Shape of a managed type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Void,
    /// The root reference type.
    Object,
    String,
    Primitive(PrimitiveKind),
    Class,
    Interface,
    /// Single-dimensional array of `element`.
    Array { element: TypeHash },
    /// Function-shaped type.
    Delegate {
        params: Vec<TypeHash>,
        return_type: TypeHash,
    },
}

/// Registry entry for a managed type.
#[derive(Debug, Clone)]
pub struct TypeEntry {
    /// Fully qualified name.
    pub name: String,
    pub type_hash: TypeHash,
    pub kind: TypeKind,

    // === Hierarchy ===
    /// Base class (`None` only for the root type and interfaces).
    pub base: Option<TypeHash>,
    pub interfaces: Vec<TypeHash>,

    // === Generic Info ===
    /// Open generic definition this type instantiates.
    pub generic_definition: Option<TypeHash>,
    pub type_args: Vec<TypeHash>,

    // === Capabilities ===
    /// Unboxed value semantics (primitives, structs): `null` is not assignable.
    pub is_value_type: bool,
    /// Script arrays convert into this type element-wise.
    pub is_collection: bool,
    /// Script maps convert into this type.
    pub is_dictionary: bool,

    // === Members ===
    pub constructors: Vec<CallableCandidate>,
    pub methods: Vec<CallableCandidate>,
    pub fields: Vec<FieldEntry>,
}

impl TypeEntry {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        let name = name.into();
        let base = match kind {
            TypeKind::Object | TypeKind::Interface | TypeKind::Void => None,
            TypeKind::Delegate { .. } => Some(primitives::DELEGATE),
            _ => Some(primitives::OBJECT),
        };
        let is_value_type = matches!(kind, TypeKind::Primitive(_) | TypeKind::Void);
        Self {
            type_hash: TypeHash::from_name(&name),
            name,
            kind,
            base,
            interfaces: Vec::new(),
            generic_definition: None,
            type_args: Vec::new(),
            is_value_type,
            is_collection: false,
            is_dictionary: false,
            constructors: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self::new(kind.name(), TypeKind::Primitive(kind))
    }

    pub fn delegate(name: impl Into<String>, params: Vec<TypeHash>, return_type: TypeHash) -> Self {
        Self::new(
            name,
            TypeKind::Delegate {
                params,
                return_type,
            },
        )
    }

    /// The array type `element[]`. `element_name` is the element's qualified name.
    pub fn array(element_name: &str, element: TypeHash) -> Self {
        let mut entry = Self::new(format!("{element_name}[]"), TypeKind::Array { element });
        entry.type_hash = TypeHash::from_array(element);
        entry.is_collection = true;
        entry
    }

    // === Builder Methods ===

    pub fn with_base(mut self, base: TypeHash) -> Self {
        self.base = Some(base);
        self
    }

    pub fn with_interface(mut self, interface: TypeHash) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Mark as an instantiation of `definition` with `args`; the hash becomes
    /// the generic instance hash.
    pub fn with_generic_instance(mut self, definition: TypeHash, args: Vec<TypeHash>) -> Self {
        self.type_hash = TypeHash::from_generic(definition, &args);
        self.generic_definition = Some(definition);
        self.type_args = args;
        self
    }

    pub fn as_value_type(mut self) -> Self {
        self.is_value_type = true;
        self
    }

    pub fn as_collection(mut self) -> Self {
        self.is_collection = true;
        self
    }

    pub fn as_dictionary(mut self) -> Self {
        self.is_dictionary = true;
        self
    }

    pub fn with_constructor(mut self, ctor: CallableCandidate) -> Self {
        self.constructors.push(ctor);
        self
    }

    pub fn with_method(mut self, method: CallableCandidate) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_field(mut self, field: FieldEntry) -> Self {
        self.fields.push(field);
        self
    }

    // === Query Methods ===

    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self.kind {
            TypeKind::Primitive(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, TypeKind::Array { .. })
    }

    pub fn is_delegate(&self) -> bool {
        matches!(self.kind, TypeKind::Delegate { .. })
    }

    pub fn is_interface(&self) -> bool {
        matches!(self.kind, TypeKind::Interface)
    }

    /// Element type of an array or collection.
    ///
    /// Arrays report their element, generic collections their first type
    /// argument, anything else `System.Object`.
    pub fn element_type(&self) -> TypeHash {
        match self.kind {
            TypeKind::Array { element } => element,
            _ => self
                .type_args
                .first()
                .copied()
                .unwrap_or(primitives::OBJECT),
        }
    }

    /// Parameter types and return type of a delegate.
    pub fn delegate_signature(&self) -> Option<(&[TypeHash], TypeHash)> {
        match &self.kind {
            TypeKind::Delegate {
                params,
                return_type,
            } => Some((params, *return_type)),
            _ => None,
        }
    }

    /// Methods named `name` with the given static-ness, in declaration order.
    pub fn methods_named<'a, 'n>(
        &'a self,
        name: &'n str,
        is_static: bool,
    ) -> impl Iterator<Item = &'a CallableCandidate> + use<'a, 'n> {
        self.methods
            .iter()
            .filter(move |m| m.name == name && m.is_static == is_static)
    }

    pub fn field(&self, name: &str) -> Option<&FieldEntry> {
        self.fields.iter().find(|f| f.name == name)
    }
}
