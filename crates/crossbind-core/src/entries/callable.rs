//! Callable member metadata (constructors and methods).

use bitflags::bitflags;

use crate::native_fn::NativeFn;
use crate::type_hash::{TypeHash, primitives};
use crate::value::Value;

bitflags! {
    /// Per-parameter modifiers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ParamFlags: u8 {
        /// May be omitted; the default value (or null) is bound instead.
        const OPTIONAL = 0x01;
        /// Variable arity: collects trailing arguments into an array.
        const PARAMS = 0x02;
        /// Passed by reference (`ref`/`out`); never bindable from script.
        const BY_REF = 0x04;
    }
}

/// A formal parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    /// Declared type.
    pub data_type: TypeHash,
    pub flags: ParamFlags,
    /// Value bound when an optional parameter is omitted.
    pub default: Option<Value>,
}

impl Param {
    pub fn new(name: impl Into<String>, data_type: TypeHash) -> Self {
        Self {
            name: name.into(),
            data_type,
            flags: ParamFlags::empty(),
            default: None,
        }
    }

    /// An optional parameter with a default value.
    pub fn optional(name: impl Into<String>, data_type: TypeHash, default: Value) -> Self {
        Self {
            flags: ParamFlags::OPTIONAL,
            default: Some(default),
            ..Self::new(name, data_type)
        }
    }

    /// A variable-arity parameter. `array_type` is the declared collection type.
    pub fn params(name: impl Into<String>, array_type: TypeHash) -> Self {
        Self {
            flags: ParamFlags::PARAMS,
            ..Self::new(name, array_type)
        }
    }

    /// A by-reference parameter.
    pub fn by_ref(name: impl Into<String>, data_type: TypeHash) -> Self {
        Self {
            flags: ParamFlags::BY_REF,
            ..Self::new(name, data_type)
        }
    }

    pub fn is_optional(&self) -> bool {
        self.flags.contains(ParamFlags::OPTIONAL)
    }

    pub fn is_params(&self) -> bool {
        self.flags.contains(ParamFlags::PARAMS)
    }

    pub fn is_by_ref(&self) -> bool {
        self.flags.contains(ParamFlags::BY_REF)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Constructor,
    Method,
}

/// A constructor or method considered during overload resolution.
///
/// Immutable once registered.
#[derive(Debug, Clone)]
pub struct CallableCandidate {
    /// Member identity (owner + name + parameter types).
    pub hash: TypeHash,
    pub name: String,
    /// Declaring type.
    pub owner: TypeHash,
    pub kind: MemberKind,
    pub params: Vec<Param>,
    /// `System.Void` for methods without a result; the owner for constructors.
    pub return_type: TypeHash,
    pub is_static: bool,
    pub native: Option<NativeFn>,
}

impl CallableCandidate {
    /// Create a constructor for `owner`.
    pub fn constructor(owner: TypeHash, params: Vec<Param>) -> Self {
        let param_types: Vec<_> = params.iter().map(|p| p.data_type).collect();
        Self {
            hash: TypeHash::from_constructor(owner, &param_types),
            name: ".ctor".to_string(),
            owner,
            kind: MemberKind::Constructor,
            params,
            return_type: owner,
            is_static: true,
            native: None,
        }
    }

    /// Create an instance method. Use [`as_static`](Self::as_static) for static ones.
    pub fn method(
        owner: TypeHash,
        name: impl Into<String>,
        params: Vec<Param>,
        return_type: TypeHash,
    ) -> Self {
        let name = name.into();
        let param_types: Vec<_> = params.iter().map(|p| p.data_type).collect();
        Self {
            hash: TypeHash::from_method(owner, &name, &param_types),
            name,
            owner,
            kind: MemberKind::Method,
            params,
            return_type,
            is_static: false,
            native: None,
        }
    }

    // === Builder Methods ===

    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn with_native(mut self, native: NativeFn) -> Self {
        self.native = Some(native);
        self
    }

    // === Query Methods ===

    pub fn is_constructor(&self) -> bool {
        self.kind == MemberKind::Constructor
    }

    pub fn returns_void(&self) -> bool {
        self.return_type == primitives::VOID
    }

    /// Any `ref`/`out` parameter makes the candidate unbindable.
    pub fn has_by_ref_param(&self) -> bool {
        self.params.iter().any(Param::is_by_ref)
    }

    /// Index of the variable-arity parameter, if any.
    pub fn params_slot(&self) -> Option<usize> {
        self.params.iter().position(Param::is_params)
    }

    /// Fewest arguments the candidate accepts.
    pub fn min_args(&self) -> usize {
        self.params
            .iter()
            .filter(|p| !p.is_optional() && !p.is_params())
            .count()
    }

    /// Most arguments the candidate accepts; `None` when variable arity.
    pub fn max_args(&self) -> Option<usize> {
        if self.params_slot().is_some() {
            None
        } else {
            Some(self.params.len())
        }
    }

    /// Whether `count` arguments lie in `[min_args, max_args]`.
    pub fn accepts_arg_count(&self, count: usize) -> bool {
        count >= self.min_args() && self.max_args().is_none_or(|max| count <= max)
    }
}
