//! Script-side (dynamic) values.
//!
//! [`DynValue`] is what the single-threaded scripting engine hands to the
//! binder. It is deliberately `!Send`: script functions are reference counted
//! with `Rc` and must never leave the engine's owning thread.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::exception::ManagedException;
use crate::value::Value;

type ScriptFn = dyn Fn(&[DynValue]) -> Result<DynValue, DynValue>;

/// An untyped value originating from the scripting side.
#[derive(Clone)]
pub enum DynValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Vec<DynValue>),
    /// Plain object with key-ordered properties.
    Map(BTreeMap<String, DynValue>),
    Function(ScriptFunction),
    /// A managed value handed to script as an opaque wrapper.
    Managed(Value),
    /// A thrown error value.
    Error(ManagedException),
}

impl DynValue {
    pub fn string(s: impl AsRef<str>) -> Self {
        DynValue::String(Rc::from(s.as_ref()))
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&[DynValue]) -> Result<DynValue, DynValue> + 'static,
    {
        DynValue::Function(ScriptFunction::new(f))
    }

    /// Short type tag used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            DynValue::Undefined => "undefined",
            DynValue::Null => "null",
            DynValue::Bool(_) => "boolean",
            DynValue::Number(_) => "number",
            DynValue::String(_) => "string",
            DynValue::Array(_) => "array",
            DynValue::Map(_) => "object",
            DynValue::Function(_) => "function",
            DynValue::Managed(_) => "managed",
            DynValue::Error(_) => "error",
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, DynValue::Undefined | DynValue::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match *self {
            DynValue::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DynValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_managed(&self) -> Option<&Value> {
        match self {
            DynValue::Managed(v) => Some(v),
            _ => None,
        }
    }
}

impl PartialEq for DynValue {
    fn eq(&self, other: &Self) -> bool {
        use DynValue::*;
        match (self, other) {
            (Undefined, Undefined) | (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Number(a), Number(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            (Function(a), Function(b)) => a.id() == b.id(),
            (Managed(a), Managed(b)) => a == b,
            (Error(a), Error(b)) => a.same_as(b),
            _ => false,
        }
    }
}

impl fmt::Debug for DynValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DynValue::Undefined => write!(f, "undefined"),
            DynValue::Null => write!(f, "null"),
            DynValue::Bool(b) => write!(f, "{b}"),
            DynValue::Number(n) => write!(f, "{n}"),
            DynValue::String(s) => write!(f, "{s:?}"),
            DynValue::Array(items) => f.debug_list().entries(items).finish(),
            DynValue::Map(map) => f.debug_map().entries(map).finish(),
            DynValue::Function(func) => write!(f, "function#{:x}", func.id().0),
            DynValue::Managed(v) => write!(f, "managed {v:?}"),
            DynValue::Error(e) => write!(f, "error {e}"),
        }
    }
}

impl From<f64> for DynValue {
    fn from(n: f64) -> Self {
        DynValue::Number(n)
    }
}

impl From<i32> for DynValue {
    fn from(n: i32) -> Self {
        DynValue::Number(n as f64)
    }
}

impl From<bool> for DynValue {
    fn from(b: bool) -> Self {
        DynValue::Bool(b)
    }
}

impl From<&str> for DynValue {
    fn from(s: &str) -> Self {
        DynValue::string(s)
    }
}

impl From<Value> for DynValue {
    fn from(v: Value) -> Self {
        DynValue::Managed(v)
    }
}

/// Identity of a script function: stable for as long as any clone is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub usize);

/// A script-defined callback. Cloning shares the same function.
#[derive(Clone)]
pub struct ScriptFunction {
    f: Rc<ScriptFn>,
}

impl ScriptFunction {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[DynValue]) -> Result<DynValue, DynValue> + 'static,
    {
        Self { f: Rc::new(f) }
    }

    /// Call the function. `Err` carries the thrown value.
    pub fn call(&self, args: &[DynValue]) -> Result<DynValue, DynValue> {
        (self.f)(args)
    }

    pub fn id(&self) -> FunctionId {
        FunctionId(Rc::as_ptr(&self.f) as *const () as usize)
    }

    /// Number of live strong references, including this one.
    pub fn strong_count(&self) -> usize {
        Rc::strong_count(&self.f)
    }
}

impl fmt::Debug for ScriptFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScriptFunction({:#x})", self.id().0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_identity_survives_clone() {
        let f = ScriptFunction::new(|_| Ok(DynValue::Undefined));
        let g = f.clone();
        let h = ScriptFunction::new(|_| Ok(DynValue::Undefined));
        assert_eq!(f.id(), g.id());
        assert_ne!(f.id(), h.id());
        assert_eq!(f.strong_count(), 2);
    }

    #[test]
    fn function_call_returns_thrown_value() {
        let f = ScriptFunction::new(|args| match args.first() {
            Some(DynValue::Number(n)) => Ok(DynValue::Number(n + 1.0)),
            _ => Err(DynValue::string("expected a number")),
        });
        assert_eq!(f.call(&[1.into()]), Ok(DynValue::Number(2.0)));
        assert_eq!(f.call(&[]), Err(DynValue::string("expected a number")));
    }

    #[test]
    fn kind_names() {
        assert_eq!(DynValue::Undefined.kind_name(), "undefined");
        assert_eq!(DynValue::from(true).kind_name(), "boolean");
        assert_eq!(DynValue::Map(BTreeMap::new()).kind_name(), "object");
        assert!(DynValue::Null.is_nullish());
    }
}
