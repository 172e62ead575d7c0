//! Managed (boxed) values.
//!
//! [`Value`] is what managed code sees: boxed primitives, strings, arrays,
//! objects and delegates. Values are `Send + Sync` and may cross threads
//! freely; reference kinds share their allocation on clone.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::exception::ManagedException;
use crate::primitive_kind::PrimitiveKind;
use crate::type_hash::{TypeHash, primitives};

/// Shared handle to a managed array or collection.
pub type ArrayRef = Arc<ManagedArray>;
/// Shared handle to a managed object.
pub type ObjectRef = Arc<ManagedObject>;
/// Shared handle to a callable delegate.
pub type DelegateRef = Arc<dyn Delegate>;

/// A boxed managed value.
#[derive(Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Char(char),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Single(f32),
    Double(f64),
    String(Arc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Delegate(DelegateRef),
}

impl Value {
    /// Build a string value.
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Arc::from(s.as_ref()))
    }

    /// Build an array value of `type_hash` whose elements are `element`.
    pub fn array(type_hash: TypeHash, element: TypeHash, items: Vec<Value>) -> Self {
        Value::Array(Arc::new(ManagedArray::new(type_hash, element, items)))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The primitive kind of a boxed primitive.
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        Some(match self {
            Value::Boolean(_) => PrimitiveKind::Boolean,
            Value::Char(_) => PrimitiveKind::Char,
            Value::SByte(_) => PrimitiveKind::SByte,
            Value::Byte(_) => PrimitiveKind::Byte,
            Value::Int16(_) => PrimitiveKind::Int16,
            Value::UInt16(_) => PrimitiveKind::UInt16,
            Value::Int32(_) => PrimitiveKind::Int32,
            Value::UInt32(_) => PrimitiveKind::UInt32,
            Value::Int64(_) => PrimitiveKind::Int64,
            Value::UInt64(_) => PrimitiveKind::UInt64,
            Value::Single(_) => PrimitiveKind::Single,
            Value::Double(_) => PrimitiveKind::Double,
            _ => return None,
        })
    }

    /// The runtime type of this value; `None` for null.
    pub fn runtime_type(&self) -> Option<TypeHash> {
        match self {
            Value::Null => None,
            Value::String(_) => Some(primitives::STRING),
            Value::Array(array) => Some(array.type_hash()),
            Value::Object(object) => Some(object.type_hash()),
            Value::Delegate(delegate) => Some(delegate.delegate_type()),
            other => other.primitive_kind().map(PrimitiveKind::type_hash),
        }
    }

    /// Integral value of a boxed integer.
    pub fn as_i128(&self) -> Option<i128> {
        Some(match *self {
            Value::SByte(v) => v as i128,
            Value::Byte(v) => v as i128,
            Value::Int16(v) => v as i128,
            Value::UInt16(v) => v as i128,
            Value::Int32(v) => v as i128,
            Value::UInt32(v) => v as i128,
            Value::Int64(v) => v as i128,
            Value::UInt64(v) => v as i128,
            _ => return None,
        })
    }

    /// Any boxed numeric as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Single(v) => Some(v as f64),
            Value::Double(v) => Some(v),
            _ => self.as_i128().map(|v| v as f64),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_delegate(&self) -> Option<&DelegateRef> {
        match self {
            Value::Delegate(d) => Some(d),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    /// Primitives and strings compare by value, arrays element-wise,
    /// objects and delegates by identity.
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Char(a), Char(b)) => a == b,
            (SByte(a), SByte(b)) => a == b,
            (Byte(a), Byte(b)) => a == b,
            (Int16(a), Int16(b)) => a == b,
            (UInt16(a), UInt16(b)) => a == b,
            (Int32(a), Int32(b)) => a == b,
            (UInt32(a), UInt32(b)) => a == b,
            (Int64(a), Int64(b)) => a == b,
            (UInt64(a), UInt64(b)) => a == b,
            (Single(a), Single(b)) => a == b,
            (Double(a), Double(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Array(a), Array(b)) => {
                Arc::ptr_eq(a, b)
                    || (a.type_hash() == b.type_hash() && *a.items.read() == *b.items.read())
            }
            (Object(a), Object(b)) => Arc::ptr_eq(a, b),
            (Delegate(a), Delegate(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Boolean(v) => write!(f, "Boolean({v})"),
            Value::Char(v) => write!(f, "Char({v:?})"),
            Value::SByte(v) => write!(f, "SByte({v})"),
            Value::Byte(v) => write!(f, "Byte({v})"),
            Value::Int16(v) => write!(f, "Int16({v})"),
            Value::UInt16(v) => write!(f, "UInt16({v})"),
            Value::Int32(v) => write!(f, "Int32({v})"),
            Value::UInt32(v) => write!(f, "UInt32({v})"),
            Value::Int64(v) => write!(f, "Int64({v})"),
            Value::UInt64(v) => write!(f, "UInt64({v})"),
            Value::Single(v) => write!(f, "Single({v})"),
            Value::Double(v) => write!(f, "Double({v})"),
            Value::String(v) => write!(f, "String({v:?})"),
            Value::Array(a) => f.debug_list().entries(a.items.read().iter()).finish(),
            Value::Object(o) => write!(f, "Object({:?})", o.type_hash()),
            Value::Delegate(d) => write!(f, "Delegate({:?})", d.delegate_type()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::string(v)
    }
}

/// A managed array, or a collection built from a script array.
///
/// `type_hash` is the array/collection type itself, `element` its element type.
pub struct ManagedArray {
    type_hash: TypeHash,
    element: TypeHash,
    items: RwLock<Vec<Value>>,
}

impl ManagedArray {
    pub fn new(type_hash: TypeHash, element: TypeHash, items: Vec<Value>) -> Self {
        Self {
            type_hash,
            element,
            items: RwLock::new(items),
        }
    }

    pub fn type_hash(&self) -> TypeHash {
        self.type_hash
    }

    pub fn element_type(&self) -> TypeHash {
        self.element
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.read().get(index).cloned()
    }

    /// Snapshot of the elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.items.read().clone()
    }

    pub fn push(&self, value: Value) {
        self.items.write().push(value);
    }
}

impl fmt::Debug for ManagedArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedArray")
            .field("type_hash", &self.type_hash)
            .field("items", &*self.items.read())
            .finish()
    }
}

/// A managed object instance.
///
/// Fields live in a name-keyed table; native types may attach an opaque
/// Rust payload at construction.
pub struct ManagedObject {
    type_hash: TypeHash,
    fields: RwLock<FxHashMap<String, Value>>,
    data: Option<Box<dyn Any + Send + Sync>>,
}

impl ManagedObject {
    pub fn new(type_hash: TypeHash) -> Self {
        Self {
            type_hash,
            fields: RwLock::new(FxHashMap::default()),
            data: None,
        }
    }

    /// Create an object carrying a native payload.
    pub fn with_data<T: Any + Send + Sync>(type_hash: TypeHash, data: T) -> Self {
        Self {
            type_hash,
            fields: RwLock::new(FxHashMap::default()),
            data: Some(Box::new(data)),
        }
    }

    pub fn type_hash(&self) -> TypeHash {
        self.type_hash
    }

    /// Read a field; unset fields read as `None`.
    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.read().get(name).cloned()
    }

    pub fn set_field(&self, name: impl Into<String>, value: Value) {
        self.fields.write().insert(name.into(), value);
    }

    /// Names of the fields that currently hold a value, sorted.
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.fields.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Borrow the native payload as `T`.
    pub fn data<T: Any>(&self) -> Option<&T> {
        self.data.as_ref().and_then(|d| d.downcast_ref::<T>())
    }
}

impl fmt::Debug for ManagedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedObject")
            .field("type_hash", &self.type_hash)
            .field("fields", &self.field_names())
            .finish_non_exhaustive()
    }
}

/// A callable value of some delegate type.
pub trait Delegate: Send + Sync {
    /// The delegate type this value satisfies.
    fn delegate_type(&self) -> TypeHash;

    /// Invoke the delegate. Thrown exceptions are returned unchanged.
    fn invoke(&self, args: &[Value]) -> Result<Value, ManagedException>;
}

/// Delegate backed by a Rust closure.
pub struct NativeDelegate<F> {
    delegate_type: TypeHash,
    f: F,
}

impl<F> NativeDelegate<F>
where
    F: Fn(&[Value]) -> Result<Value, ManagedException> + Send + Sync + 'static,
{
    pub fn new(delegate_type: TypeHash, f: F) -> Self {
        Self { delegate_type, f }
    }

    /// Box this delegate into a [`Value`].
    pub fn into_value(self) -> Value {
        Value::Delegate(Arc::new(self))
    }
}

impl<F> Delegate for NativeDelegate<F>
where
    F: Fn(&[Value]) -> Result<Value, ManagedException> + Send + Sync,
{
    fn delegate_type(&self) -> TypeHash {
        self.delegate_type
    }

    fn invoke(&self, args: &[Value]) -> Result<Value, ManagedException> {
        (self.f)(args)
    }
}
