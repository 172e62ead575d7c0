//! Core types shared by the crossbind interop layer.
//!
//! - [`TypeHash`]: deterministic identity of managed types and members
//! - [`entries`]: type, constructor, method and field metadata
//! - [`Value`]: boxed managed values (`Send + Sync`)
//! - [`DynValue`]: untyped script values (bound to the engine's thread)
//! - [`ManagedException`]: opaque thrown payloads with identity
//! - [`error`]: per-phase error enums

pub mod dyn_value;
pub mod entries;
pub mod error;
pub mod exception;
pub mod native_fn;
pub mod primitive_kind;
pub mod type_hash;
pub mod value;

pub use dyn_value::{DynValue, FunctionId, ScriptFunction};
pub use entries::{
    CallableCandidate, FieldEntry, MemberKind, Param, ParamFlags, TypeEntry, TypeKind,
};
pub use error::{BindError, BridgeError, ConversionError, InteropError, RegistrationError};
pub use exception::ManagedException;
pub use native_fn::{CallContext, NativeCallable, NativeFn};
pub use primitive_kind::PrimitiveKind;
pub use type_hash::{TypeHash, primitives};
pub use value::{
    ArrayRef, Delegate, DelegateRef, ManagedArray, ManagedObject, NativeDelegate, ObjectRef, Value,
};
