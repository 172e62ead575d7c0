//! crossbind: calls between a single-threaded script engine and a
//! reflection-capable managed runtime.
//!
//! - [`conversion`]: scores and converts untyped script values to managed types
//! - [`overload`]: picks the constructor or method to call for an argument list
//! - [`bridge`]: lets any thread call a callback owned by the engine's thread
//! - [`marshal`]: leaf value and exception conversions
//! - [`binder`]: the surface the scripting side calls into

pub mod binder;
pub mod bridge;
pub mod config;
pub mod conversion;
pub mod marshal;
pub mod overload;

pub use crossbind_registry::TypeRegistry;

pub use binder::Binder;
pub use bridge::{Bridge, BridgeDelegate, EngineLoop, InvocationContext};
pub use config::{AmbiguityPolicy, BinderOptions, BridgeOptions};
pub use conversion::{ConversionScope, MatchScore, TypeCoercion};
pub use overload::{BoundArguments, OverloadResolver, Preference, Resolution};

/// Commonly used types.
pub mod prelude {
    pub use crate::binder::Binder;
    pub use crate::bridge::{Bridge, EngineLoop};
    pub use crate::config::{AmbiguityPolicy, BinderOptions, BridgeOptions};
    pub use crate::conversion::{ConversionScope, MatchScore, TypeCoercion};
    pub use crate::overload::{OverloadResolver, Resolution};
    pub use crossbind_core::{
        BindError, BridgeError, CallableCandidate, ConversionError, DynValue, FieldEntry,
        InteropError, ManagedException, NativeFn, Param, ScriptFunction, TypeEntry, TypeHash, Value,
        primitives,
    };
    pub use crossbind_registry::TypeRegistry;
}
