//! Error types for every phase of a cross-runtime call.
//!
//! ```text
//! InteropError (top-level wrapper)
//! ├── RegistrationError - building the type registry
//! ├── ConversionError   - coercing one value to one managed type
//! ├── BindError         - overload resolution
//! └── BridgeError       - invoking a script callback through a bridge
//! ```
//!
//! Faults thrown by managed code or script callbacks are carried as the
//! original [`ManagedException`], never wrapped in a new exception.

use thiserror::Error;

use crate::exception::ManagedException;

/// Errors raised while populating the type registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("duplicate type: {0}")]
    DuplicateType(String),

    #[error("type '{owner}' refers to unknown type {referenced}")]
    UnknownReference { owner: String, referenced: String },
}

/// Errors raised by the type coercion engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// The value has no valid conversion to the requested type.
    #[error("cannot convert {value} to '{target}'")]
    IncompatibleType { value: String, target: String },

    /// The value is not a primitive or plain container.
    #[error("{0} values have no direct managed equivalent")]
    NotALeafValue(&'static str),

    #[error("unknown type {0}")]
    UnknownType(String),
}

/// Errors raised during overload resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// One argument could not be converted to the winner's declared type.
    #[error("argument {index} cannot be converted to '{target}'")]
    IncompatibleArgument { index: usize, target: String },

    /// Empty candidate set, or no candidate reaches implicit conversion.
    #[error("no applicable member '{name}' for arguments ({args})")]
    NoApplicableMember { name: String, args: String },

    /// Two best candidates remain undominated and the policy rejects ties.
    #[error("ambiguous call to '{name}': {candidates}")]
    AmbiguousMatch { name: String, candidates: String },
}

/// Errors raised by a cross-runtime invocation bridge.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// `invoke` after teardown began, or the owning loop is gone.
    #[error("bridge is no longer available")]
    Unavailable,

    /// The configured invocation timeout elapsed before the owning thread answered.
    #[error("callback did not complete within the invocation timeout")]
    Timeout,

    /// The callback threw; the payload is the original exception.
    #[error("callback threw: {0}")]
    Fault(ManagedException),
}

impl From<BridgeError> for ManagedException {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Fault(exception) => exception,
            BridgeError::Unavailable => {
                ManagedException::new("System.ObjectDisposedException", err.to_string())
            }
            BridgeError::Timeout => {
                ManagedException::new("System.TimeoutException", err.to_string())
            }
        }
    }
}

/// Top-level error of the binder surface.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InteropError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// The selected member threw; the payload is preserved unchanged.
    #[error("invocation threw: {0}")]
    InvocationFault(ManagedException),

    #[error("unknown type '{0}'")]
    UnknownType(String),

    #[error("type '{type_name}' has no member '{member}'")]
    UnknownMember { type_name: String, member: String },
}

impl InteropError {
    /// The managed exception behind this error, if it is a fault.
    pub fn exception(&self) -> Option<&ManagedException> {
        match self {
            InteropError::InvocationFault(e) | InteropError::Bridge(BridgeError::Fault(e)) => {
                Some(e)
            }
            _ => None,
        }
    }
}
