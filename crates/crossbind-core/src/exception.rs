//! Managed exception payloads.
//!
//! A [`ManagedException`] is an opaque, cheaply cloneable handle. Clones share
//! one allocation, so an exception thrown on one thread and rethrown on another
//! keeps its identity ([`ManagedException::same_as`]).

use std::fmt;
use std::sync::Arc;

use crate::{TypeHash, Value};

#[derive(Debug)]
struct ExceptionData {
    type_hash: TypeHash,
    type_name: String,
    message: String,
    payload: Option<Value>,
}

/// A thrown managed exception.
#[derive(Clone)]
pub struct ManagedException {
    inner: Arc<ExceptionData>,
}

impl ManagedException {
    /// Create an exception of the given managed type.
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self {
            inner: Arc::new(ExceptionData {
                type_hash: TypeHash::from_name(&type_name),
                type_name,
                message: message.into(),
                payload: None,
            }),
        }
    }

    /// Create an exception carrying an arbitrary thrown value.
    pub fn with_payload(
        type_name: impl Into<String>,
        message: impl Into<String>,
        payload: Value,
    ) -> Self {
        let type_name = type_name.into();
        Self {
            inner: Arc::new(ExceptionData {
                type_hash: TypeHash::from_name(&type_name),
                type_name,
                message: message.into(),
                payload: Some(payload),
            }),
        }
    }

    /// A plain `System.Exception`.
    pub fn generic(message: impl Into<String>) -> Self {
        Self::new("System.Exception", message)
    }

    pub fn type_hash(&self) -> TypeHash {
        self.inner.type_hash
    }

    pub fn type_name(&self) -> &str {
        &self.inner.type_name
    }

    pub fn message(&self) -> &str {
        &self.inner.message
    }

    /// The thrown value this exception was built from, if any.
    pub fn payload(&self) -> Option<&Value> {
        self.inner.payload.as_ref()
    }

    /// Identity comparison: true only for clones of the same thrown exception.
    pub fn same_as(&self, other: &ManagedException) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ManagedException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedException")
            .field("type_name", &self.inner.type_name)
            .field("message", &self.inner.message)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ManagedException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.inner.type_name, self.inner.message)
    }
}

impl PartialEq for ManagedException {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl std::error::Error for ManagedException {}
