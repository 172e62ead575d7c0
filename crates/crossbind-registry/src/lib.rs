//! Managed type registry for crossbind.
//!
//! Holds type metadata and member candidate lists, answers assignability
//! questions, and stores static field values.

mod registry;

pub use registry::TypeRegistry;
