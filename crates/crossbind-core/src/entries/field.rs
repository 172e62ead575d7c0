//! Field metadata.

use crate::TypeHash;

/// A field of a managed type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    pub name: String,
    pub hash: TypeHash,
    /// Declared type.
    pub data_type: TypeHash,
    pub is_static: bool,
}

impl FieldEntry {
    pub fn new(owner: TypeHash, name: impl Into<String>, data_type: TypeHash) -> Self {
        let name = name.into();
        Self {
            hash: TypeHash::from_field(owner, &name),
            name,
            data_type,
            is_static: false,
        }
    }

    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }
}
