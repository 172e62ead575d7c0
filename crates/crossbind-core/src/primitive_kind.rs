//! Primitive value kinds of the managed runtime.

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::TypeHash;
use crate::type_hash::primitives;

/// Primitive (unboxed value) kinds.
///
/// The discriminant is the runtime's type code. Codes are ordered from the
/// narrowest to the widest numeric kind, which the overload tie-break relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum PrimitiveKind {
    Boolean = 3,
    Char = 4,
    SByte = 5,
    Byte = 6,
    Int16 = 7,
    UInt16 = 8,
    Int32 = 9,
    UInt32 = 10,
    Int64 = 11,
    UInt64 = 12,
    Single = 13,
    Double = 14,
}

impl PrimitiveKind {
    /// All primitive kinds in type-code order.
    pub const ALL: [PrimitiveKind; 12] = [
        PrimitiveKind::Boolean,
        PrimitiveKind::Char,
        PrimitiveKind::SByte,
        PrimitiveKind::Byte,
        PrimitiveKind::Int16,
        PrimitiveKind::UInt16,
        PrimitiveKind::Int32,
        PrimitiveKind::UInt32,
        PrimitiveKind::Int64,
        PrimitiveKind::UInt64,
        PrimitiveKind::Single,
        PrimitiveKind::Double,
    ];

    /// Get the TypeHash for this primitive type.
    pub const fn type_hash(self) -> TypeHash {
        match self {
            PrimitiveKind::Boolean => primitives::BOOLEAN,
            PrimitiveKind::Char => primitives::CHAR,
            PrimitiveKind::SByte => primitives::SBYTE,
            PrimitiveKind::Byte => primitives::BYTE,
            PrimitiveKind::Int16 => primitives::INT16,
            PrimitiveKind::UInt16 => primitives::UINT16,
            PrimitiveKind::Int32 => primitives::INT32,
            PrimitiveKind::UInt32 => primitives::UINT32,
            PrimitiveKind::Int64 => primitives::INT64,
            PrimitiveKind::UInt64 => primitives::UINT64,
            PrimitiveKind::Single => primitives::SINGLE,
            PrimitiveKind::Double => primitives::DOUBLE,
        }
    }

    /// Qualified name of this primitive type.
    pub const fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "System.Boolean",
            PrimitiveKind::Char => "System.Char",
            PrimitiveKind::SByte => "System.SByte",
            PrimitiveKind::Byte => "System.Byte",
            PrimitiveKind::Int16 => "System.Int16",
            PrimitiveKind::UInt16 => "System.UInt16",
            PrimitiveKind::Int32 => "System.Int32",
            PrimitiveKind::UInt32 => "System.UInt32",
            PrimitiveKind::Int64 => "System.Int64",
            PrimitiveKind::UInt64 => "System.UInt64",
            PrimitiveKind::Single => "System.Single",
            PrimitiveKind::Double => "System.Double",
        }
    }

    /// Type code as reported by the runtime.
    pub fn type_code(self) -> u8 {
        self.into()
    }

    /// Whether this kind participates in numeric conversions.
    pub const fn is_numeric(self) -> bool {
        !matches!(self, PrimitiveKind::Boolean | PrimitiveKind::Char)
    }

    pub const fn is_integer(self) -> bool {
        self.is_numeric() && !self.is_floating()
    }

    pub const fn is_floating(self) -> bool {
        matches!(self, PrimitiveKind::Single | PrimitiveKind::Double)
    }

    /// Inclusive integral range of this kind, `None` for non-integers.
    pub const fn integer_range(self) -> Option<(i128, i128)> {
        match self {
            PrimitiveKind::SByte => Some((i8::MIN as i128, i8::MAX as i128)),
            PrimitiveKind::Byte => Some((0, u8::MAX as i128)),
            PrimitiveKind::Int16 => Some((i16::MIN as i128, i16::MAX as i128)),
            PrimitiveKind::UInt16 => Some((0, u16::MAX as i128)),
            PrimitiveKind::Int32 => Some((i32::MIN as i128, i32::MAX as i128)),
            PrimitiveKind::UInt32 => Some((0, u32::MAX as i128)),
            PrimitiveKind::Int64 => Some((i64::MIN as i128, i64::MAX as i128)),
            PrimitiveKind::UInt64 => Some((0, u64::MAX as i128)),
            _ => None,
        }
    }

    /// Look up the primitive kind for a type hash.
    pub fn from_type_hash(hash: TypeHash) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.type_hash() == hash)
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
