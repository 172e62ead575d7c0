//! Deterministic hash-based identity for managed types and members.
//!
//! [`TypeHash`] is a 64-bit hash that identifies a managed type, constructor or
//! method. Hashes are computed from names and signatures, so the same metadata
//! always produces the same identity regardless of registration order:
//!
//! - Same qualified name = same type hash
//! - Array and generic instance hashes are derived from their components
//! - Member hashes mix in the owner and the ordered parameter types
//!
//! # Examples
//!
//! ```
//! use crossbind_core::TypeHash;
//!
//! let int_hash = TypeHash::from_name("System.Int32");
//! assert_eq!(int_hash, TypeHash::from_name("System.Int32"));
//!
//! let int_array = TypeHash::from_array(int_hash);
//! assert_ne!(int_array, int_hash);
//! ```

use std::fmt;
use xxhash_rust::const_xxh64::xxh64 as const_xxh64;
use xxhash_rust::xxh64::xxh64;

/// Domain-specific mixing constants for hash computation.
///
/// Distinct domains keep a type named `Foo` from colliding with a method named `Foo`.
pub mod hash_constants {
    /// Separator constant for ordered components.
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Domain marker for type hashes.
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for array type hashes.
    pub const ARRAY: u64 = 0x6c1b2e8f94d37a05;

    /// Domain marker for method hashes.
    pub const METHOD: u64 = 0x7d3c8b4a92e15f6d;

    /// Domain marker for constructor hashes.
    pub const CONSTRUCTOR: u64 = 0x9a7f3d5e2b8c4601;

    /// Domain marker for field hashes.
    pub const FIELD: u64 = 0x1a095090689d4647;

    /// Parameter position mixing constants.
    pub const PARAM_MARKERS: [u64; 16] = [
        0x9e3779b97f4a7c15,
        0xbf58476d1ce4e5b9,
        0x94d049bb133111eb,
        0xd6e8feb86659fd93,
        0xe7037ed1a0b428db,
        0xc6a4a7935bd1e995,
        0x8648dbbc94d49b8d,
        0xa2b48b2c69e0d657,
        0x7c3e9f2a5b8d1403,
        0x5d8c7b4a3e9f2106,
        0x3f1e9d8c7b5a4203,
        0x1a2b3c4d5e6f7089,
        0x9f8e7d6c5b4a3210,
        0x2468ace013579bdf,
        0xfdb97531eca86420,
        0x123456789abcdef0,
    ];
}

/// A deterministic 64-bit hash identifying a managed type or member.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Create a type hash from a fully qualified type name.
    ///
    /// This is a `const fn` so well-known hashes can live in constants.
    #[inline]
    pub const fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ const_xxh64(name.as_bytes(), 0))
    }

    /// Create the hash of the single-dimensional array type `element[]`.
    #[inline]
    pub const fn from_array(element: TypeHash) -> Self {
        TypeHash(
            (element.0 ^ hash_constants::ARRAY)
                .wrapping_mul(hash_constants::SEP)
                .wrapping_add(hash_constants::ARRAY),
        )
    }

    /// Create the hash of a generic instance from its definition and type arguments.
    ///
    /// Argument order matters: `Dictionary<int, string>` differs from
    /// `Dictionary<string, int>`.
    #[inline]
    pub fn from_generic(definition: TypeHash, args: &[TypeHash]) -> Self {
        TypeHash(mix_params(definition.0, args))
    }

    /// Create a method hash from owner, name and ordered parameter types.
    #[inline]
    pub fn from_method(owner: TypeHash, name: &str, param_hashes: &[TypeHash]) -> Self {
        let seed = hash_constants::METHOD ^ owner.0 ^ xxh64(name.as_bytes(), 0);
        TypeHash(mix_params(seed, param_hashes))
    }

    /// Create a constructor hash from owner and ordered parameter types.
    #[inline]
    pub fn from_constructor(owner: TypeHash, param_hashes: &[TypeHash]) -> Self {
        TypeHash(mix_params(hash_constants::CONSTRUCTOR ^ owner.0, param_hashes))
    }

    /// Create a field hash from owner and field name.
    #[inline]
    pub fn from_field(owner: TypeHash, name: &str) -> Self {
        TypeHash(hash_constants::FIELD ^ owner.0 ^ xxh64(name.as_bytes(), 0))
    }

    /// Check if this is an empty/invalid hash.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Get the underlying u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// Fold ordered component hashes into a seed. Multiplication keeps order significant.
fn mix_params(seed: u64, params: &[TypeHash]) -> u64 {
    let mut hash = seed;
    for (i, param) in params.iter().enumerate() {
        let marker = hash_constants::PARAM_MARKERS
            .get(i)
            .copied()
            .unwrap_or_else(|| hash_constants::PARAM_MARKERS[0].wrapping_add(i as u64));
        hash = hash
            .wrapping_mul(hash_constants::SEP)
            .wrapping_add(marker ^ param.0);
    }
    hash
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Well-known hashes for the built-in managed types.
pub mod primitives {
    use super::TypeHash;

    /// `System.Void`
    pub const VOID: TypeHash = TypeHash::from_name("System.Void");
    /// `System.Object`, the root of every reference hierarchy.
    pub const OBJECT: TypeHash = TypeHash::from_name("System.Object");
    /// `System.Boolean`
    pub const BOOLEAN: TypeHash = TypeHash::from_name("System.Boolean");
    /// `System.Char`
    pub const CHAR: TypeHash = TypeHash::from_name("System.Char");
    /// `System.SByte`
    pub const SBYTE: TypeHash = TypeHash::from_name("System.SByte");
    /// `System.Byte`
    pub const BYTE: TypeHash = TypeHash::from_name("System.Byte");
    /// `System.Int16`
    pub const INT16: TypeHash = TypeHash::from_name("System.Int16");
    /// `System.UInt16`
    pub const UINT16: TypeHash = TypeHash::from_name("System.UInt16");
    /// `System.Int32`
    pub const INT32: TypeHash = TypeHash::from_name("System.Int32");
    /// `System.UInt32`
    pub const UINT32: TypeHash = TypeHash::from_name("System.UInt32");
    /// `System.Int64`
    pub const INT64: TypeHash = TypeHash::from_name("System.Int64");
    /// `System.UInt64`
    pub const UINT64: TypeHash = TypeHash::from_name("System.UInt64");
    /// `System.Single`
    pub const SINGLE: TypeHash = TypeHash::from_name("System.Single");
    /// `System.Double`
    pub const DOUBLE: TypeHash = TypeHash::from_name("System.Double");
    /// `System.String`
    pub const STRING: TypeHash = TypeHash::from_name("System.String");
    /// `System.Exception`
    pub const EXCEPTION: TypeHash = TypeHash::from_name("System.Exception");
    /// `System.Delegate`, the base of every delegate type.
    pub const DELEGATE: TypeHash = TypeHash::from_name("System.Delegate");
    /// Dictionary type that script maps box into.
    pub const DICTIONARY: TypeHash = TypeHash::from_name("System.Collections.Hashtable");
    /// `System.Object[]`
    pub const OBJECT_ARRAY: TypeHash = TypeHash::from_array(OBJECT);
}
