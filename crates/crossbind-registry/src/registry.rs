//! TypeRegistry - managed type model and member directory.
//!
//! [`TypeRegistry`] stores every managed type the binder can see, answers
//! hierarchy questions (`is_assignable`) and hands out the candidate lists
//! that overload resolution works on.
//!
//! # Thread Safety
//!
//! Type metadata is populated once through `&mut self` and is read-only
//! afterwards, so a shared `&TypeRegistry` can be used from any number of
//! threads without locking. Static field *values* are the only mutable state
//! and sit behind their own lock.
//!
//! # Example
//!
//! ```
//! use crossbind_core::{TypeEntry, primitives};
//! use crossbind_registry::TypeRegistry;
//!
//! let mut registry = TypeRegistry::with_builtins();
//! let shape = registry.register(TypeEntry::class("Demo.Shape")).unwrap();
//! assert!(registry.is_assignable(primitives::OBJECT, shape));
//! ```

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crossbind_core::{
    CallableCandidate, FieldEntry, PrimitiveKind, RegistrationError, TypeEntry, TypeHash, TypeKind,
    Value, primitives,
};

/// Unified type registry and member directory.
#[derive(Default)]
pub struct TypeRegistry {
    /// Types by hash (primary storage).
    types: FxHashMap<TypeHash, TypeEntry>,

    /// Qualified name -> hash.
    by_name: FxHashMap<String, TypeHash>,

    /// Current values of static fields, keyed by field hash.
    statics: RwLock<FxHashMap<TypeHash, Value>>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the root type, `System.Void`, `System.String`,
    /// every primitive, `System.Delegate`, `System.Exception`, the dictionary
    /// type script maps box into, and `System.Object[]`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.insert(TypeEntry::new("System.Object", TypeKind::Object));
        registry.insert(TypeEntry::new("System.Void", TypeKind::Void));
        registry.insert(TypeEntry::new("System.String", TypeKind::String));
        for kind in PrimitiveKind::ALL {
            registry.insert(TypeEntry::primitive(kind));
        }
        registry.insert(TypeEntry::class("System.Delegate"));
        registry.insert(TypeEntry::class("System.Exception"));
        registry.insert(TypeEntry::class("System.Collections.Hashtable").as_dictionary());
        registry.insert(TypeEntry::array("System.Object", primitives::OBJECT));
        registry
    }

    fn insert(&mut self, entry: TypeEntry) -> TypeHash {
        let hash = entry.type_hash;
        self.by_name.insert(entry.name.clone(), hash);
        self.types.insert(hash, entry);
        hash
    }

    // ==========================================================================
    // Registration
    // ==========================================================================

    /// Register a type. Its base, interfaces, array element, generic
    /// arguments and every parameter, return and field type of its members
    /// must already be registered. Array types are not created on demand:
    /// register them first with [`register_array`](Self::register_array).
    pub fn register(&mut self, entry: TypeEntry) -> Result<TypeHash, RegistrationError> {
        if self.types.contains_key(&entry.type_hash) || self.by_name.contains_key(&entry.name) {
            return Err(RegistrationError::DuplicateType(entry.name));
        }

        let mut referenced: Vec<TypeHash> = entry.interfaces.clone();
        referenced.extend(entry.base);
        referenced.extend(entry.type_args.iter().copied());
        if let TypeKind::Array { element } = entry.kind {
            referenced.push(element);
        }
        if let Some((params, ret)) = entry.delegate_signature() {
            referenced.extend(params.iter().copied());
            referenced.push(ret);
        }
        for hash in referenced {
            if !self.types.contains_key(&hash) {
                return Err(RegistrationError::UnknownReference {
                    owner: entry.name.clone(),
                    referenced: hash.to_string(),
                });
            }
        }

        let member_types: Vec<TypeHash> = entry
            .constructors
            .iter()
            .chain(entry.methods.iter())
            .flat_map(|m| m.params.iter().map(|p| p.data_type).chain([m.return_type]))
            .chain(entry.fields.iter().map(|f| f.data_type))
            .filter(|hash| *hash != entry.type_hash)
            .collect();
        for hash in member_types {
            if !self.types.contains_key(&hash) {
                return Err(RegistrationError::UnknownReference {
                    owner: entry.name.clone(),
                    referenced: hash.to_string(),
                });
            }
        }

        trace!(name = %entry.name, hash = %entry.type_hash, "registered managed type");
        Ok(self.insert(entry))
    }

    /// Register (or look up) the array type `element[]`.
    pub fn register_array(&mut self, element: TypeHash) -> Result<TypeHash, RegistrationError> {
        let hash = TypeHash::from_array(element);
        if self.types.contains_key(&hash) {
            return Ok(hash);
        }
        let element_name = self
            .get(element)
            .map(|e| e.name.clone())
            .ok_or_else(|| RegistrationError::UnknownReference {
                owner: "array".to_string(),
                referenced: element.to_string(),
            })?;
        Ok(self.insert(TypeEntry::array(&element_name, element)))
    }

    // ==========================================================================
    // Type Lookup
    // ==========================================================================

    pub fn get(&self, hash: TypeHash) -> Option<&TypeEntry> {
        self.types.get(&hash)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&TypeEntry> {
        self.by_name.get(name).and_then(|hash| self.types.get(hash))
    }

    pub fn contains(&self, hash: TypeHash) -> bool {
        self.types.contains_key(&hash)
    }

    /// Human readable name for diagnostics.
    pub fn name_of(&self, hash: TypeHash) -> String {
        self.get(hash)
            .map(|e| e.name.clone())
            .unwrap_or_else(|| hash.to_string())
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Whether `null` may be stored in a location of this type.
    pub fn is_reference_type(&self, hash: TypeHash) -> bool {
        self.get(hash).is_some_and(|e| !e.is_value_type)
    }

    // ==========================================================================
    // Hierarchy
    // ==========================================================================

    /// `target.IsAssignableFrom(source)`: a value whose runtime type is
    /// `source` can be stored in a `target` location without conversion
    /// other than boxing.
    pub fn is_assignable(&self, target: TypeHash, source: TypeHash) -> bool {
        if target == source {
            return true;
        }
        let (Some(target_entry), Some(source_entry)) = (self.get(target), self.get(source)) else {
            return false;
        };
        if matches!(target_entry.kind, TypeKind::Object) {
            return true;
        }

        // Reference-typed arrays are covariant.
        if let (TypeKind::Array { element: te }, TypeKind::Array { element: se }) =
            (&target_entry.kind, &source_entry.kind)
        {
            return self.is_reference_type(*se) && self.is_assignable(*te, *se);
        }

        if target_entry.is_interface() {
            return self.implements(source, target);
        }
        self.derives_from(source, target)
    }

    /// Walk the base chain of `source` looking for `base`.
    pub fn derives_from(&self, source: TypeHash, base: TypeHash) -> bool {
        let mut current = self.get(source).and_then(|e| e.base);
        let mut guard = 0usize;
        while let Some(hash) = current {
            if hash == base {
                return true;
            }
            guard += 1;
            if guard > self.types.len() {
                break;
            }
            current = self.get(hash).and_then(|e| e.base);
        }
        false
    }

    /// Whether `source` (or any base, or any inherited interface) implements `interface`.
    pub fn implements(&self, source: TypeHash, interface: TypeHash) -> bool {
        let mut visited = FxHashSet::default();
        let mut stack = vec![source];
        while let Some(hash) = stack.pop() {
            if !visited.insert(hash) {
                continue;
            }
            let Some(entry) = self.get(hash) else {
                continue;
            };
            if entry.interfaces.contains(&interface) {
                return true;
            }
            stack.extend(entry.interfaces.iter().copied());
            stack.extend(entry.base);
        }
        false
    }

    // ==========================================================================
    // Member Directory
    // ==========================================================================

    /// Constructors declared by `hash`, in declaration order.
    pub fn constructors(&self, hash: TypeHash) -> Vec<&CallableCandidate> {
        self.get(hash)
            .map(|e| e.constructors.iter().collect())
            .unwrap_or_default()
    }

    /// Methods named `name` visible on `hash`: declared ones first, then
    /// inherited ones walking up the base chain.
    pub fn methods(&self, hash: TypeHash, name: &str, is_static: bool) -> Vec<&CallableCandidate> {
        let mut found = Vec::new();
        let mut current = Some(hash);
        let mut seen = FxHashSet::default();
        while let Some(type_hash) = current {
            if !seen.insert(type_hash) {
                break;
            }
            let Some(entry) = self.get(type_hash) else {
                break;
            };
            found.extend(entry.methods_named(name, is_static));
            current = entry.base;
        }
        found
    }

    /// Field `name` declared on `hash` or one of its bases.
    pub fn field(&self, hash: TypeHash, name: &str) -> Option<&FieldEntry> {
        let mut current = Some(hash);
        let mut seen = FxHashSet::default();
        while let Some(type_hash) = current {
            if !seen.insert(type_hash) {
                return None;
            }
            let entry = self.get(type_hash)?;
            if let Some(field) = entry.field(name) {
                return Some(field);
            }
            current = entry.base;
        }
        None
    }

    // ==========================================================================
    // Static Field Storage
    // ==========================================================================

    /// Current value of a static field; unset fields read as null.
    pub fn static_value(&self, field: &FieldEntry) -> Value {
        self.statics
            .read()
            .get(&field.hash)
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn set_static_value(&self, field: &FieldEntry, value: Value) {
        self.statics.write().insert(field.hash, value);
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.types.len())
            .finish_non_exhaustive()
    }
}
