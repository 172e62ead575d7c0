//! Type coercion engine.
//!
//! Decides whether a script value can be converted to a managed type, and at
//! what quality, then performs the conversion for the candidate that wins
//! overload resolution.
//!
//! ## Match Bands
//!
//! From best to worst:
//! 1. `Exact` - the value's runtime type is the target
//! 2. `Assignable` - the target is a base class or implemented interface of
//!    the value's reference type, or `null` into any reference type
//! 3. `ImplicitConversion` - representable numeric conversion, boxing,
//!    single-character string to `char`, script array to array/collection,
//!    script map to `object` or a dictionary type, callback to delegate
//! 4. `Incompatible`
//!
//! [`TypeCoercion::classify`] is pure. The only side effect of
//! [`TypeCoercion::convert`] is wrapping callbacks into bridges, and those are
//! cached per callback in the [`ConversionScope`] of one call.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crossbind_core::{
    ConversionError, DynValue, FunctionId, ManagedException, ManagedObject, PrimitiveKind,
    ScriptFunction, TypeEntry, TypeHash, TypeKind, Value, primitives,
};
use crossbind_registry::TypeRegistry;

use crate::bridge::{Bridge, BridgeDelegate, EngineLoop};

pub mod primitive;

use primitive::{convert_value, natural_number, number_fits, number_to, value_fits};

/// Quality of one argument-to-parameter match. Ordered worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchScore {
    Incompatible,
    ImplicitConversion,
    Assignable,
    Exact,
}

impl MatchScore {
    /// Whether a candidate with this overall score may be selected.
    pub fn is_applicable(self) -> bool {
        self >= MatchScore::ImplicitConversion
    }
}

/// Bridges created while converting the arguments of one call.
pub struct ConversionScope<'e> {
    engine: &'e EngineLoop,
    bridges: FxHashMap<FunctionId, Bridge>,
}

impl<'e> ConversionScope<'e> {
    pub fn new(engine: &'e EngineLoop) -> Self {
        Self {
            engine,
            bridges: FxHashMap::default(),
        }
    }

    /// The bridge for `function`, created on first use.
    pub fn bridge_for(&mut self, function: &ScriptFunction) -> Bridge {
        let engine = self.engine;
        self.bridges
            .entry(function.id())
            .or_insert_with(|| engine.wrap(function.clone()))
            .clone()
    }

    /// Number of distinct callbacks wrapped so far.
    pub fn bridge_count(&self) -> usize {
        self.bridges.len()
    }
}

/// Scores and performs conversions against a type registry.
#[derive(Clone, Copy)]
pub struct TypeCoercion<'r> {
    registry: &'r TypeRegistry,
}

impl<'r> TypeCoercion<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r TypeRegistry {
        self.registry
    }

    // ==========================================================================
    // Scoring
    // ==========================================================================

    /// Score converting a script value to `target`.
    pub fn classify(&self, value: &DynValue, target: TypeHash) -> MatchScore {
        let Some(entry) = self.registry.get(target) else {
            return MatchScore::Incompatible;
        };
        match value {
            DynValue::Undefined | DynValue::Null => null_score(entry),
            DynValue::Bool(_) => self.classify_runtime(primitives::BOOLEAN, entry),
            DynValue::Number(n) => self.classify_number(*n, entry),
            DynValue::String(s) => self.classify_string(s, entry),
            DynValue::Array(items) => match element_target(entry) {
                Some(element) => items
                    .iter()
                    .map(|item| self.classify(item, element))
                    .fold(MatchScore::ImplicitConversion, MatchScore::min),
                None => MatchScore::Incompatible,
            },
            DynValue::Map(map) => {
                if entry.type_hash == primitives::OBJECT || entry.is_dictionary {
                    map.values()
                        .map(|v| self.classify(v, primitives::OBJECT))
                        .fold(MatchScore::ImplicitConversion, MatchScore::min)
                } else {
                    MatchScore::Incompatible
                }
            }
            DynValue::Function(_) => {
                if entry.is_delegate() {
                    MatchScore::ImplicitConversion
                } else {
                    MatchScore::Incompatible
                }
            }
            DynValue::Managed(v) => self.classify_managed(v, target),
            DynValue::Error(e) => self.classify_runtime(self.exception_type(e), entry),
        }
    }

    /// Score converting an already-managed value to `target`.
    pub fn classify_managed(&self, value: &Value, target: TypeHash) -> MatchScore {
        let Some(entry) = self.registry.get(target) else {
            return MatchScore::Incompatible;
        };
        let Some(runtime) = value.runtime_type() else {
            return null_score(entry);
        };

        if let (Some(src), Some(dst)) = (value.primitive_kind(), entry.primitive_kind()) {
            if src == dst {
                return MatchScore::Exact;
            }
            return if value_fits(value, dst) {
                MatchScore::ImplicitConversion
            } else {
                MatchScore::Incompatible
            };
        }
        if let Value::String(s) = value {
            return self.classify_string(s, entry);
        }

        let score = self.classify_runtime(runtime, entry);
        if score != MatchScore::Incompatible {
            return score;
        }
        match (value, element_target(entry)) {
            (Value::Array(array), Some(element)) => array
                .to_vec()
                .iter()
                .map(|item| self.classify_managed(item, element))
                .fold(MatchScore::ImplicitConversion, MatchScore::min),
            _ => MatchScore::Incompatible,
        }
    }

    fn classify_runtime(&self, runtime: TypeHash, entry: &TypeEntry) -> MatchScore {
        if runtime == entry.type_hash {
            return MatchScore::Exact;
        }
        if !self.registry.is_assignable(entry.type_hash, runtime) {
            return MatchScore::Incompatible;
        }
        let boxing =
            self.registry.get(runtime).is_some_and(|e| e.is_value_type) && !entry.is_value_type;
        if boxing {
            MatchScore::ImplicitConversion
        } else {
            MatchScore::Assignable
        }
    }

    fn classify_number(&self, n: f64, entry: &TypeEntry) -> MatchScore {
        let natural = natural_number(n);
        match entry.primitive_kind() {
            Some(kind) if kind.is_numeric() => {
                if natural.primitive_kind() == Some(kind) {
                    MatchScore::Exact
                } else if number_fits(n, kind) {
                    MatchScore::ImplicitConversion
                } else {
                    MatchScore::Incompatible
                }
            }
            _ => match natural.runtime_type() {
                Some(runtime) => self.classify_runtime(runtime, entry),
                None => MatchScore::Incompatible,
            },
        }
    }

    fn classify_string(&self, s: &str, entry: &TypeEntry) -> MatchScore {
        if entry.primitive_kind() == Some(PrimitiveKind::Char) {
            return if s.chars().count() == 1 {
                MatchScore::ImplicitConversion
            } else {
                MatchScore::Incompatible
            };
        }
        self.classify_runtime(primitives::STRING, entry)
    }

    fn exception_type(&self, exception: &ManagedException) -> TypeHash {
        if self.registry.contains(exception.type_hash()) {
            exception.type_hash()
        } else {
            primitives::EXCEPTION
        }
    }

    // ==========================================================================
    // Conversion
    // ==========================================================================

    /// Convert a script value to `target`, wrapping callbacks through `scope`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn convert(
        &self,
        value: &DynValue,
        target: TypeHash,
        scope: &mut ConversionScope<'_>,
    ) -> Result<(Value, MatchScore), ConversionError> {
        let score = self.classify(value, target);
        if score == MatchScore::Incompatible {
            return Err(self.incompatible(value.kind_name(), target));
        }
        let entry = self
            .registry
            .get(target)
            .ok_or_else(|| ConversionError::UnknownType(target.to_string()))?;

        let converted = match value {
            DynValue::Undefined | DynValue::Null => Value::Null,
            DynValue::Bool(b) => Value::Boolean(*b),
            DynValue::Number(n) => match entry.primitive_kind() {
                Some(kind) if kind.is_numeric() => number_to(*n, kind)
                    .ok_or_else(|| self.incompatible(value.kind_name(), target))?,
                _ => natural_number(*n),
            },
            DynValue::String(s) => self.string_to(s, entry)?,
            DynValue::Array(items) => {
                let (array_type, element) = array_shape(entry);
                let values = items
                    .iter()
                    .map(|item| self.convert(item, element, scope).map(|(v, _)| v))
                    .collect::<Result<Vec<_>, _>>()?;
                Value::array(array_type, element, values)
            }
            DynValue::Map(map) => {
                let object_type = if entry.is_dictionary {
                    target
                } else {
                    primitives::DICTIONARY
                };
                let object = ManagedObject::new(object_type);
                for (key, item) in map {
                    let (converted, _) = self.convert(item, primitives::OBJECT, scope)?;
                    object.set_field(key.clone(), converted);
                }
                Value::Object(Arc::new(object))
            }
            DynValue::Function(function) => {
                let bridge = scope.bridge_for(function);
                Value::Delegate(Arc::new(BridgeDelegate::new(bridge, entry)))
            }
            DynValue::Managed(v) => return self.convert_managed(v, target),
            DynValue::Error(e) => Value::Object(Arc::new(ManagedObject::with_data(
                self.exception_type(e),
                e.clone(),
            ))),
        };
        Ok((converted, score))
    }

    /// Convert an already-managed value to `target`.
    pub fn convert_managed(
        &self,
        value: &Value,
        target: TypeHash,
    ) -> Result<(Value, MatchScore), ConversionError> {
        let score = self.classify_managed(value, target);
        let incompatible = || {
            let source = value
                .runtime_type()
                .map(|t| self.registry.name_of(t))
                .unwrap_or_else(|| "null".to_string());
            self.incompatible(&source, target)
        };
        match score {
            MatchScore::Incompatible => Err(incompatible()),
            MatchScore::Exact | MatchScore::Assignable => Ok((value.clone(), score)),
            MatchScore::ImplicitConversion => {
                let entry = self
                    .registry
                    .get(target)
                    .ok_or_else(|| ConversionError::UnknownType(target.to_string()))?;
                let converted = match (value, entry.primitive_kind()) {
                    (Value::String(s), Some(_)) => self.string_to(s, entry)?,
                    (_, Some(kind)) => convert_value(value, kind).ok_or_else(incompatible)?,
                    (Value::Array(array), None)
                        if self.classify_runtime(array.type_hash(), entry)
                            == MatchScore::Incompatible =>
                    {
                        let (array_type, element) = array_shape(entry);
                        let values = array
                            .to_vec()
                            .iter()
                            .map(|item| self.convert_managed(item, element).map(|(v, _)| v))
                            .collect::<Result<Vec<_>, _>>()?;
                        Value::array(array_type, element, values)
                    }
                    // Boxing keeps the value as is.
                    _ => value.clone(),
                };
                Ok((converted, score))
            }
        }
    }

    fn string_to(&self, s: &str, entry: &TypeEntry) -> Result<Value, ConversionError> {
        if entry.primitive_kind() != Some(PrimitiveKind::Char) {
            return Ok(Value::string(s));
        }
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Value::Char(c)),
            _ => Err(self.incompatible("string", entry.type_hash)),
        }
    }

    fn incompatible(&self, source: &str, target: TypeHash) -> ConversionError {
        ConversionError::IncompatibleType {
            value: source.to_string(),
            target: self.registry.name_of(target),
        }
    }
}

fn null_score(entry: &TypeEntry) -> MatchScore {
    if entry.is_value_type {
        MatchScore::Incompatible
    } else {
        MatchScore::Assignable
    }
}

/// Element type a script array converts into for this target, if any.
fn element_target(entry: &TypeEntry) -> Option<TypeHash> {
    if entry.is_array() || entry.is_collection {
        Some(entry.element_type())
    } else if matches!(entry.kind, TypeKind::Object) {
        Some(primitives::OBJECT)
    } else {
        None
    }
}

/// Runtime array type and element type built for a target.
fn array_shape(entry: &TypeEntry) -> (TypeHash, TypeHash) {
    if matches!(entry.kind, TypeKind::Object) {
        (primitives::OBJECT_ARRAY, primitives::OBJECT)
    } else {
        (entry.type_hash, entry.element_type())
    }
}
