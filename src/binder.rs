//! The binder surface the scripting side calls into.
//!
//! Each entry point looks a type up by name, resolves the member against the
//! untyped script arguments, invokes it and marshals the result back.

use tracing::{debug, trace};

use crossbind_core::{
    CallContext, CallableCandidate, DynValue, FieldEntry, InteropError, ManagedException, ObjectRef,
    PrimitiveKind, TypeEntry, TypeKind, Value,
};
use crossbind_registry::TypeRegistry;

use crate::bridge::EngineLoop;
use crate::config::BinderOptions;
use crate::conversion::{ConversionScope, TypeCoercion};
use crate::marshal;
use crate::overload::{BoundArguments, OverloadResolver};

/// Binds script calls to managed members.
pub struct Binder<'a> {
    registry: &'a TypeRegistry,
    engine: &'a EngineLoop,
    options: BinderOptions,
}

impl<'a> Binder<'a> {
    pub fn new(registry: &'a TypeRegistry, engine: &'a EngineLoop) -> Self {
        Self::with_options(registry, engine, BinderOptions::default())
    }

    pub fn with_options(
        registry: &'a TypeRegistry,
        engine: &'a EngineLoop,
        options: BinderOptions,
    ) -> Self {
        Self {
            registry,
            engine,
            options,
        }
    }

    pub fn options(&self) -> BinderOptions {
        self.options
    }

    pub fn coercion(&self) -> TypeCoercion<'a> {
        TypeCoercion::new(self.registry)
    }

    pub fn resolver(&self) -> OverloadResolver<'a> {
        OverloadResolver::new(self.coercion(), self.options.ambiguity)
    }

    // ==========================================================================
    // Construction and Calls
    // ==========================================================================

    /// Construct an instance of `type_name`.
    ///
    /// With no arguments, a type without a parameterless constructor but with
    /// a natural default (primitives, strings) yields that default.
    pub fn resolve_constructor(
        &self,
        type_name: &str,
        args: &[DynValue],
    ) -> Result<Value, InteropError> {
        let entry = self.type_entry(type_name)?;
        let constructors = self.registry.constructors(entry.type_hash);
        if args.is_empty() && !constructors.iter().any(|c| c.accepts_arg_count(0)) {
            if let Some(value) = default_value(entry) {
                debug!(type_name, "constructed default value");
                return Ok(value);
            }
        }

        let mut scope = ConversionScope::new(self.engine);
        let resolution = self
            .resolver()
            .resolve(&entry.name, &constructors, args, &mut scope)?;
        self.invoke(resolution.candidate, None, resolution.arguments)
    }

    /// Call method `name` on `type_name`.
    ///
    /// A wrapped managed `target` selects instance methods, anything else
    /// static ones. A void method returns `undefined`.
    pub fn resolve_method(
        &self,
        type_name: &str,
        name: &str,
        target: Option<&DynValue>,
        args: &[DynValue],
    ) -> Result<DynValue, InteropError> {
        let entry = self.type_entry(type_name)?;
        let this = match target {
            Some(DynValue::Managed(value)) if !value.is_null() => Some(value),
            _ => None,
        };

        let candidates = self.registry.methods(entry.type_hash, name, this.is_none());
        if candidates.is_empty()
            && self
                .registry
                .methods(entry.type_hash, name, this.is_some())
                .is_empty()
        {
            return Err(InteropError::UnknownMember {
                type_name: entry.name.clone(),
                member: name.to_string(),
            });
        }

        let mut scope = ConversionScope::new(self.engine);
        let resolution = self
            .resolver()
            .resolve(name, &candidates, args, &mut scope)?;
        let candidate = resolution.candidate;
        let result = self.invoke(candidate, this, resolution.arguments)?;
        if candidate.returns_void() {
            return Ok(DynValue::Undefined);
        }
        Ok(marshal::to_script(&result))
    }

    fn invoke(
        &self,
        candidate: &CallableCandidate,
        this: Option<&Value>,
        arguments: BoundArguments,
    ) -> Result<Value, InteropError> {
        let Some(native) = &candidate.native else {
            return Err(InteropError::UnknownMember {
                type_name: self.registry.name_of(candidate.owner),
                member: candidate.name.clone(),
            });
        };
        let args = arguments.into_vec();
        trace!(member = %candidate.name, args = args.len(), "invoking");
        native
            .call(&CallContext::new(this, &args))
            .map_err(InteropError::InvocationFault)
    }

    // ==========================================================================
    // Fields
    // ==========================================================================

    /// Read field `name`. Static fields ignore `target`.
    pub fn get_field(
        &self,
        type_name: &str,
        name: &str,
        target: Option<&DynValue>,
    ) -> Result<DynValue, InteropError> {
        let entry = self.type_entry(type_name)?;
        let field = self.field(entry, name)?;
        let value = if field.is_static {
            self.registry.static_value(field)
        } else {
            self.instance(target, entry, name)?
                .field(name)
                .unwrap_or(Value::Null)
        };
        Ok(marshal::to_script(&value))
    }

    /// Assign field `name`, coercing `value` to the field's declared type.
    pub fn set_field(
        &self,
        type_name: &str,
        name: &str,
        target: Option<&DynValue>,
        value: &DynValue,
    ) -> Result<(), InteropError> {
        let entry = self.type_entry(type_name)?;
        let field = self.field(entry, name)?;
        let mut scope = ConversionScope::new(self.engine);
        let (converted, _) = self.coercion().convert(value, field.data_type, &mut scope)?;
        if field.is_static {
            self.registry.set_static_value(field, converted);
        } else {
            self.instance(target, entry, name)?
                .set_field(name, converted);
        }
        trace!(type_name, field = name, "field assigned");
        Ok(())
    }

    // ==========================================================================
    // Lookup Helpers
    // ==========================================================================

    fn type_entry(&self, type_name: &str) -> Result<&'a TypeEntry, InteropError> {
        self.registry
            .get_by_name(type_name)
            .ok_or_else(|| InteropError::UnknownType(type_name.to_string()))
    }

    fn field(&self, entry: &TypeEntry, name: &str) -> Result<&'a FieldEntry, InteropError> {
        self.registry
            .field(entry.type_hash, name)
            .ok_or_else(|| InteropError::UnknownMember {
                type_name: entry.name.clone(),
                member: name.to_string(),
            })
    }

    fn instance<'t>(
        &self,
        target: Option<&'t DynValue>,
        entry: &TypeEntry,
        field: &str,
    ) -> Result<&'t ObjectRef, InteropError> {
        match target {
            Some(DynValue::Managed(Value::Object(object))) => Ok(object),
            _ => Err(InteropError::InvocationFault(ManagedException::new(
                "System.NullReferenceException",
                format!(
                    "instance field '{}.{field}' requires a target object",
                    entry.name
                ),
            ))),
        }
    }
}

/// Natural default of a type constructed without arguments.
fn default_value(entry: &TypeEntry) -> Option<Value> {
    Some(match entry.kind {
        TypeKind::String => Value::string(""),
        TypeKind::Primitive(kind) => match kind {
            PrimitiveKind::Boolean => Value::Boolean(false),
            PrimitiveKind::Char => Value::Char('\0'),
            PrimitiveKind::SByte => Value::SByte(0),
            PrimitiveKind::Byte => Value::Byte(0),
            PrimitiveKind::Int16 => Value::Int16(0),
            PrimitiveKind::UInt16 => Value::UInt16(0),
            PrimitiveKind::Int32 => Value::Int32(0),
            PrimitiveKind::UInt32 => Value::UInt32(0),
            PrimitiveKind::Int64 => Value::Int64(0),
            PrimitiveKind::UInt64 => Value::UInt64(0),
            PrimitiveKind::Single => Value::Single(0.0),
            PrimitiveKind::Double => Value::Double(0.0),
        },
        _ => return None,
    })
}
