//! Leaf conversions between script and managed values.
//!
//! These run without a target type: they are used for callback arguments and
//! results and for thrown values, where no overload context exists.

use std::sync::Arc;

use crossbind_core::{ConversionError, DynValue, ManagedException, ManagedObject, Value, primitives};

use crate::conversion::primitive::natural_number;

/// Type name given to non-exception values thrown by script code.
pub const SCRIPT_EXCEPTION: &str = "ScriptException";

/// Convert a script value to its natural managed representation.
pub fn to_managed(value: &DynValue) -> Result<Value, ConversionError> {
    Ok(match value {
        DynValue::Undefined | DynValue::Null => Value::Null,
        DynValue::Bool(b) => Value::Boolean(*b),
        DynValue::Number(n) => natural_number(*n),
        DynValue::String(s) => Value::string(s),
        DynValue::Array(items) => {
            let values = items.iter().map(to_managed).collect::<Result<Vec<_>, _>>()?;
            Value::array(primitives::OBJECT_ARRAY, primitives::OBJECT, values)
        }
        DynValue::Map(map) => {
            let object = ManagedObject::new(primitives::DICTIONARY);
            for (key, item) in map {
                object.set_field(key.clone(), to_managed(item)?);
            }
            Value::Object(Arc::new(object))
        }
        DynValue::Function(_) => return Err(ConversionError::NotALeafValue("function")),
        DynValue::Managed(v) => v.clone(),
        DynValue::Error(e) => exception_object(e),
    })
}

/// Convert a managed value for the scripting side.
pub fn to_script(value: &Value) -> DynValue {
    match value {
        Value::Null => DynValue::Null,
        Value::Boolean(b) => DynValue::Bool(*b),
        Value::Char(c) => DynValue::string(c.to_string()),
        Value::String(s) => DynValue::string(s),
        Value::Array(array) => DynValue::Array(array.to_vec().iter().map(to_script).collect()),
        Value::Object(object) => match object.data::<ManagedException>() {
            Some(exception) => DynValue::Error(exception.clone()),
            None => DynValue::Managed(value.clone()),
        },
        Value::Delegate(_) => DynValue::Managed(value.clone()),
        numeric => match numeric.as_f64() {
            Some(n) => DynValue::Number(n),
            None => DynValue::Managed(numeric.clone()),
        },
    }
}

/// Turn a thrown script value into a managed exception.
///
/// A thrown managed exception comes back as itself; anything else becomes a
/// [`SCRIPT_EXCEPTION`] carrying a message and the converted payload.
pub fn to_managed_exception(thrown: DynValue) -> ManagedException {
    match thrown {
        DynValue::Error(exception) => exception,
        DynValue::Managed(Value::Object(object)) => {
            if let Some(exception) = object.data::<ManagedException>() {
                return exception.clone();
            }
            script_exception(DynValue::Managed(Value::Object(object)))
        }
        other => script_exception(other),
    }
}

fn script_exception(thrown: DynValue) -> ManagedException {
    let message = match &thrown {
        DynValue::String(s) => s.to_string(),
        DynValue::Map(map) => map
            .get("message")
            .and_then(DynValue::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| "script error".to_string()),
        value => format!("{value:?}"),
    };
    match to_managed(&thrown) {
        Ok(payload) => ManagedException::with_payload(SCRIPT_EXCEPTION, message, payload),
        Err(_) => ManagedException::new(SCRIPT_EXCEPTION, message),
    }
}

/// Hand a managed exception to script code, keeping its identity.
pub fn to_script_error(exception: &ManagedException) -> DynValue {
    DynValue::Error(exception.clone())
}

fn exception_object(exception: &ManagedException) -> Value {
    Value::Object(Arc::new(ManagedObject::with_data(
        exception.type_hash(),
        exception.clone(),
    )))
}
