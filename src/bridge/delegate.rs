//! Bridges viewed as managed delegates.

use crossbind_core::{
    Delegate, ManagedException, PrimitiveKind, TypeEntry, TypeHash, Value, primitives,
};

use super::Bridge;
use crate::conversion::primitive::convert_value;

/// A script callback handed to managed code as a value of a delegate type.
pub struct BridgeDelegate {
    bridge: Bridge,
    delegate_type: TypeHash,
    return_type: TypeHash,
}

impl BridgeDelegate {
    pub fn new(bridge: Bridge, delegate: &TypeEntry) -> Self {
        let return_type = delegate
            .delegate_signature()
            .map(|(_, ret)| ret)
            .unwrap_or(primitives::VOID);
        Self {
            bridge,
            delegate_type: delegate.type_hash,
            return_type,
        }
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }
}

impl Delegate for BridgeDelegate {
    fn delegate_type(&self) -> TypeHash {
        self.delegate_type
    }

    fn invoke(&self, args: &[Value]) -> Result<Value, ManagedException> {
        let result = self.bridge.invoke(args.to_vec())?;
        coerce_return(result, self.return_type)
    }
}

/// Fit a callback result to the delegate's declared return type.
fn coerce_return(value: Value, return_type: TypeHash) -> Result<Value, ManagedException> {
    if return_type == primitives::VOID {
        return Ok(Value::Null);
    }
    let Some(kind) = PrimitiveKind::from_type_hash(return_type) else {
        return Ok(value);
    };
    if value.primitive_kind() == Some(kind) {
        return Ok(value);
    }
    let converted = match (&value, kind) {
        (Value::String(s), PrimitiveKind::Char) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(Value::Char(c)),
                _ => None,
            }
        }
        _ => convert_value(&value, kind),
    };
    converted.ok_or_else(|| {
        ManagedException::new(
            "System.InvalidCastException",
            format!("callback returned {value:?}, expected {kind}"),
        )
    })
}
