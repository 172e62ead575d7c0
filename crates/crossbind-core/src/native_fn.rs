//! Native member implementations.

use std::fmt;
use std::sync::Arc;

use crate::exception::ManagedException;
use crate::value::Value;

/// Arguments of one managed member invocation.
///
/// `args` holds exactly one bound value per formal parameter.
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
    /// Receiver for instance members, `None` for static members and constructors.
    pub this: Option<&'a Value>,
    pub args: &'a [Value],
}

impl<'a> CallContext<'a> {
    pub fn new(this: Option<&'a Value>, args: &'a [Value]) -> Self {
        Self { this, args }
    }

    /// Argument at `index`, or a managed `ArgumentException` when missing.
    pub fn arg(&self, index: usize) -> Result<&'a Value, ManagedException> {
        self.args.get(index).ok_or_else(|| {
            ManagedException::new(
                "System.ArgumentException",
                format!("missing argument {index}"),
            )
        })
    }

    /// Receiver, or a managed `NullReferenceException` for static calls.
    pub fn this(&self) -> Result<&'a Value, ManagedException> {
        self.this.ok_or_else(|| {
            ManagedException::new(
                "System.NullReferenceException",
                "instance member called without a target",
            )
        })
    }
}

/// Trait for callable native members.
pub trait NativeCallable {
    fn call(&self, ctx: &CallContext<'_>) -> Result<Value, ManagedException>;
}

impl<F> NativeCallable for F
where
    F: Fn(&CallContext<'_>) -> Result<Value, ManagedException>,
{
    fn call(&self, ctx: &CallContext<'_>) -> Result<Value, ManagedException> {
        (self)(ctx)
    }
}

/// Type-erased native implementation of a constructor or method.
///
/// The callable is shared, so cloning a `NativeFn` is cheap.
#[derive(Clone)]
pub struct NativeFn {
    inner: Arc<dyn NativeCallable + Send + Sync>,
}

impl NativeFn {
    pub fn new<F>(f: F) -> Self
    where
        F: NativeCallable + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Wrap a closure; the signature is inferred from the bound.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&CallContext<'_>) -> Result<Value, ManagedException> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    pub fn call(&self, ctx: &CallContext<'_>) -> Result<Value, ManagedException> {
        self.inner.call(ctx)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_native_fn() {
        let f = NativeFn::from_fn(|ctx| {
            let a = ctx.arg(0)?.as_i128().unwrap_or_default() as i32;
            let b = ctx.arg(1)?.as_i128().unwrap_or_default() as i32;
            Ok(Value::Int32(a + b))
        });
        let args = [Value::Int32(2), Value::Int32(3)];
        assert_eq!(
            f.call(&CallContext::new(None, &args)).unwrap(),
            Value::Int32(5)
        );
    }

    struct Constant(i32);

    impl NativeCallable for Constant {
        fn call(&self, _ctx: &CallContext<'_>) -> Result<Value, ManagedException> {
            Ok(Value::Int32(self.0))
        }
    }

    #[test]
    fn callable_struct_native_fn() {
        let f = NativeFn::new(Constant(7));
        assert_eq!(
            f.call(&CallContext::new(None, &[])).unwrap(),
            Value::Int32(7)
        );
    }

    #[test]
    fn missing_argument_is_managed_exception() {
        let f = NativeFn::from_fn(|ctx| ctx.arg(3).cloned());
        let err = f.call(&CallContext::new(None, &[])).unwrap_err();
        assert_eq!(err.type_name(), "System.ArgumentException");
    }

    #[test]
    fn static_call_has_no_receiver() {
        let ctx = CallContext::new(None, &[]);
        assert_eq!(
            ctx.this().unwrap_err().type_name(),
            "System.NullReferenceException"
        );
    }
}
