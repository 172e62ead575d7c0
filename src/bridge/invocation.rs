//! One cross-thread invocation.

use crossbeam::channel::{self, Receiver, Sender};

use crossbind_core::{BridgeError, Value};

/// Outcome of one callback invocation.
pub type Outcome = Result<Value, BridgeError>;

/// A queued invocation: the arguments written by the calling thread and the
/// one-slot channel the owning thread completes exactly once.
pub struct InvocationContext {
    args: Vec<Value>,
    reply: Sender<Outcome>,
}

impl InvocationContext {
    /// Create a context and the receiver the caller waits on.
    pub fn new(args: Vec<Value>) -> (Self, Receiver<Outcome>) {
        let (reply, rx) = channel::bounded(1);
        (Self { args, reply }, rx)
    }

    /// Take the arguments for execution.
    pub fn take_args(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.args)
    }

    /// Deliver the outcome. Consumes the context so it cannot complete twice;
    /// a caller that stopped waiting is ignored.
    pub fn complete(self, outcome: Outcome) {
        let _ = self.reply.try_send(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_once() {
        let (mut ctx, rx) = InvocationContext::new(vec![Value::Int32(1)]);
        assert_eq!(ctx.take_args(), vec![Value::Int32(1)]);
        ctx.complete(Ok(Value::Int32(2)));
        assert_eq!(rx.recv().unwrap(), Ok(Value::Int32(2)));
        assert!(rx.recv().is_err());
    }

    #[test]
    fn dropped_context_disconnects_waiter() {
        let (ctx, rx) = InvocationContext::new(Vec::new());
        drop(ctx);
        assert!(rx.recv().is_err());
    }

    #[test]
    fn abandoned_waiter_is_ignored() {
        let (ctx, rx) = InvocationContext::new(Vec::new());
        drop(rx);
        ctx.complete(Err(BridgeError::Unavailable));
    }
}
