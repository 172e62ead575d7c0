//! Cross-runtime invocation bridge.
//!
//! A [`Bridge`] lets any thread synchronously call a script callback that may
//! only execute on the scripting engine's owning thread.
//!
//! - On the owning thread, `invoke` runs the callback directly (re-entrant
//!   calls are fine).
//! - Elsewhere, the call is queued on the bridge, the owning thread is woken,
//!   and the caller blocks until the owning thread delivers exactly one
//!   outcome.
//!
//! Teardown is safe from any thread: after [`Bridge::destroy`] every invoke
//! fails with [`BridgeError::Unavailable`] instead of hanging.

mod delegate;
mod engine_loop;
mod invocation;

pub use delegate::BridgeDelegate;
pub use engine_loop::EngineLoop;
pub use invocation::{InvocationContext, Outcome};

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::Instant;

use crossbeam::channel::{self, Receiver};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crossbind_core::{BridgeError, DynValue, FunctionId, ManagedException, Value};

use crate::config::BridgeOptions;
use crate::marshal;
use engine_loop::{LoopShared, current_loop, lookup_callback, release_callback};

struct QueueState {
    queue: VecDeque<InvocationContext>,
    terminated: bool,
}

/// State shared by every clone of one bridge.
pub(crate) struct BridgeShared {
    id: u64,
    function: FunctionId,
    owner: ThreadId,
    engine: Weak<LoopShared>,
    options: BridgeOptions,
    state: Mutex<QueueState>,
    /// Set while the bridge sits in its loop's pending list.
    scheduled: AtomicBool,
    /// Set once the strong callback handle has been (or is being) released.
    released: AtomicBool,
}

impl BridgeShared {
    fn new(
        id: u64,
        function: FunctionId,
        engine: &Arc<LoopShared>,
        options: BridgeOptions,
    ) -> Self {
        Self {
            id,
            function,
            owner: engine.owner(),
            engine: Arc::downgrade(engine),
            options,
            state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                terminated: false,
            }),
            scheduled: AtomicBool::new(false),
            released: AtomicBool::new(false),
        }
    }

    fn on_owner(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Returns true if the bridge was not already scheduled.
    fn mark_scheduled(&self) -> bool {
        !self.scheduled.swap(true, Ordering::AcqRel)
    }

    fn clear_scheduled(&self) {
        self.scheduled.store(false, Ordering::Release);
    }

    /// Run queued invocations in arrival order. Owning thread only.
    fn drain(&self) -> usize {
        let mut handled = 0;
        loop {
            let next = {
                let mut state = self.state.lock();
                if state.terminated {
                    break;
                }
                state.queue.pop_front()
            };
            let Some(mut ctx) = next else {
                break;
            };
            let outcome = self.call_here(ctx.take_args());
            ctx.complete(outcome);
            handled += 1;
        }
        handled
    }

    /// Execute the callback on the current (owning) thread.
    fn call_here(&self, args: Vec<Value>) -> Outcome {
        if self.state.lock().terminated {
            return Err(BridgeError::Unavailable);
        }
        let Some(function) = lookup_callback(self.id) else {
            return Err(BridgeError::Unavailable);
        };
        let script_args: Vec<DynValue> = args.iter().map(marshal::to_script).collect();
        match function.call(&script_args) {
            Ok(result) => marshal::to_managed(&result).map_err(|err| {
                BridgeError::Fault(ManagedException::new(
                    "System.InvalidCastException",
                    err.to_string(),
                ))
            }),
            Err(thrown) => Err(BridgeError::Fault(marshal::to_managed_exception(thrown))),
        }
    }

    /// Stop accepting work and fail everything still queued.
    /// Returns true for the call that actually terminated the bridge.
    fn terminate(&self) -> bool {
        let (first, drained) = {
            let mut state = self.state.lock();
            let first = !state.terminated;
            state.terminated = true;
            (first, std::mem::take(&mut state.queue))
        };
        let failed = drained.len();
        for ctx in drained {
            ctx.complete(Err(BridgeError::Unavailable));
        }
        if first {
            debug!(bridge = self.id, failed, "bridge terminated");
        }
        first
    }

    /// Release the strong callback handle exactly once, on the owning thread.
    fn release_handle(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.on_owner() {
            release_callback(self.id);
        } else if let Some(engine) = self.engine.upgrade() {
            engine.post_release(self.id);
        }
    }

    fn wait(&self, rx: Receiver<Outcome>) -> Outcome {
        let deadline = self.options.invoke_timeout.map(|t| Instant::now() + t);
        let own_loop = if self.options.service_own_queue_while_blocked {
            current_loop()
        } else {
            None
        };

        let Some(own_loop) = own_loop else {
            return match deadline {
                Some(deadline) => match rx.recv_deadline(deadline) {
                    Ok(outcome) => outcome,
                    Err(channel::RecvTimeoutError::Timeout) => {
                        warn!(bridge = self.id, "invocation timed out");
                        Err(BridgeError::Timeout)
                    }
                    Err(channel::RecvTimeoutError::Disconnected) => Err(BridgeError::Unavailable),
                },
                None => rx.recv().unwrap_or(Err(BridgeError::Unavailable)),
            };
        };

        // This thread owns a loop of its own: keep running its callbacks so
        // two owning threads calling into each other cannot deadlock.
        let timer = match deadline {
            Some(deadline) => channel::at(deadline),
            None => channel::never(),
        };
        let wake = own_loop.wake_receiver();
        loop {
            crossbeam::channel::select! {
                recv(rx) -> msg => {
                    return msg.unwrap_or(Err(BridgeError::Unavailable));
                },
                recv(wake) -> _ => {
                    own_loop.dispatch_pending();
                },
                recv(timer) -> _ => {
                    warn!(bridge = self.id, "invocation timed out");
                    return Err(BridgeError::Timeout);
                },
            }
        }
    }
}

impl Drop for BridgeShared {
    fn drop(&mut self) {
        self.release_handle();
    }
}

/// A callable handle to one script callback, usable from any thread.
///
/// Clones share the same queue and callback.
#[derive(Clone)]
pub struct Bridge {
    shared: Arc<BridgeShared>,
}

impl Bridge {
    fn from_shared(shared: Arc<BridgeShared>) -> Self {
        Self { shared }
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Identity of the wrapped callback.
    pub fn function_id(&self) -> FunctionId {
        self.shared.function
    }

    pub fn is_terminated(&self) -> bool {
        self.shared.state.lock().terminated
    }

    /// Invocations waiting for the owning thread.
    pub fn queued(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Call the callback and wait for its outcome.
    ///
    /// A thrown value comes back as [`BridgeError::Fault`] carrying the
    /// original exception.
    pub fn invoke(&self, args: Vec<Value>) -> Outcome {
        let shared = &self.shared;
        if shared.on_owner() {
            trace!(bridge = shared.id, "direct invocation");
            return shared.call_here(args);
        }

        let engine = match shared.engine.upgrade() {
            Some(engine) if !engine.is_closed() => engine,
            _ => return Err(BridgeError::Unavailable),
        };
        let (ctx, rx) = InvocationContext::new(args);
        {
            let mut state = shared.state.lock();
            if state.terminated {
                return Err(BridgeError::Unavailable);
            }
            state.queue.push_back(ctx);
        }
        trace!(bridge = shared.id, "queued cross-thread invocation");
        engine.schedule(shared);
        drop(engine);

        shared.wait(rx)
    }

    /// Tear the bridge down. Safe to call from any thread, any number of times.
    pub fn destroy(&self) {
        self.shared.terminate();
        self.shared.release_handle();
    }
}

impl PartialEq for Bridge {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for Bridge {}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("id", &self.shared.id)
            .field("function", &self.shared.function)
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::mpsc;
    use std::time::Duration;

    use crossbind_core::ScriptFunction;

    use crate::config::BridgeOptions;

    fn doubler() -> ScriptFunction {
        ScriptFunction::new(|args| {
            let n = args.first().and_then(DynValue::as_number).unwrap_or(0.0);
            Ok(DynValue::Number(n * 2.0))
        })
    }

    #[test]
    fn direct_call_on_owner() {
        let engine = EngineLoop::new();
        let bridge = engine.wrap(doubler());
        assert_eq!(bridge.invoke(vec![Value::Int32(21)]), Ok(Value::Int32(42)));
        assert_eq!(bridge.queued(), 0);
    }

    #[test]
    fn cross_thread_call_runs_on_owner() {
        let engine = EngineLoop::new();
        let owner = thread::current().id();
        let ran_on = Rc::new(Cell::new(None));
        let seen = Rc::clone(&ran_on);
        let bridge = engine.wrap(ScriptFunction::new(move |_| {
            seen.set(Some(thread::current().id()));
            Ok(DynValue::string("done"))
        }));

        let remote = bridge.clone();
        let handle = thread::spawn(move || remote.invoke(Vec::new()));
        engine.run_until(|| handle.is_finished());
        let outcome = handle.join().unwrap();

        assert_eq!(outcome, Ok(Value::string("done")));
        assert_eq!(ran_on.get(), Some(owner));
    }

    #[test]
    fn thrown_value_is_a_fault() {
        let engine = EngineLoop::new();
        let original = ManagedException::new("Demo.Failure", "nope");
        let thrown = original.clone();
        let bridge = engine.wrap(ScriptFunction::new(move |_| {
            Err(DynValue::Error(thrown.clone()))
        }));

        match bridge.invoke(Vec::new()) {
            Err(BridgeError::Fault(e)) => assert!(e.same_as(&original)),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn destroy_releases_handle_once() {
        let engine = EngineLoop::new();
        let function = doubler();
        let bridge = engine.wrap(function.clone());
        assert_eq!(function.strong_count(), 2);
        assert_eq!(engine.held_callbacks(), 1);

        bridge.destroy();
        bridge.destroy();
        assert_eq!(function.strong_count(), 1);
        assert_eq!(engine.held_callbacks(), 0);
        assert!(bridge.is_terminated());
        assert_eq!(
            bridge.invoke(vec![Value::Int32(1)]),
            Err(BridgeError::Unavailable)
        );
    }

    #[test]
    fn remote_destroy_fails_queued_callers() {
        let engine = EngineLoop::new();
        let function = doubler();
        let bridge = engine.wrap(function.clone());

        let (queued_tx, queued_rx) = mpsc::channel();
        let caller = {
            let bridge = bridge.clone();
            thread::spawn(move || {
                queued_tx.send(()).unwrap();
                bridge.invoke(vec![Value::Int32(1)])
            })
        };
        queued_rx.recv().unwrap();
        while bridge.queued() == 0 && !caller.is_finished() {
            thread::yield_now();
        }

        let destroyer = {
            let bridge = bridge.clone();
            thread::spawn(move || bridge.destroy())
        };
        destroyer.join().unwrap();

        assert_eq!(caller.join().unwrap(), Err(BridgeError::Unavailable));
        // The release was posted to the owning thread.
        assert_eq!(function.strong_count(), 2);
        engine.dispatch_pending();
        assert_eq!(function.strong_count(), 1);
    }

    #[test]
    fn dropping_loop_terminates_bridges() {
        let engine = EngineLoop::new();
        let bridge = engine.wrap(doubler());
        drop(engine);
        assert!(bridge.is_terminated());
        let remote = bridge.clone();
        let outcome = thread::spawn(move || remote.invoke(Vec::new()))
            .join()
            .unwrap();
        assert_eq!(outcome, Err(BridgeError::Unavailable));
    }

    #[test]
    fn dropping_last_handle_releases_callback() {
        let engine = EngineLoop::new();
        let function = doubler();
        let bridge = engine.wrap(function.clone());
        drop(bridge);
        assert_eq!(function.strong_count(), 1);
        assert_eq!(engine.held_callbacks(), 0);
    }

    #[test]
    fn invoke_timeout() {
        let options = BridgeOptions::DEFAULT.with_invoke_timeout(Duration::from_millis(20));
        let engine = EngineLoop::with_options(options);
        let bridge = engine.wrap(doubler());
        let remote = bridge.clone();
        // Nobody dispatches on the owning thread.
        let outcome = thread::spawn(move || remote.invoke(Vec::new()))
            .join()
            .unwrap();
        assert_eq!(outcome, Err(BridgeError::Timeout));
    }
}
