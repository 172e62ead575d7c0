//! The owning thread's side of the bridge.
//!
//! Script callbacks are `Rc`-based and may only be touched on the thread that
//! created them. The strong handles live in a thread-local table keyed by
//! bridge id; everything other threads can reach is `Arc`-shared state that
//! never holds a callback.
//!
//! ```text
//! caller thread                         owning thread (EngineLoop)
//! ─────────────                         ──────────────────────────
//! Bridge::invoke ──push ctx──► bridge queue
//!                ──schedule──► pending bridges ──wake──► dispatch_pending
//!                                                         └─ drain each queue FIFO
//!        ◄────────────── one-slot reply channel ─────────── complete(ctx)
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crossbind_core::ScriptFunction;

use super::{Bridge, BridgeShared};
use crate::config::BridgeOptions;

/// How long `run_until` sleeps between predicate checks without a wake.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

static NEXT_BRIDGE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Strong callback handles owned by this thread, keyed by bridge id.
    static CALLBACKS: RefCell<FxHashMap<u64, ScriptFunction>> = RefCell::new(FxHashMap::default());

    /// The loop owned by this thread, if any.
    static CURRENT_LOOP: RefCell<Option<Weak<LoopShared>>> = const { RefCell::new(None) };
}

pub(crate) fn lookup_callback(id: u64) -> Option<ScriptFunction> {
    CALLBACKS
        .try_with(|table| table.borrow().get(&id).cloned())
        .ok()
        .flatten()
}

pub(crate) fn release_callback(id: u64) {
    // Dropped outside the borrow: the callback's captures may own bridges.
    let removed = CALLBACKS
        .try_with(|table| table.borrow_mut().remove(&id))
        .ok()
        .flatten();
    if removed.is_some() {
        trace!(bridge = id, "released callback handle");
    }
    drop(removed);
}

/// The loop owned by the current thread.
pub(crate) fn current_loop() -> Option<Arc<LoopShared>> {
    CURRENT_LOOP
        .try_with(|current| current.borrow().as_ref().and_then(Weak::upgrade))
        .ok()
        .flatten()
}

/// Loop state reachable from any thread.
pub(crate) struct LoopShared {
    owner: ThreadId,
    /// Bridges with queued invocations, in scheduling order.
    pending: Mutex<VecDeque<Arc<BridgeShared>>>,
    /// Every bridge created by this loop, for teardown.
    bridges: Mutex<Vec<Weak<BridgeShared>>>,
    /// Callback handles released from other threads.
    releases: Mutex<Vec<u64>>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
    closed: AtomicBool,
}

impl LoopShared {
    pub(crate) fn owner(&self) -> ThreadId {
        self.owner
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn wake_receiver(&self) -> &Receiver<()> {
        &self.wake_rx
    }

    /// Coalescing wake: at most one token is ever buffered.
    fn wake(&self) {
        let _ = self.wake_tx.try_send(());
    }

    /// Queue `bridge` for the next dispatch and wake the owning thread.
    pub(crate) fn schedule(&self, bridge: &Arc<BridgeShared>) {
        if bridge.mark_scheduled() {
            self.pending.lock().push_back(Arc::clone(bridge));
        }
        self.wake();
    }

    pub(crate) fn post_release(&self, id: u64) {
        self.releases.lock().push(id);
        self.wake();
    }

    fn has_work(&self) -> bool {
        !self.pending.lock().is_empty() || !self.releases.lock().is_empty()
    }

    fn process_releases(&self) {
        let released = std::mem::take(&mut *self.releases.lock());
        for id in released {
            release_callback(id);
        }
    }

    /// Drain every pending bridge queue. Must run on the owning thread.
    pub(crate) fn dispatch_pending(&self) -> usize {
        debug_assert_eq!(thread::current().id(), self.owner);
        self.process_releases();

        let mut handled = 0;
        loop {
            let next = self.pending.lock().pop_front();
            let Some(bridge) = next else {
                break;
            };
            bridge.clear_scheduled();
            handled += bridge.drain();
        }

        self.process_releases();
        if handled > 0 {
            trace!(handled, "dispatched queued invocations");
        }
        handled
    }

    fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        let bridges = std::mem::take(&mut *self.bridges.lock());
        let mut terminated = 0usize;
        for bridge in bridges.iter().filter_map(Weak::upgrade) {
            if bridge.terminate() {
                terminated += 1;
            }
            bridge.release_handle();
        }
        self.pending.lock().clear();
        self.process_releases();
        debug!(terminated, "engine loop shut down");
    }
}

/// Handle to the scripting engine's owning thread.
///
/// Not `Send`: it must stay on the thread that created it, which is the only
/// thread that ever executes the callbacks it wraps. Dropping the loop tears
/// down every bridge it created.
pub struct EngineLoop {
    shared: Arc<LoopShared>,
    options: BridgeOptions,
    _owner_thread: PhantomData<Rc<()>>,
}

impl EngineLoop {
    pub fn new() -> Self {
        Self::with_options(BridgeOptions::default())
    }

    pub fn with_options(options: BridgeOptions) -> Self {
        let (wake_tx, wake_rx) = channel::bounded(1);
        let shared = Arc::new(LoopShared {
            owner: thread::current().id(),
            pending: Mutex::new(VecDeque::new()),
            bridges: Mutex::new(Vec::new()),
            releases: Mutex::new(Vec::new()),
            wake_tx,
            wake_rx,
            closed: AtomicBool::new(false),
        });
        CURRENT_LOOP.with(|current| *current.borrow_mut() = Some(Arc::downgrade(&shared)));
        debug!(?options, "engine loop started");
        Self {
            shared,
            options,
            _owner_thread: PhantomData,
        }
    }

    pub fn options(&self) -> BridgeOptions {
        self.options
    }

    /// Wrap a callback into a bridge callable from any thread.
    pub fn wrap(&self, function: ScriptFunction) -> Bridge {
        let id = NEXT_BRIDGE_ID.fetch_add(1, Ordering::Relaxed);
        let function_id = function.id();
        CALLBACKS.with(|table| table.borrow_mut().insert(id, function));

        let shared = Arc::new(BridgeShared::new(
            id,
            function_id,
            &self.shared,
            self.options,
        ));
        {
            let mut bridges = self.shared.bridges.lock();
            bridges.retain(|bridge| bridge.strong_count() > 0);
            bridges.push(Arc::downgrade(&shared));
        }
        debug!(
            bridge = id,
            function = function_id.0,
            "wrapped script callback"
        );
        Bridge::from_shared(shared)
    }

    /// Run every queued invocation now. Returns how many ran.
    pub fn dispatch_pending(&self) -> usize {
        self.shared.dispatch_pending()
    }

    /// Block until work is queued or `timeout` elapses.
    pub fn wait_for_work(&self, timeout: Duration) -> bool {
        if self.shared.has_work() {
            return true;
        }
        self.shared.wake_rx.recv_timeout(timeout).is_ok()
    }

    /// Dispatch queued invocations until `done` returns true.
    pub fn run_until(&self, mut done: impl FnMut() -> bool) {
        loop {
            self.dispatch_pending();
            if done() {
                return;
            }
            let _ = self.shared.wake_rx.recv_timeout(POLL_INTERVAL);
        }
    }

    /// Number of callback handles currently held by this thread.
    pub fn held_callbacks(&self) -> usize {
        CALLBACKS.with(|table| table.borrow().len())
    }
}

impl Default for EngineLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EngineLoop {
    fn drop(&mut self) {
        self.shared.shutdown();
        let _ = CURRENT_LOOP.try_with(|current| {
            let mut current = current.borrow_mut();
            let is_this = current
                .as_ref()
                .is_some_and(|weak| weak.as_ptr() == Arc::as_ptr(&self.shared));
            if is_this {
                *current = None;
            }
        });
    }
}

impl std::fmt::Debug for EngineLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineLoop")
            .field("owner", &self.shared.owner)
            .field("pending", &self.shared.pending.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbind_core::{DynValue, Value};

    #[test]
    fn wait_for_work_times_out_when_idle() {
        let engine = EngineLoop::new();
        let _bridge = engine.wrap(ScriptFunction::new(|_| Ok(DynValue::Undefined)));
        assert!(!engine.wait_for_work(Duration::from_millis(20)));
        assert_eq!(engine.dispatch_pending(), 0);
    }

    #[test]
    fn wait_for_work_wakes_on_remote_invoke() {
        let engine = EngineLoop::new();
        let bridge = engine.wrap(ScriptFunction::new(|args| {
            Ok(DynValue::Number(args[0].as_number().unwrap_or(0.0) + 1.0))
        }));

        let remote = bridge.clone();
        let caller = thread::spawn(move || remote.invoke(vec![Value::Int32(1)]));
        assert!(engine.wait_for_work(Duration::from_secs(10)));
        assert_eq!(engine.dispatch_pending(), 1);
        assert_eq!(caller.join().unwrap(), Ok(Value::Int32(2)));
    }

    #[test]
    fn wait_for_work_sees_posted_release() {
        let engine = EngineLoop::new();
        let bridge = engine.wrap(ScriptFunction::new(|_| Ok(DynValue::Undefined)));
        thread::spawn(move || bridge.destroy()).join().unwrap();

        assert!(engine.wait_for_work(Duration::from_millis(20)));
        assert_eq!(engine.held_callbacks(), 1);
        engine.dispatch_pending();
        assert_eq!(engine.held_callbacks(), 0);
    }
}
