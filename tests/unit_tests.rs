//! End-to-end tests for crossbind: overload resolution against a small
//! managed type model, and callback bridging across threads.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

use crossbind::marshal;
use crossbind::prelude::*;
use crossbind_core::ManagedObject;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// Fixtures
// =============================================================================

const SHAPES: &str = "Demo.Shapes";
const PIPELINE: &str = "Demo.Pipeline";
const HOOKS: &str = "Demo.Hooks";

fn shape() -> TypeHash {
    TypeHash::from_name("Demo.Shape")
}

fn circle() -> TypeHash {
    TypeHash::from_name("Demo.Circle")
}

fn transform() -> TypeHash {
    TypeHash::from_name("Demo.Transform")
}

fn static_method(owner: &str, name: &str, params: Vec<Param>, ret: TypeHash) -> CallableCandidate {
    CallableCandidate::method(TypeHash::from_name(owner), name, params, ret).as_static()
}

/// A one-parameter `Shapes` overload returning a string naming itself.
fn tagged(name: &str, param: Param, tag: &'static str) -> CallableCandidate {
    static_method(SHAPES, name, vec![param], primitives::STRING)
        .with_native(NativeFn::from_fn(move |_| Ok(Value::string(tag))))
}

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::with_builtins();
    registry.register(TypeEntry::class("Demo.Shape")).unwrap();
    registry
        .register(TypeEntry::class("Demo.Circle").with_base(shape()))
        .unwrap();
    let ints = registry.register_array(primitives::INT32).unwrap();
    registry
        .register(TypeEntry::delegate(
            "Demo.Transform",
            vec![primitives::INT32],
            primitives::INT32,
        ))
        .unwrap();

    registry
        .register(
            TypeEntry::class(SHAPES)
                .with_method(tagged("F", Param::new("x", primitives::INT32), "int"))
                .with_method(tagged("F", Param::new("x", primitives::STRING), "string"))
                .with_method(tagged("F", Param::new("x", primitives::OBJECT), "object"))
                .with_method(tagged("Area", Param::new("s", shape()), "shape"))
                .with_method(tagged("Area", Param::new("c", circle()), "circle"))
                .with_method(tagged("Scale", Param::new("x", primitives::DOUBLE), "double"))
                .with_method(tagged("Scale", Param::new("x", primitives::INT64), "long"))
                .with_method(tagged("Scale", Param::new("x", primitives::INT32), "int"))
                .with_method(tagged("Out", Param::by_ref("x", primitives::INT32), "byref"))
                .with_method(tagged("Out", Param::new("x", primitives::OBJECT), "object"))
                .with_method(
                    static_method(
                        SHAPES,
                        "Sum",
                        vec![
                            Param::new("first", primitives::INT32),
                            Param::params("rest", ints),
                        ],
                        primitives::INT32,
                    )
                    .with_native(NativeFn::from_fn(|ctx| {
                        let first = ctx.arg(0)?.as_i128().unwrap_or(0);
                        let rest: i128 = ctx
                            .arg(1)?
                            .as_array()
                            .map(|a| a.to_vec().iter().filter_map(Value::as_i128).sum())
                            .unwrap_or(0);
                        Ok(Value::Int32((first + rest) as i32))
                    })),
                ),
        )
        .unwrap();

    registry
        .register(
            TypeEntry::class(PIPELINE).with_method(
                static_method(
                    PIPELINE,
                    "Compose",
                    vec![
                        Param::new("outer", transform()),
                        Param::new("inner", transform()),
                        Param::new("x", primitives::INT32),
                    ],
                    primitives::INT32,
                )
                .with_native(NativeFn::from_fn(|ctx| {
                    let outer = ctx.arg(0)?.as_delegate().cloned();
                    let inner = ctx.arg(1)?.as_delegate().cloned();
                    let (Some(outer), Some(inner)) = (outer, inner) else {
                        return Err(ManagedException::new("System.ArgumentNullException", "f"));
                    };
                    let x = ctx.arg(2)?.clone();
                    let y = inner.invoke(&[x])?;
                    outer.invoke(&[y])
                })),
            ),
        )
        .unwrap();

    let hooks = TypeHash::from_name(HOOKS);
    registry
        .register(
            TypeEntry::class(HOOKS)
                .with_field(FieldEntry::new(hooks, "OnValue", transform()).as_static()),
        )
        .unwrap();
    registry
}

fn call(binder: &Binder<'_>, owner: &str, name: &str, args: &[DynValue]) -> DynValue {
    binder.resolve_method(owner, name, None, args).unwrap()
}

fn instance_of(type_hash: TypeHash) -> DynValue {
    DynValue::Managed(Value::Object(Arc::new(ManagedObject::new(type_hash))))
}

// =============================================================================
// Overload Resolution
// =============================================================================

#[test]
fn int_string_object_scoring_example() {
    init_tracing();
    let registry = registry();
    let engine = EngineLoop::new();
    let binder = Binder::new(&registry, &engine);

    assert_eq!(
        call(&binder, SHAPES, "F", &[42.into()]),
        DynValue::string("int")
    );
    assert_eq!(
        call(&binder, SHAPES, "F", &["x".into()]),
        DynValue::string("string")
    );
    assert_eq!(
        call(&binder, SHAPES, "F", &[true.into()]),
        DynValue::string("object")
    );

    let coercion = TypeCoercion::new(&registry);
    assert_eq!(
        coercion.classify(&42.into(), primitives::INT32),
        MatchScore::Exact
    );
    assert_eq!(
        coercion.classify(&"x".into(), primitives::STRING),
        MatchScore::Exact
    );
    assert_eq!(
        coercion.classify(&true.into(), primitives::OBJECT),
        MatchScore::ImplicitConversion
    );
}

#[test]
fn resolution_is_deterministic() {
    let registry = registry();
    let engine = EngineLoop::new();
    let resolver =
        OverloadResolver::new(TypeCoercion::new(&registry), AmbiguityPolicy::FirstDeclared);
    let candidates = registry.methods(TypeHash::from_name(SHAPES), "Scale", true);
    let args = [DynValue::Number(3.0)];

    let mut scope = ConversionScope::new(&engine);
    let first = resolver
        .resolve("Scale", &candidates, &args, &mut scope)
        .unwrap()
        .index;
    for _ in 0..100 {
        let mut scope = ConversionScope::new(&engine);
        let again = resolver
            .resolve("Scale", &candidates, &args, &mut scope)
            .unwrap();
        assert_eq!(again.index, first);
    }
}

#[test]
fn exact_match_beats_conversions() {
    let registry = registry();
    let engine = EngineLoop::new();
    let binder = Binder::new(&registry, &engine);
    assert_eq!(
        call(&binder, SHAPES, "Scale", &[3.into()]),
        DynValue::string("int")
    );
    assert_eq!(
        call(&binder, SHAPES, "Scale", &[2.5.into()]),
        DynValue::string("double")
    );
    // Out of Int32 range: Double is exact.
    assert_eq!(
        call(&binder, SHAPES, "Scale", &[DynValue::Number(1e12)]),
        DynValue::string("double")
    );
}

#[test]
fn narrower_numeric_wins_among_conversions() {
    let registry = registry();
    let engine = EngineLoop::new();
    let resolver = OverloadResolver::new(TypeCoercion::new(&registry), AmbiguityPolicy::Reject);
    let owner = TypeHash::from_name(SHAPES);
    let long_first = [
        static_method(
            SHAPES,
            "G",
            vec![Param::new("x", primitives::DOUBLE)],
            primitives::VOID,
        ),
        static_method(
            SHAPES,
            "G",
            vec![Param::new("x", primitives::INT64)],
            primitives::VOID,
        ),
    ];
    let refs: Vec<&CallableCandidate> = long_first.iter().collect();
    let mut scope = ConversionScope::new(&engine);
    let resolution = resolver
        .resolve("G", &refs, &[7.into()], &mut scope)
        .unwrap();
    assert_eq!(resolution.candidate.params[0].data_type, primitives::INT64);
    assert_eq!(resolution.arguments.as_slice(), &[Value::Int64(7)]);
    assert_eq!(resolution.candidate.owner, owner);
}

#[test]
fn by_ref_candidates_are_never_selected() {
    let registry = registry();
    let engine = EngineLoop::new();
    let binder = Binder::new(&registry, &engine);
    assert_eq!(
        call(&binder, SHAPES, "Out", &[1.into()]),
        DynValue::string("object")
    );
}

#[test]
fn subtype_preference() {
    let registry = registry();
    let engine = EngineLoop::new();
    let binder = Binder::new(&registry, &engine);
    assert_eq!(
        call(&binder, SHAPES, "Area", &[instance_of(circle())]),
        DynValue::string("circle")
    );

    assert_eq!(
        call(&binder, SHAPES, "Area", &[instance_of(shape())]),
        DynValue::string("shape")
    );

    // null is assignable to both; the more derived parameter wins.
    assert_eq!(
        call(&binder, SHAPES, "Area", &[DynValue::Null]),
        DynValue::string("circle")
    );
}

#[test]
fn variable_arity_binding() {
    let registry = registry();
    let engine = EngineLoop::new();
    let binder = Binder::new(&registry, &engine);
    let resolver = binder.resolver();
    let candidates = registry.methods(TypeHash::from_name(SHAPES), "Sum", true);
    let ints = TypeHash::from_array(primitives::INT32);

    let mut scope = ConversionScope::new(&engine);
    let bound = resolver
        .resolve(
            "Sum",
            &candidates,
            &[1.into(), 2.into(), 3.into()],
            &mut scope,
        )
        .unwrap()
        .arguments;
    assert_eq!(
        bound.as_slice(),
        &[
            Value::Int32(1),
            Value::array(
                ints,
                primitives::INT32,
                vec![Value::Int32(2), Value::Int32(3)],
            ),
        ]
    );

    let bound = resolver
        .resolve("Sum", &candidates, &[1.into()], &mut scope)
        .unwrap()
        .arguments;
    assert_eq!(
        bound.as_slice(),
        &[Value::Int32(1), Value::array(ints, primitives::INT32, vec![])]
    );

    assert_eq!(
        call(&binder, SHAPES, "Sum", &[1.into(), 2.into(), 3.into()]),
        DynValue::Number(6.0)
    );
    let packed = DynValue::Array(vec![2.into(), 3.into(), 4.into()]);
    assert_eq!(
        call(&binder, SHAPES, "Sum", &[1.into(), packed]),
        DynValue::Number(10.0)
    );
}

#[test]
fn no_applicable_member() {
    let registry = registry();
    let engine = EngineLoop::new();
    let binder = Binder::new(&registry, &engine);
    let err = binder
        .resolve_method(SHAPES, "Area", None, &["not a shape".into()])
        .unwrap_err();
    assert!(matches!(
        err,
        InteropError::Bind(BindError::NoApplicableMember { .. })
    ));
}

#[test]
fn ambiguity_policy_from_options() {
    let registry = registry();
    let engine = EngineLoop::new();
    let options = BinderOptions::default().with_ambiguity(AmbiguityPolicy::Reject);
    let strict = Binder::with_options(&registry, &engine, options);
    // int is exact for F(int); no tie, so strict mode still resolves.
    assert_eq!(
        strict
            .resolve_method(SHAPES, "F", None, &[42.into()])
            .unwrap(),
        DynValue::string("int")
    );
}

// =============================================================================
// Callbacks Through Managed Code
// =============================================================================

#[test]
fn one_bridge_per_callback_per_call() {
    let registry = registry();
    let engine = EngineLoop::new();
    let binder = Binder::new(&registry, &engine);
    let increment = DynValue::function(|args| {
        let n = args.first().and_then(DynValue::as_number).unwrap_or(0.0);
        Ok(DynValue::Number(n + 1.0))
    });

    let candidates = registry.methods(TypeHash::from_name(PIPELINE), "Compose", true);
    let mut scope = ConversionScope::new(&engine);
    let resolution = binder
        .resolver()
        .resolve(
            "Compose",
            &candidates,
            &[increment.clone(), increment.clone(), 3.into()],
            &mut scope,
        )
        .unwrap();
    assert_eq!(scope.bridge_count(), 1);
    assert_eq!(engine.held_callbacks(), 1);
    drop(resolution);
    drop(scope);
    assert_eq!(engine.held_callbacks(), 0);

    let args = [increment.clone(), increment, 3.into()];
    let result = call(&binder, PIPELINE, "Compose", &args);
    assert_eq!(result, DynValue::Number(5.0));
    assert_eq!(engine.held_callbacks(), 0);
}

#[test]
fn callback_fault_reaches_script_caller_unchanged() {
    let registry = registry();
    let engine = EngineLoop::new();
    let binder = Binder::new(&registry, &engine);
    let original = ManagedException::new("Demo.ScriptFailure", "from callback");
    let thrown = original.clone();
    let failing = DynValue::function(move |_| Err(DynValue::Error(thrown.clone())));
    let identity = DynValue::function(|args| Ok(args[0].clone()));

    let err = binder
        .resolve_method(PIPELINE, "Compose", None, &[identity, failing, 1.into()])
        .unwrap_err();
    assert!(err.exception().unwrap().same_as(&original));
}

#[test]
fn stored_delegate_invoked_from_another_thread() {
    init_tracing();
    let registry = registry();
    let engine = EngineLoop::new();
    let binder = Binder::new(&registry, &engine);
    let owner = thread::current().id();
    let ran_on = Rc::new(Cell::new(None));
    let seen = Rc::clone(&ran_on);
    let doubler = DynValue::function(move |args| {
        seen.set(Some(thread::current().id()));
        let n = args.first().and_then(DynValue::as_number).unwrap_or(0.0);
        Ok(DynValue::Number(n * 2.0))
    });

    binder.set_field(HOOKS, "OnValue", None, &doubler).unwrap();
    let field = registry
        .field(TypeHash::from_name(HOOKS), "OnValue")
        .unwrap();
    let Value::Delegate(hook) = registry.static_value(field) else {
        panic!("hook not stored as a delegate");
    };

    let worker = thread::spawn(move || hook.invoke(&[Value::Int32(20)]));
    engine.run_until(|| worker.is_finished());
    assert_eq!(worker.join().unwrap(), Ok(Value::Int32(40)));
    assert_eq!(ran_on.get(), Some(owner));
}

// =============================================================================
// Bridge Concurrency
// =============================================================================

#[test]
fn concurrent_callers_are_serialized_on_owner() {
    init_tracing();
    const CALLERS: i32 = 8;
    let engine = EngineLoop::new();
    let owner = thread::current().id();
    let active = Rc::new(Cell::new(0usize));
    let peak = Rc::new(Cell::new(0usize));
    let calls = Rc::new(Cell::new(0usize));

    let (a, p, c) = (Rc::clone(&active), Rc::clone(&peak), Rc::clone(&calls));
    let bridge = engine.wrap(ScriptFunction::new(move |args| {
        assert_eq!(thread::current().id(), owner);
        a.set(a.get() + 1);
        p.set(p.get().max(a.get()));
        let n = args.first().and_then(DynValue::as_number).unwrap_or(0.0);
        a.set(a.get() - 1);
        c.set(c.get() + 1);
        if n as i64 % 2 == 1 {
            Err(DynValue::string("odd"))
        } else {
            Ok(DynValue::Number(n * 2.0))
        }
    }));

    let handles: Vec<_> = (0..CALLERS)
        .map(|i| {
            let bridge = bridge.clone();
            thread::spawn(move || bridge.invoke(vec![Value::Int32(i)]))
        })
        .collect();
    engine.run_until(|| handles.iter().all(|h| h.is_finished()));

    for (i, handle) in handles.into_iter().enumerate() {
        match handle.join().unwrap() {
            Ok(value) => {
                assert_eq!(i % 2, 0);
                assert_eq!(value, Value::Int32(2 * i as i32));
            }
            Err(BridgeError::Fault(e)) => {
                assert_eq!(i % 2, 1);
                assert_eq!(e.type_name(), marshal::SCRIPT_EXCEPTION);
            }
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }
    assert_eq!(peak.get(), 1);
    assert_eq!(calls.get(), CALLERS as usize);
}

#[test]
fn queued_invocations_run_in_arrival_order() {
    let engine = EngineLoop::new();
    let order = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&order);
    let bridge = engine.wrap(ScriptFunction::new(move |args| {
        log.borrow_mut()
            .push(args[0].as_number().unwrap_or(-1.0) as i32);
        Ok(DynValue::Undefined)
    }));

    let mut handles = Vec::new();
    for i in 0..6 {
        let remote = bridge.clone();
        handles.push(thread::spawn(move || remote.invoke(vec![Value::Int32(i)])));
        while bridge.queued() < (i + 1) as usize {
            thread::yield_now();
        }
    }
    assert_eq!(engine.dispatch_pending(), 6);
    for handle in handles {
        assert_eq!(handle.join().unwrap(), Ok(Value::Null));
    }
    assert_eq!(*order.borrow(), vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn teardown_is_safe_from_any_thread() {
    let engine = EngineLoop::new();
    let function = ScriptFunction::new(|_| Ok(DynValue::Bool(true)));
    let bridge = engine.wrap(function.clone());

    let callers: Vec<_> = (0..4)
        .map(|_| {
            let remote = bridge.clone();
            thread::spawn(move || remote.invoke(Vec::new()))
        })
        .collect();
    while bridge.queued() < 4 {
        thread::yield_now();
    }

    let destroyers: Vec<_> = (0..3)
        .map(|_| {
            let remote = bridge.clone();
            thread::spawn(move || remote.destroy())
        })
        .collect();
    for destroyer in destroyers {
        destroyer.join().unwrap();
    }
    for caller in callers {
        assert_eq!(caller.join().unwrap(), Err(BridgeError::Unavailable));
    }

    let late: Vec<_> = (0..4)
        .map(|_| {
            let remote = bridge.clone();
            thread::spawn(move || remote.invoke(Vec::new()))
        })
        .collect();
    for caller in late {
        assert_eq!(caller.join().unwrap(), Err(BridgeError::Unavailable));
    }
    assert_eq!(bridge.invoke(Vec::new()), Err(BridgeError::Unavailable));

    engine.dispatch_pending();
    assert_eq!(function.strong_count(), 1);
}

#[test]
fn exception_identity_across_threads() {
    let engine = EngineLoop::new();
    let original = ManagedException::new("Demo.Failure", "thrown on the engine thread");
    let thrown = original.clone();
    let bridge = engine.wrap(ScriptFunction::new(move |_| Err(marshal::to_script_error(&thrown))));

    let remote = bridge.clone();
    let worker = thread::spawn(move || remote.invoke(Vec::new()));
    engine.run_until(|| worker.is_finished());
    match worker.join().unwrap() {
        Err(BridgeError::Fault(e)) => assert!(e.same_as(&original)),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn reentrant_calls_on_owner_thread() {
    let engine = EngineLoop::new();
    let slot: Rc<RefCell<Option<Bridge>>> = Rc::new(RefCell::new(None));
    let this = Rc::clone(&slot);
    let factorial = ScriptFunction::new(move |args| {
        let n = args[0].as_number().unwrap_or(0.0);
        if n <= 1.0 {
            return Ok(DynValue::Number(1.0));
        }
        let me = this.borrow().clone().expect("bridge installed");
        let rest = me
            .invoke(vec![Value::Double(n - 1.0)])
            .map_err(|e| marshal::to_script_error(&e.into()))?;
        Ok(DynValue::Number(n * rest.as_f64().unwrap_or(0.0)))
    });
    let bridge = engine.wrap(factorial);
    *slot.borrow_mut() = Some(bridge.clone());

    assert_eq!(bridge.invoke(vec![Value::Int32(5)]), Ok(Value::Int32(120)));
    slot.borrow_mut().take();
}

#[test]
fn blocked_owner_keeps_servicing_its_own_queue() {
    let engine_a = EngineLoop::new();
    let bridge_a = engine_a.wrap(ScriptFunction::new(|args| {
        Ok(DynValue::Number(args[0].as_number().unwrap_or(0.0) + 1.0))
    }));

    let done = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel();
    let thread_b = {
        let done = Arc::clone(&done);
        let bridge_a = bridge_a.clone();
        thread::spawn(move || {
            let engine_b = EngineLoop::new();
            let bridge_b = engine_b.wrap(ScriptFunction::new(move |args| {
                let n = args[0].as_number().unwrap_or(0.0);
                let v = bridge_a
                    .invoke(vec![Value::Double(n)])
                    .map_err(|e| marshal::to_script_error(&e.into()))?;
                Ok(DynValue::Number(v.as_f64().unwrap_or(0.0) * 10.0))
            }));
            tx.send(bridge_b).unwrap();
            engine_b.run_until(|| done.load(Ordering::SeqCst));
        })
    };

    let bridge_b = rx.recv().unwrap();
    // This thread owns engine_a and blocks on bridge_b, whose callback calls
    // back into bridge_a.
    assert_eq!(bridge_b.invoke(vec![Value::Int32(4)]), Ok(Value::Int32(50)));
    done.store(true, Ordering::SeqCst);
    thread_b.join().unwrap();
}
