use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use weakref::{Callback, Config, Obj, Value, WeakContext};

/// A callback that appends `label` to a shared log
fn logging(log: &Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> Callback {
    let log = log.clone();
    Callback::new(move |_| log.lock().push(label))
}

fn counting(count: &Arc<AtomicUsize>) -> Callback {
    let count = count.clone();
    Callback::new(move |_| {
        count.fetch_add(1, Ordering::SeqCst);
    })
}

#[test]
fn invokes_the_callback_after_the_target_is_reclaimed() {
    let ctx = WeakContext::new();
    let count = Arc::new(AtomicUsize::new(0));

    // The weak reference itself is dropped right away, the callback must still run
    ctx.create(&Value::from(Obj::new()), Some(counting(&count)))
        .unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 0);

    ctx.run_finalizers();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn invokes_every_callback_in_registration_order() {
    let ctx = WeakContext::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let target = Obj::new();
    let handle = ctx.weaken(&target);
    handle.add_callback(logging(&log, "first"));
    handle.add_callback(logging(&log, "second"));
    handle.add_callback(logging(&log, "third"));

    drop(target);
    ctx.run_finalizers();
    assert_eq!(*log.lock(), vec!["first", "second", "third"]);
}

#[test]
fn duplicate_callbacks_fire_once_per_registration() {
    let ctx = WeakContext::new();
    let count = Arc::new(AtomicUsize::new(0));
    let cb = counting(&count);
    let target = Obj::new();
    let handle = ctx.weaken(&target);
    handle.add_callback(cb.clone());
    handle.add_callback(cb);
    assert_eq!(handle.callbacks().len(), 2);

    drop(target);
    ctx.run_finalizers();
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn invokes_callbacks_of_every_reference_to_the_target() {
    let ctx = WeakContext::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let target = Obj::new();
    let r1 = ctx.weaken(&target);
    let r2 = ctx.weaken(&target);
    assert!(r1.target().unwrap().ptr_eq(&target));
    assert!(!r1.is_dead());

    r1.add_callback(logging(&log, "r1"));
    r2.add_callback(logging(&log, "r2"));

    drop(target);
    let report = ctx.run_finalizers();
    assert_eq!(report.targets, 1);
    assert_eq!(report.handles, 2);
    assert_eq!(r1.target_value(), Value::Undefined);
    assert!(r1.is_dead());
    assert!(r2.is_dead());
    assert_eq!(*log.lock(), vec!["r1", "r2"]);
}

#[test]
fn references_are_independent() {
    let ctx = WeakContext::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let target = Obj::new();
    let r1 = ctx.weaken(&target);
    let r2 = ctx.weaken(&target);
    r1.add_callback(logging(&log, "r1"));
    r2.add_callback(logging(&log, "r2"));

    r1.remove_callbacks();
    assert!(r1.callbacks().is_empty());
    assert_eq!(r2.callbacks().len(), 1);

    drop(target);
    ctx.run_finalizers();
    assert_eq!(*log.lock(), vec!["r2"]);
}

#[test]
fn callbacks_run_once_and_never_again() {
    let ctx = WeakContext::new();
    let count = Arc::new(AtomicUsize::new(0));
    let target = Obj::new();
    let handle = ctx.create(&Value::from(target.clone()), Some(counting(&count)))
        .unwrap();

    drop(target);
    assert_eq!(ctx.run_finalizers().callbacks_run, 1);
    assert!(ctx.run_finalizers().is_empty());
    assert!(ctx.run_finalizers().is_empty());

    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(handle.is_notified());
    assert!(handle.callbacks().is_empty());
}

#[test]
fn callbacks_added_after_delivery_never_run() {
    let ctx = WeakContext::new();
    let count = Arc::new(AtomicUsize::new(0));
    let target = Obj::new();
    let handle = ctx.weaken(&target);
    drop(target);
    ctx.run_finalizers();

    handle.add_callback(counting(&count));
    ctx.run_finalizers();
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn callbacks_added_between_death_and_delivery_still_run() {
    let ctx = WeakContext::new();
    let count = Arc::new(AtomicUsize::new(0));
    let target = Obj::new();
    let handle = ctx.weaken(&target);
    drop(target);

    assert!(handle.is_dead());
    handle.add_callback(counting(&count));
    ctx.run_finalizers();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn removed_callback_is_not_called() {
    let ctx = WeakContext::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let cb1 = logging(&log, "cb1");
    let cb2 = logging(&log, "cb2");
    let target = Obj::new();
    let handle = ctx.weaken(&target);
    handle.add_callback(cb1.clone());
    handle.add_callback(cb2);
    assert!(handle.remove_callback(&cb1));

    drop(target);
    ctx.run_finalizers();
    assert_eq!(*log.lock(), vec!["cb2"]);
}

#[test]
fn remove_callback_removes_only_the_earliest_duplicate() {
    let ctx = WeakContext::new();
    let count = Arc::new(AtomicUsize::new(0));
    let cb = counting(&count);
    let target = Obj::new();
    let handle = ctx.weaken(&target);
    handle.add_callback(cb.clone());
    handle.add_callback(cb.clone());
    handle.remove_callback(&cb);
    assert_eq!(handle.callbacks(), vec![cb]);

    drop(target);
    ctx.run_finalizers();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn removing_an_unknown_callback_is_a_no_op() {
    let ctx = WeakContext::new();
    let handle = ctx.weaken(&Obj::new());
    assert!(!handle.remove_callback(&Callback::new(|_| {})));
}

#[test]
fn callback_sees_a_dead_reference() {
    let ctx = WeakContext::new();
    let seen = Arc::new(Mutex::new(None));
    let s = seen.clone();
    let target = Obj::from_properties(vec![("secret", 42)]);
    let handle = ctx.weaken(&target);
    handle.add_callback(Callback::new(move |h| {
        use weakref::{ObjectProtocol, PropertyKey};
        *s.lock() = Some((h.is_dead(), h.target_value(), h.get(PropertyKey::from("secret"))));
    }));

    drop(target);
    ctx.run_finalizers();
    assert_eq!(
        *seen.lock(),
        Some((true, Value::Undefined, Value::Undefined))
    );
}

#[test]
fn failing_callbacks_do_not_stop_the_others() {
    let reported = Arc::new(Mutex::new(Vec::new()));
    let r = reported.clone();
    let ctx = WeakContext::with_config(
        Config::new().failure_reporter(move |failure| r.lock().push(failure.clone())),
    );
    let log = Arc::new(Mutex::new(Vec::new()));

    let target = Obj::new();
    let first = ctx.weaken(&target);
    let second = ctx.weaken(&target);
    first.add_callback(Callback::fallible(|_| Err("refused".into())));
    first.add_callback(logging(&log, "after error"));
    first.add_callback(Callback::new(|_| panic!("callback exploded")));
    first.add_callback(logging(&log, "after panic"));
    second.add_callback(logging(&log, "other reference"));

    drop(target);
    let report = ctx.run_finalizers();

    assert_eq!(
        *log.lock(),
        vec!["after error", "after panic", "other reference"]
    );
    assert_eq!(report.callbacks_run, 5);
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[0].handle, first.id());
    assert_eq!(report.failures[0].index, 0);
    assert_eq!(report.failures[0].message, "refused");
    assert_eq!(report.failures[1].index, 2);
    assert_eq!(report.failures[1].message, "callback exploded");
    assert_eq!(*reported.lock(), report.failures);
}

#[test]
fn deaths_caused_by_callbacks_are_delivered_in_the_same_turn() {
    let ctx = WeakContext::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let inner = Obj::new();
    ctx.weaken(&inner).add_callback(logging(&log, "inner"));

    // The outer callback holds the last strong reference to `inner`
    let keep_alive = Mutex::new(Some(inner));
    let outer = Obj::new();
    let l = log.clone();
    ctx.weaken(&outer).add_callback(Callback::new(move |_| {
        l.lock().push("outer");
        keep_alive.lock().take();
    }));

    drop(outer);
    let report = ctx.run_finalizers();
    assert_eq!(report.targets, 2);
    assert_eq!(*log.lock(), vec!["outer", "inner"]);
}
