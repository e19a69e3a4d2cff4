//! Integration Tests for Reactive System
//!
//! These tests verify that signals, memos, and effects work together correctly.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;
use weft_core::reactive::{ReactiveContext, Runtime};
use weft_core::{create_signal, reactive, Effect, Memo, ReactiveError, Signal};

/// Effects see every write, including ones made through an updater.
#[test]
fn effect_logs_every_write() {
    let signal = Signal::new(0);
    let log = Arc::new(Mutex::new(Vec::new()));

    let (s, l) = (signal.clone(), log.clone());
    let _effect = Effect::new(move || {
        l.lock().unwrap().push(s.get());
    })
    .unwrap();

    signal.set(1).unwrap();
    signal.update(|v| v + 1).unwrap();

    assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
}

/// An effect runs once at creation and again only when its sources change.
#[test]
fn effect_ignores_unrelated_signals() {
    let a = Signal::new(1);
    let b = Signal::new(1);
    let runs = Arc::new(AtomicI32::new(0));

    let (a_clone, r) = (a.clone(), runs.clone());
    let effect = Effect::new(move || {
        a_clone.get();
        r.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 1);

    b.set(2).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    a.set(2).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(effect.run_count(), 2);
}

/// An effect reading many signals runs once per write to any of them.
#[test]
fn effect_reading_many_signals_runs_once_per_write() {
    let signals: Vec<Signal<i32>> = (0..8).map(Signal::new).collect();
    let total = Arc::new(AtomicI32::new(0));
    let runs = Arc::new(AtomicI32::new(0));

    let (sources, t, r) = (signals.clone(), total.clone(), runs.clone());
    let _effect = Effect::new(move || {
        let sum: i32 = sources.iter().map(Signal::get).sum();
        t.store(sum, Ordering::SeqCst);
        r.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    for signal in &signals {
        signal.update(|v| v + 10).unwrap();
    }

    assert_eq!(runs.load(Ordering::SeqCst), 1 + signals.len() as i32);
    assert_eq!(total.load(Ordering::SeqCst), 28 + 80);
}

/// A memo over two signals recomputes once per observed change.
#[test]
fn memo_over_two_signals() {
    let a = Signal::new(2);
    let b = Signal::new(3);
    let computes = Arc::new(AtomicI32::new(0));

    let (a_clone, b_clone, c) = (a.clone(), b.clone(), computes.clone());
    let product = Memo::new(move || {
        c.fetch_add(1, Ordering::SeqCst);
        a_clone.get() * b_clone.get()
    });

    let seen = Arc::new(Mutex::new(Vec::new()));
    let (p, s) = (product.clone(), seen.clone());
    let _effect = Effect::new(move || {
        s.lock().unwrap().push(p.get());
    })
    .unwrap();

    a.set(4).unwrap();
    b.set(5).unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![6, 12, 20]);
    assert_eq!(computes.load(Ordering::SeqCst), 3);

    // Cached between writes
    assert_eq!(product.get(), 20);
    assert_eq!(computes.load(Ordering::SeqCst), 3);
}

/// Memos chained on memos stay consistent without manual invalidation.
#[test]
fn memo_depends_on_memo() {
    let base = Signal::new(5);

    let b = base.clone();
    let doubled = Memo::new(move || b.get() * 2);

    let d = doubled.clone();
    let plus_ten = Memo::new(move || d.get() + 10);

    assert_eq!(doubled.get(), 10);
    assert_eq!(plus_ten.get(), 20);

    base.set(10).unwrap();

    assert_eq!(doubled.get(), 20);
    assert_eq!(plus_ten.get(), 30);
}

/// Writing the same value to a signal still notifies; writing the same value
/// to an object property does not.
#[test]
fn same_value_writes_differ_between_signals_and_objects() {
    let signal = Signal::new(7);
    let object = reactive(json!({ "n": 7 })).unwrap();
    let signal_runs = Arc::new(AtomicI32::new(0));
    let object_runs = Arc::new(AtomicI32::new(0));

    let (s, r) = (signal.clone(), signal_runs.clone());
    let _signal_effect = Effect::new(move || {
        s.get();
        r.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    let (o, r) = (object.clone(), object_runs.clone());
    let _object_effect = Effect::new(move || {
        o.get("n");
        r.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    signal.set(7).unwrap();
    object.set("n", 7).unwrap();

    assert_eq!(signal_runs.load(Ordering::SeqCst), 2);
    assert_eq!(object_runs.load(Ordering::SeqCst), 1);

    // The comparing variant behaves like the object
    assert!(!signal.set_if_changed(7).unwrap());
    assert_eq!(signal_runs.load(Ordering::SeqCst), 2);
}

/// A text binding stays in sync with its source.
#[test]
fn text_binding_follows_signal() {
    let (name, set_name) = create_signal(String::from("world"));
    let text = Arc::new(Mutex::new(String::new()));

    let t = text.clone();
    let _binding = Effect::new(move || {
        *t.lock().unwrap() = format!("Hello, {}!", name.get());
    })
    .unwrap();

    assert_eq!(*text.lock().unwrap(), "Hello, world!");

    set_name.set(String::from("weft")).unwrap();
    assert_eq!(*text.lock().unwrap(), "Hello, weft!");
}

/// Nested effects track their own reads; the outer effect is unaffected by
/// what only the inner one read.
#[test]
fn nested_effects_track_separately() {
    let outer_source = Signal::new(0);
    let inner_source = Signal::new(0);
    let outer_runs = Arc::new(AtomicI32::new(0));
    let inner_runs = Arc::new(AtomicI32::new(0));

    let (os, is, or, ir) = (
        outer_source.clone(),
        inner_source.clone(),
        outer_runs.clone(),
        inner_runs.clone(),
    );
    let outer = Effect::new(move || {
        os.get();
        or.fetch_add(1, Ordering::SeqCst);

        let (is, ir) = (is.clone(), ir.clone());
        Effect::new(move || {
            is.get();
            ir.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        // Back in the outer context after the inner effect ran
        assert!(Runtime::is_tracking());
    })
    .unwrap();

    assert_eq!(outer.child_count(), 1);
    assert_eq!(outer.dependency_count(), 1);

    inner_source.set(1).unwrap();
    assert_eq!(outer_runs.load(Ordering::SeqCst), 1);
    assert_eq!(inner_runs.load(Ordering::SeqCst), 2);

    // Re-running the outer effect replaces its child instead of stacking
    outer_source.set(1).unwrap();
    assert_eq!(outer.child_count(), 1);
    assert_eq!(inner_source.subscriber_count(), 1);

    inner_source.set(2).unwrap();
    assert_eq!(inner_runs.load(Ordering::SeqCst), 4);
}

/// Reads inside an untracked section do not subscribe.
#[test]
fn untracked_reads_do_not_subscribe() {
    let tracked = Signal::new(0);
    let untracked = Signal::new(0);
    let runs = Arc::new(AtomicI32::new(0));

    let (t, u, r) = (tracked.clone(), untracked.clone(), runs.clone());
    let _effect = Effect::new(move || {
        t.get();
        Runtime::untrack(|| u.get());
        r.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    untracked.set(1).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(untracked.subscriber_count(), 0);

    tracked.set(1).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// Outside any effect or memo there is no context and reads are plain reads.
#[test]
fn reads_outside_a_context_are_plain() {
    assert!(!ReactiveContext::is_active());
    assert_eq!(ReactiveContext::depth(), 0);

    let signal = Signal::new(3);
    assert_eq!(signal.get(), 3);
    assert_eq!(signal.subscriber_count(), 0);
}

/// Effect disposal stops execution.
#[test]
fn disposed_effect_does_not_run() {
    let signal = Signal::new(0);
    let runs = Arc::new(AtomicI32::new(0));

    let (s, r) = (signal.clone(), runs.clone());
    let effect = Effect::new(move || {
        s.get();
        r.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    effect.dispose();
    signal.set(1).unwrap();
    signal.set(2).unwrap();
    effect.execute().unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(signal.subscriber_count(), 0);
}

/// A failing effect reports its error to the writer that triggered it.
#[test]
fn effect_errors_surface_at_the_write() {
    let signal = Signal::new(0);

    let s = signal.clone();
    let _effect = Effect::try_new(move || {
        if s.get() > 1 {
            return Err("too large");
        }
        Ok(())
    })
    .unwrap();

    assert!(signal.set(1).is_ok());
    assert!(signal.set(2).is_err());
}

/// Effects on one signal run in the order they subscribed.
#[test]
fn effects_run_in_subscription_order() {
    let signal = Signal::new(0);
    let order = Arc::new(Mutex::new(Vec::new()));

    let _effects: Vec<Effect> = (0..4)
        .map(|tag| {
            let (s, o) = (signal.clone(), order.clone());
            Effect::new(move || {
                s.get();
                o.lock().unwrap().push(tag);
            })
            .unwrap()
        })
        .collect();

    order.lock().unwrap().clear();
    signal.set(1).unwrap();
    signal.set(2).unwrap();

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 0, 1, 2, 3]);
}

/// With the default policy every subscriber runs and all failures come back
/// together from the write.
#[test]
fn failures_from_several_effects_are_grouped() {
    let signal = Signal::new(0);
    let healthy_runs = Arc::new(AtomicI32::new(0));

    let failing = |name: &'static str| {
        let s = signal.clone();
        Effect::try_new(move || {
            if s.get() > 0 {
                return Err(format!("{name} failed"));
            }
            Ok(())
        })
        .unwrap()
    };

    let first = failing("first");
    let (s, r) = (signal.clone(), healthy_runs.clone());
    let _healthy = Effect::new(move || {
        s.get();
        r.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    let second = failing("second");

    let err = signal.set(1).unwrap_err();
    assert_eq!(healthy_runs.load(Ordering::SeqCst), 2);

    match err {
        ReactiveError::Multiple(errors) => {
            let failed: Vec<_> = errors
                .iter()
                .map(|err| match err {
                    ReactiveError::Effect { subscriber, .. } => *subscriber,
                    other => panic!("unexpected error: {other}"),
                })
                .collect();
            assert_eq!(failed, vec![first.id(), second.id()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}
