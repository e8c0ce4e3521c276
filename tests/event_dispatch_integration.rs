//! Integration tests for listener registration and event dispatch.
//!
//! # Usage
//!
//! ```sh
//! cargo test --test event_dispatch_integration
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use bevy_ecs::prelude::*;

use behavior_core::engine::Engine;
use behavior_core::events::{Callback, EventArg};

type Log = Rc<RefCell<Vec<String>>>;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn record(log: &Log, tag: &str) -> Callback {
    let log = Rc::clone(log);
    let tag = tag.to_string();
    Callback::native(move |_, _, _| log.borrow_mut().push(tag.clone()))
}

fn setup() -> (Engine, Entity, Log) {
    init_logging();
    let mut engine = Engine::default();
    let node = engine.spawn_node("target");
    (engine, node, Log::default())
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn priorities_5_1_3_run_as_1_3_5() {
    let (mut engine, node, log) = setup();
    engine.on(node, "ping", record(&log, "5"), false, 5).unwrap();
    engine.on(node, "ping", record(&log, "1"), false, 1).unwrap();
    engine.on(node, "ping", record(&log, "3"), false, 3).unwrap();
    assert!(engine.fire(node, "ping", []).unwrap());
    assert_eq!(*log.borrow(), vec!["1", "3", "5"]);
}

#[test]
fn equal_priorities_keep_registration_order() {
    let (mut engine, node, log) = setup();
    for tag in ["a", "b", "c"] {
        engine.on(node, "ping", record(&log, tag), false, 0).unwrap();
    }
    engine.on(node, "ping", record(&log, "early"), false, -1).unwrap();
    engine.fire(node, "ping", []).unwrap();
    assert_eq!(*log.borrow(), vec!["early", "a", "b", "c"]);
}

#[test]
fn registering_same_callback_twice_is_noop() {
    let (mut engine, node, log) = setup();
    let cb = record(&log, "x");
    assert!(engine.on(node, "ping", cb.clone(), false, 0).unwrap());
    assert!(!engine.on(node, "ping", cb, false, 9).unwrap());
    engine.fire(node, "ping", []).unwrap();
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn on_many_registers_each_name() {
    let (mut engine, node, log) = setup();
    let added = engine
        .on_many(node, &["a", "b"], record(&log, "hit"), false, 0)
        .unwrap();
    assert_eq!(added, 2);
    engine.fire(node, "a", []).unwrap();
    engine.fire(node, "b", []).unwrap();
    assert_eq!(log.borrow().len(), 2);
}

// =============================================================================
// Once and removal
// =============================================================================

#[test]
fn once_listener_fires_exactly_once() {
    let (mut engine, node, log) = setup();
    engine.on(node, "ping", record(&log, "once"), true, 0).unwrap();
    engine.fire(node, "ping", []).unwrap();
    engine.fire(node, "ping", []).unwrap();
    assert_eq!(*log.borrow(), vec!["once"]);
    assert_eq!(engine.listener_count(node, "ping"), 0);
}

#[test]
fn listener_removing_itself_finishes_and_never_runs_again() {
    let (mut engine, node, log) = setup();
    let slot: Rc<RefCell<Option<Callback>>> = Rc::default();
    let slot2 = Rc::clone(&slot);
    let log2 = Rc::clone(&log);
    let cb = Callback::native(move |engine, me, _| {
        log2.borrow_mut().push("before".into());
        if let Some(me_cb) = slot2.borrow().as_ref() {
            assert!(engine.off(me, "ping", Some(me_cb)));
        }
        log2.borrow_mut().push("after".into());
    });
    *slot.borrow_mut() = Some(cb.clone());
    engine.on(node, "ping", cb, false, 0).unwrap();
    engine.on(node, "ping", record(&log, "next"), false, 1).unwrap();

    engine.fire(node, "ping", []).unwrap();
    engine.fire(node, "ping", []).unwrap();
    assert_eq!(*log.borrow(), vec!["before", "after", "next", "next"]);
}

#[test]
fn removing_a_later_listener_prevents_it_running() {
    let (mut engine, node, log) = setup();
    let victim = record(&log, "victim");
    let victim2 = victim.clone();
    engine
        .on(
            node,
            "ping",
            Callback::native(move |engine, me, _| {
                engine.off(me, "ping", Some(&victim2));
            }),
            false,
            0,
        )
        .unwrap();
    engine.on(node, "ping", victim, false, 10).unwrap();
    engine.fire(node, "ping", []).unwrap();
    assert!(log.borrow().is_empty());
    assert_eq!(engine.listener_count(node, "ping"), 1);
}

#[test]
fn listener_added_later_in_order_runs_in_same_pass() {
    let (mut engine, node, log) = setup();
    let late = record(&log, "added");
    let early = record(&log, "added-early");
    engine
        .on(
            node,
            "ping",
            Callback::native(move |engine, me, _| {
                engine.on(me, "ping", late.clone(), false, 10).unwrap();
                engine.on(me, "ping", early.clone(), false, -10).unwrap();
            }),
            false,
            0,
        )
        .unwrap();
    engine.fire(node, "ping", []).unwrap();
    assert_eq!(*log.borrow(), vec!["added"]);
}

#[test]
fn off_without_callback_clears_the_event() {
    let (mut engine, node, log) = setup();
    engine.on(node, "ping", record(&log, "a"), false, 0).unwrap();
    engine.on(node, "ping", record(&log, "b"), false, 0).unwrap();
    engine.on(node, "pong", record(&log, "c"), false, 0).unwrap();
    assert!(engine.off(node, "ping", None));
    assert!(!engine.off(node, "ping", None));
    engine.fire(node, "ping", []).unwrap();
    engine.fire(node, "pong", []).unwrap();
    assert_eq!(*log.borrow(), vec!["c"]);
}

// =============================================================================
// Reentrancy
// =============================================================================

#[test]
fn nested_fire_skips_the_executing_listener() {
    let (mut engine, node, log) = setup();
    let log2 = Rc::clone(&log);
    engine
        .on(
            node,
            "ping",
            Callback::native(move |engine, me, ev| {
                let depth = ev.arg(0).and_then(EventArg::as_number).unwrap_or(0.0);
                log2.borrow_mut().push(format!("outer {depth}"));
                if depth < 1.0 {
                    engine.fire(me, "ping", [EventArg::Number(depth + 1.0)]).unwrap();
                }
            }),
            false,
            0,
        )
        .unwrap();
    engine.on(node, "ping", record(&log, "second"), false, 1).unwrap();
    engine.fire(node, "ping", [EventArg::Number(0.0)]).unwrap();
    assert_eq!(*log.borrow(), vec!["outer 0", "second", "second"]);
}

#[test]
fn destroying_target_mid_dispatch_stops_delivery() {
    let (mut engine, node, log) = setup();
    engine
        .on(
            node,
            "boom",
            Callback::native(|engine, me, _| {
                engine.destroy_node(me).unwrap();
            }),
            false,
            0,
        )
        .unwrap();
    engine.on(node, "boom", record(&log, "after"), false, 1).unwrap();
    engine.fire(node, "boom", []).unwrap();
    assert!(log.borrow().is_empty());
    assert!(!engine.is_alive(node));
}

// =============================================================================
// Tree dispatch
// =============================================================================

fn tree(engine: &mut Engine, log: &Log) -> (Entity, Entity, Entity, Entity) {
    let root = engine.spawn_scene("root");
    let a = engine.spawn_node("a");
    let a1 = engine.spawn_node("a1");
    let b = engine.spawn_node("b");
    engine.add_child(root, a).unwrap();
    engine.add_child(a, a1).unwrap();
    engine.add_child(root, b).unwrap();
    for (node, tag) in [(root, "root"), (a, "a"), (a1, "a1"), (b, "b")] {
        engine.on(node, "visit", record(log, tag), false, 0).unwrap();
    }
    (root, a, a1, b)
}

#[test]
fn tree_dispatch_visits_parent_first() {
    let (mut engine, _, log) = setup();
    let (root, ..) = tree(&mut engine, &log);
    let mut ev = engine.new_event("visit");
    engine.dispatch_tree(root, &mut ev);
    assert_eq!(*log.borrow(), vec!["root", "a", "a1", "b"]);
}

#[test]
fn bubbling_tree_dispatch_visits_children_first() {
    let (mut engine, _, log) = setup();
    let (root, ..) = tree(&mut engine, &log);
    let mut ev = engine.new_event("visit").with_bubbles(true);
    engine.dispatch_tree(root, &mut ev);
    assert_eq!(*log.borrow(), vec!["a1", "a", "b", "root"]);
}

#[test]
fn skip_object_excludes_only_that_node() {
    let (mut engine, _, log) = setup();
    let (root, a, ..) = tree(&mut engine, &log);
    let mut ev = engine.new_event("visit").skipping(a);
    engine.dispatch_tree(root, &mut ev);
    assert_eq!(*log.borrow(), vec!["root", "a1", "b"]);
}

#[test]
fn inactive_subtree_is_skipped() {
    let (mut engine, _, log) = setup();
    let (root, a, ..) = tree(&mut engine, &log);
    engine.set_node_active(a, false).unwrap();
    let mut ev = engine.new_event("visit");
    engine.dispatch_tree(root, &mut ev);
    assert_eq!(*log.borrow(), vec!["root", "b"]);
}

#[test]
fn stopping_halts_tree_dispatch() {
    let (mut engine, _, log) = setup();
    let (root, a, ..) = tree(&mut engine, &log);
    engine
        .on(a, "visit", Callback::native(|_, _, ev| ev.stop()), false, 5)
        .unwrap();
    let mut ev = engine.new_event("visit");
    engine.dispatch_tree(root, &mut ev);
    assert!(ev.is_stopped());
    assert_eq!(*log.borrow(), vec!["root", "a"]);
}

#[test]
fn tick_dispatches_update_then_late_update_with_delta() {
    let (mut engine, _, log) = setup();
    let scene = engine.spawn_scene("s");
    let log2 = Rc::clone(&log);
    engine
        .on_many(
            scene,
            &["update", "lateUpdate"],
            Callback::native(move |_, _, ev| {
                let dt = ev.arg(0).and_then(EventArg::as_number).unwrap_or(-1.0);
                log2.borrow_mut().push(format!("{} {dt}", ev.name()));
            }),
            false,
            0,
        )
        .unwrap();
    engine.tick(0.125);
    assert_eq!(*log.borrow(), vec!["update 0.125", "lateUpdate 0.125"]);
}
