//! Integration tests for async and debounced calls driven through the engine.

use std::cell::RefCell;
use std::rc::Rc;

use bevy_ecs::prelude::*;

use behavior_core::engine::Engine;
use behavior_core::events::{Callback, EventArg};

type Log = Rc<RefCell<Vec<String>>>;

fn setup() -> (Engine, Entity, Log) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut engine = Engine::default();
    let node = engine.spawn_node("owner");
    (engine, node, Log::default())
}

fn record(log: &Log, tag: &str) -> Callback {
    let log = Rc::clone(log);
    let tag = tag.to_string();
    Callback::native(move |_, _, _| log.borrow_mut().push(tag.clone()))
}

// =============================================================================
// Debounce
// =============================================================================

#[test]
fn debounce_three_times_fires_latest_once() {
    let (mut engine, node, log) = setup();
    engine.debounce(node, "k", record(&log, "first"), Some(1.0), false).unwrap();
    engine.advance_scheduled(0.5, 0.5);
    engine.debounce(node, "k", record(&log, "second"), Some(1.0), false).unwrap();
    engine.advance_scheduled(0.5, 0.5);
    engine.debounce(node, "k", record(&log, "third"), Some(1.0), false).unwrap();

    engine.advance_scheduled(0.5, 0.5);
    assert!(log.borrow().is_empty());
    engine.advance_scheduled(0.5, 0.5);
    assert_eq!(*log.borrow(), vec!["third"]);

    engine.advance_scheduled(5.0, 5.0);
    assert_eq!(log.borrow().len(), 1);
    assert!(!engine.has_debouncer(node, "k"));
}

#[test]
fn debounce_without_delay_rearms_to_original_delay() {
    let (mut engine, node, log) = setup();
    engine.debounce(node, "k", record(&log, "a"), Some(1.0), false).unwrap();
    engine.advance_scheduled(0.75, 0.75);
    engine.debounce(node, "k", record(&log, "b"), None, false).unwrap();
    engine.advance_scheduled(0.75, 0.75);
    assert!(log.borrow().is_empty());
    engine.advance_scheduled(0.25, 0.25);
    assert_eq!(*log.borrow(), vec!["b"]);
}

#[test]
fn debounce_event_carries_key() {
    let (mut engine, node, _) = setup();
    let seen: Rc<RefCell<Option<String>>> = Rc::default();
    let seen2 = Rc::clone(&seen);
    engine
        .debounce(
            node,
            "save",
            Callback::native(move |_, _, ev| {
                *seen2.borrow_mut() = ev.arg(1).and_then(EventArg::as_str).map(str::to_string);
            }),
            Some(0.1),
            false,
        )
        .unwrap();
    engine.advance_scheduled(0.2, 0.2);
    assert_eq!(seen.borrow().as_deref(), Some("save"));
}

#[test]
fn cancel_debouncer_by_key_and_all() {
    let (mut engine, node, log) = setup();
    engine.debounce(node, "a", record(&log, "a"), Some(0.1), false).unwrap();
    engine.debounce(node, "b", record(&log, "b"), Some(0.1), false).unwrap();
    engine.debounce(node, "c", record(&log, "c"), Some(0.1), false).unwrap();
    assert!(engine.cancel_debouncer(node, Some("a")));
    assert!(!engine.cancel_debouncer(node, Some("a")));
    engine.advance_scheduled(0.2, 0.2);
    assert_eq!(*log.borrow(), vec!["b", "c"]);

    engine.debounce(node, "d", record(&log, "d"), Some(0.1), false).unwrap();
    assert!(engine.cancel_debouncer(node, None));
    engine.advance_scheduled(0.2, 0.2);
    assert_eq!(log.borrow().len(), 2);
}

// =============================================================================
// Async
// =============================================================================

#[test]
fn cancel_async_before_expiry_never_fires() {
    let (mut engine, node, log) = setup();
    let id = engine.add_async(node, record(&log, "x"), 1.0, false).unwrap();
    engine.advance_scheduled(0.5, 0.5);
    assert!(engine.cancel_async(node, Some(id)));
    engine.advance_scheduled(1.0, 1.0);
    assert!(log.borrow().is_empty());
    assert!(!engine.cancel_async(node, Some(id)));
}

#[test]
fn cancel_async_without_id_cancels_all() {
    let (mut engine, node, log) = setup();
    let other = engine.spawn_node("other");
    engine.add_async(node, record(&log, "a"), 0.5, false).unwrap();
    engine.add_async(node, record(&log, "b"), 0.7, false).unwrap();
    engine.add_async(other, record(&log, "other"), 0.5, false).unwrap();
    assert!(engine.cancel_async(node, None));
    assert_eq!(engine.pending_asyncs(node), 0);
    engine.advance_scheduled(1.0, 1.0);
    assert_eq!(*log.borrow(), vec!["other"]);
}

#[test]
fn asyncs_of_one_owner_run_in_insertion_order() {
    let (mut engine, node, log) = setup();
    for tag in ["1", "2", "3"] {
        engine.add_async(node, record(&log, tag), 0.25, false).unwrap();
    }
    engine.advance_scheduled(0.25, 0.25);
    assert_eq!(*log.borrow(), vec!["1", "2", "3"]);
}

#[test]
fn async_created_during_advance_waits_for_next_tick() {
    let (mut engine, node, log) = setup();
    let log2 = Rc::clone(&log);
    let follow_up = record(&log, "follow-up");
    engine
        .add_async(
            node,
            Callback::native(move |engine, me, _| {
                log2.borrow_mut().push("first".into());
                engine.add_async(me, follow_up.clone(), 0.0, false).unwrap();
            }),
            0.1,
            false,
        )
        .unwrap();
    engine.advance_scheduled(0.1, 0.1);
    assert_eq!(*log.borrow(), vec!["first"]);
    engine.advance_scheduled(0.0, 0.0);
    assert_eq!(*log.borrow(), vec!["first", "follow-up"]);
}

#[test]
fn unscaled_calls_use_the_unscaled_clock() {
    let (mut engine, node, log) = setup();
    engine.set_time_scale(0.5);
    engine.add_async(node, record(&log, "scaled"), 0.2, false).unwrap();
    engine.add_async(node, record(&log, "unscaled"), 0.2, true).unwrap();
    engine.tick(0.2);
    assert_eq!(*log.borrow(), vec!["unscaled"]);
    engine.tick(0.2);
    assert_eq!(*log.borrow(), vec!["unscaled", "scaled"]);
}

#[test]
fn destroying_owner_cancels_everything() {
    let (mut engine, node, log) = setup();
    engine.add_async(node, record(&log, "async"), 0.1, false).unwrap();
    engine.debounce(node, "k", record(&log, "debounce"), Some(0.1), false).unwrap();
    engine.destroy_node(node).unwrap();
    assert!(engine.scheduler().is_empty());
    engine.advance_scheduled(1.0, 1.0);
    assert!(log.borrow().is_empty());
}

#[test]
fn scheduling_on_dead_owner_is_rejected() {
    let (mut engine, node, log) = setup();
    engine.destroy_node(node).unwrap();
    assert!(engine.add_async(node, record(&log, "x"), 0.1, false).is_err());
    assert!(engine.debounce(node, "k", record(&log, "x"), None, false).is_err());
}
