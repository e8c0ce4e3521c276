//! Async and debounced calls, and the physics sync passes.

use bevy_ecs::prelude::*;
use log::{debug, warn};

use super::Engine;
use crate::behavior::BehaviorCategory;
use crate::components::behaviors::BehaviorState;
use crate::components::transform::TransformDirty;
use crate::error::{EngineError, EngineResult};
use crate::events::{Callback, Event, EventArg, names};
use crate::resources::scheduler::{DueCall, ScheduledCallEngine};

impl Engine {
    pub fn scheduler(&self) -> &ScheduledCallEngine {
        &self.scheduler
    }

    /// Call `callback` on `owner` once, `delay` seconds from now. Returns the
    /// call's id for [`Engine::cancel_async`].
    pub fn add_async(&mut self, owner: Entity, callback: Callback, delay: f32, unscaled: bool) -> EngineResult<u64> {
        self.ensure_alive(owner)?;
        Ok(self.scheduler.add_async(owner, callback, delay, unscaled))
    }

    /// Cancel one async call of `owner`, or all of them when `index` is `None`.
    pub fn cancel_async(&mut self, owner: Entity, index: Option<u64>) -> bool {
        self.scheduler.cancel_async(owner, index)
    }

    /// Create or re-arm the debounced call `key` on `owner`.
    pub fn debounce(
        &mut self,
        owner: Entity,
        key: &str,
        callback: Callback,
        delay: Option<f32>,
        unscaled: bool,
    ) -> EngineResult<()> {
        if key.is_empty() {
            warn!("debounce: empty key");
            return Err(EngineError::usage("debounce: empty key"));
        }
        self.ensure_alive(owner)?;
        self.scheduler.add_debouncer(owner, key, callback, delay, unscaled);
        Ok(())
    }

    pub fn cancel_debouncer(&mut self, owner: Entity, key: Option<&str>) -> bool {
        self.scheduler.cancel_debouncer(owner, key)
    }

    pub fn pending_asyncs(&self, owner: Entity) -> usize {
        self.scheduler.pending_asyncs(owner)
    }

    pub fn has_debouncer(&self, owner: Entity, key: &str) -> bool {
        self.scheduler.has_debouncer(owner, key)
    }

    /// Count down every scheduled call and invoke those that came due, in
    /// index order. Returns how many ran.
    pub fn advance_scheduled(&mut self, dt: f32, unscaled_dt: f32) -> usize {
        let due = self.scheduler.collect_due(dt, unscaled_dt);
        let mut ran = 0;
        for entry in &due {
            let Some(call) = self.scheduler.take_if_due(entry) else {
                continue;
            };
            if !self.is_alive(call.target) {
                debug!("dropping scheduled call {} for dead entity {}", call.index, call.target);
                continue;
            }
            let mut event = match entry {
                DueCall::Async { index, .. } => Event::new(names::ASYNC).with_arg(EventArg::Int(*index as i64)),
                DueCall::Debounce { key, index, .. } => Event::new(names::DEBOUNCE)
                    .with_arg(EventArg::Int(*index as i64))
                    .with_arg(key.as_str()),
            }
            .tracked_by(&self.event_stack);
            self.invoke(&call.callback, call.target, &mut event);
            ran += 1;
        }
        self.scheduler.prune();
        ran
    }

    fn attached_bodies(&mut self) -> Vec<Entity> {
        let mut bodies: Vec<Entity> = self
            .world
            .query::<(Entity, &BehaviorState)>()
            .iter(&self.world)
            .filter(|(_, s)| s.owner.is_some() && s.categories.contains(BehaviorCategory::BODY))
            .map(|(e, _)| e)
            .collect();
        bodies.sort();
        bodies
    }

    fn run_physics_pass(&mut self, name: &str) {
        for body in self.attached_bodies() {
            if !self.is_behavior(body) {
                continue;
            }
            let mut event = Event::new(name).tracked_by(&self.event_stack);
            self.run_behavior_impl(body, &mut event);
        }
    }

    /// Push dirty node transforms into their bodies, then clear every dirty
    /// mark. Call before stepping the physics world.
    pub fn sync_bodies_pre_step(&mut self) {
        self.run_physics_pass(names::PRE_PHYSICS);
        let dirty: Vec<Entity> = self
            .world
            .query_filtered::<Entity, With<TransformDirty>>()
            .iter(&self.world)
            .collect();
        for node in dirty {
            self.world.entity_mut(node).remove::<TransformDirty>();
        }
    }

    /// Pull simulated transforms back into the nodes. Call after stepping the
    /// physics world.
    pub fn sync_bodies_post_step(&mut self) {
        self.run_physics_pass(names::POST_PHYSICS);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn test_async_fires_once_after_delay() {
        let mut engine = Engine::default();
        let node = engine.spawn_node("n");
        let hits = Rc::new(RefCell::new(Vec::new()));
        let hits2 = Rc::clone(&hits);
        let id = engine
            .add_async(
                node,
                Callback::native(move |_, _, ev| {
                    hits2.borrow_mut().push(ev.arg(0).and_then(EventArg::as_number));
                }),
                0.5,
                false,
            )
            .unwrap();
        assert_eq!(engine.advance_scheduled(0.25, 0.25), 0);
        assert_eq!(engine.advance_scheduled(0.25, 0.25), 1);
        assert_eq!(engine.advance_scheduled(0.25, 0.25), 0);
        assert_eq!(*hits.borrow(), vec![Some(id as f64)]);
    }

    #[test]
    fn test_unscaled_async_ignores_time_scale() {
        let mut engine = Engine::default();
        let node = engine.spawn_node("n");
        let hits = Rc::new(RefCell::new(0));
        let hits2 = Rc::clone(&hits);
        engine
            .add_async(node, Callback::native(move |_, _, _| *hits2.borrow_mut() += 1), 0.1, true)
            .unwrap();
        engine.set_time_scale(0.0);
        engine.tick(0.2);
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn test_cancelled_mid_pass_does_not_fire() {
        let mut engine = Engine::default();
        let node = engine.spawn_node("n");
        let hits = Rc::new(RefCell::new(Vec::new()));
        let second = Rc::new(RefCell::new(0u64));

        let second2 = Rc::clone(&second);
        let hits_a = Rc::clone(&hits);
        engine
            .add_async(
                node,
                Callback::native(move |engine, me, _| {
                    hits_a.borrow_mut().push("first");
                    let id = *second2.borrow();
                    engine.cancel_async(me, Some(id));
                }),
                0.1,
                false,
            )
            .unwrap();
        let hits_b = Rc::clone(&hits);
        let id = engine
            .add_async(node, Callback::native(move |_, _, _| hits_b.borrow_mut().push("second")), 0.1, false)
            .unwrap();
        *second.borrow_mut() = id;

        engine.advance_scheduled(0.2, 0.2);
        assert_eq!(*hits.borrow(), vec!["first"]);
    }

    #[test]
    fn test_debounce_empty_key_is_usage_error() {
        let mut engine = Engine::default();
        let node = engine.spawn_node("n");
        let err = engine.debounce(node, "", Callback::native(|_, _, _| {}), None, false);
        assert!(matches!(err, Err(EngineError::Usage(_))));
    }
}
