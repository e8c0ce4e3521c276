//! Listener registration and event dispatch.
//!
//! Delivery to one entity runs, in order: the behavior implementation (when
//! the entity is a behavior that handles the event), the entity's
//! same-named handler, then its listeners by priority. Any step may stop the
//! event. Registry borrows are never held across a callback, so callbacks
//! can register, remove and fire freely.

use std::rc::Rc;

use bevy_ecs::entity::Entity;
use log::{debug, trace, warn};

use super::{Engine, LateEvent};
use crate::behavior::BehaviorEvents;
use crate::components::behaviors::BehaviorState;
use crate::error::{EngineError, EngineResult};
use crate::events::{Callback, Event, EventArg, EventName};

impl Engine {
    /// A new event registered on the active-event stack.
    pub fn new_event(&self, name: &str) -> Event {
        Event::new(name).tracked_by(&self.event_stack)
    }

    /// Names of the events currently being dispatched, innermost last.
    pub fn active_events(&self) -> Vec<EventName> {
        self.event_stack.snapshot()
    }

    /// Register `callback` for `name` on `target`. Returns `false` if the same
    /// callback was already registered there.
    pub fn on(
        &mut self,
        target: Entity,
        name: &str,
        callback: Callback,
        once: bool,
        priority: i32,
    ) -> EngineResult<bool> {
        if name.is_empty() {
            warn!("on: empty event name");
            return Err(EngineError::usage("on: empty event name"));
        }
        self.ensure_alive(target)?;
        let registry = Rc::clone(self.listeners.entry(target).or_default());
        let added = registry.borrow_mut().add(name, callback, once, priority);
        Ok(added)
    }

    /// Register one callback for several event names; returns how many
    /// registrations were new.
    pub fn on_many(
        &mut self,
        target: Entity,
        names: &[&str],
        callback: Callback,
        once: bool,
        priority: i32,
    ) -> EngineResult<usize> {
        let mut added = 0;
        for name in names {
            if self.on(target, name, callback.clone(), once, priority)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Remove `callback` (or every callback if `None`) from `name` on `target`.
    pub fn off(&mut self, target: Entity, name: &str, callback: Option<&Callback>) -> bool {
        let Some(registry) = self.listeners.get(&target).cloned() else {
            return false;
        };
        let removed = registry.borrow_mut().remove(name, callback);
        removed
    }

    pub fn listener_count(&self, target: Entity, name: &str) -> usize {
        self.listeners
            .get(&target)
            .map_or(0, |r| r.borrow().listener_count(name))
    }

    /// Opt `target` into a same-named handler for `name`, run before its
    /// listeners. `None` clears it.
    pub fn set_handler(&mut self, target: Entity, name: &str, callback: Option<Callback>) -> EngineResult<()> {
        if name.is_empty() {
            warn!("set_handler: empty event name");
            return Err(EngineError::usage("set_handler: empty event name"));
        }
        self.ensure_alive(target)?;
        match callback {
            Some(cb) => {
                self.handlers.entry(target).or_default().insert(EventName::from(name), cb);
            }
            None => {
                if let Some(map) = self.handlers.get_mut(&target) {
                    map.remove(name);
                    if map.is_empty() {
                        self.handlers.remove(&target);
                    }
                }
            }
        }
        Ok(())
    }

    /// Fire `name` on `target` synchronously. Returns `false` if a handler
    /// stopped the event.
    pub fn fire(
        &mut self,
        target: Entity,
        name: &str,
        args: impl IntoIterator<Item = EventArg>,
    ) -> EngineResult<bool> {
        if name.is_empty() {
            warn!("fire: empty event name");
            return Err(EngineError::usage("fire: empty event name"));
        }
        self.ensure_alive(target)?;
        let mut event = Event::new(name).with_args(args).tracked_by(&self.event_stack);
        self.fire_event(target, &mut event)
    }

    /// Fire a prebuilt event on `target`.
    pub fn fire_event(&mut self, target: Entity, event: &mut Event) -> EngineResult<bool> {
        if event.name().is_empty() {
            warn!("fire: empty event name");
            return Err(EngineError::usage("fire: empty event name"));
        }
        self.ensure_alive(target)?;
        if self.config().trace_events {
            trace!("fire '{}' on {} ({} args)", event.name(), target, event.args().len());
        }
        self.deliver(target, event, true);
        Ok(!event.is_stopped())
    }

    /// Queue `name` for the late phase instead of dispatching now.
    pub fn fire_late(
        &mut self,
        target: Entity,
        name: &str,
        args: impl IntoIterator<Item = EventArg>,
    ) -> EngineResult<()> {
        if name.is_empty() {
            warn!("fire_late: empty event name");
            return Err(EngineError::usage("fire_late: empty event name"));
        }
        self.ensure_alive(target)?;
        self.late_events.push_back(LateEvent {
            target,
            name: EventName::from(name),
            args: args.into_iter().collect(),
        });
        Ok(())
    }

    pub fn pending_late_events(&self) -> usize {
        self.late_events.len()
    }

    /// Dispatch the late events queued before this call. Events queued while
    /// draining wait for the next drain; events whose target died are
    /// dropped. Returns how many were dispatched.
    pub fn drain_late_events(&mut self) -> usize {
        let pending = self.late_events.len();
        let mut fired = 0;
        for _ in 0..pending {
            let Some(late) = self.late_events.pop_front() else {
                break;
            };
            if !self.is_alive(late.target) {
                debug!("dropping late event '{}' for dead entity {}", late.name, late.target);
                continue;
            }
            let mut event = Event::new(late.name)
                .with_args(late.args)
                .tracked_by(&self.event_stack);
            self.deliver(late.target, &mut event, true);
            fired += 1;
        }
        fired
    }

    /// Dispatch `event` through the subtree rooted at `root`.
    ///
    /// Nodes are visited parent first, or children first when the event
    /// bubbles. Inactive subtrees are skipped, as is the event's
    /// `skip_object` node (its children are still visited). At each node the
    /// active behaviors handling the event run first, then the node's handler
    /// and listeners. Stops as soon as the event is stopped.
    pub fn dispatch_tree(&mut self, root: Entity, event: &mut Event) {
        if !self.node_active(root) {
            return;
        }
        self.dispatch_subtree(root, event);
    }

    fn dispatch_subtree(&mut self, node: Entity, event: &mut Event) {
        if !self.is_alive(node) || !self.own_active(node) {
            return;
        }
        let skipped = event.skip_object() == Some(node);
        let children = self.children_of(node);

        if !event.bubbles() && !skipped {
            self.deliver_to_node(node, event);
            if event.is_stopped() {
                return;
            }
        }
        for child in children {
            self.dispatch_subtree(child, event);
            if event.is_stopped() {
                return;
            }
        }
        if event.bubbles() && !skipped {
            self.deliver_to_node(node, event);
        }
    }

    fn deliver_to_node(&mut self, node: Entity, event: &mut Event) {
        let flag = BehaviorEvents::from_name(event.name());
        for behavior in self.behaviors_of(node) {
            let runs = self
                .world
                .get::<BehaviorState>(behavior)
                .is_some_and(|s| s.active && s.handles.intersects(flag));
            if !runs {
                continue;
            }
            self.run_behavior_impl(behavior, event);
            if event.is_stopped() {
                return;
            }
        }
        if self.is_alive(node) {
            self.deliver(node, event, false);
        }
    }

    /// Deliver to a single entity: implementation hook, handler, listeners.
    pub(crate) fn deliver(&mut self, target: Entity, event: &mut Event, run_impl: bool) {
        if run_impl && self.world.get::<BehaviorState>(target).is_some() {
            self.run_behavior_impl(target, event);
            if event.is_stopped() {
                return;
            }
        }

        let handler = self
            .handlers
            .get(&target)
            .and_then(|map| map.get(event.name()))
            .cloned();
        if let Some(handler) = handler {
            self.invoke(&handler, target, event);
            if event.is_stopped() || !self.is_alive(target) {
                return;
            }
        }

        self.dispatch_listeners(target, event);
    }

    fn dispatch_listeners(&mut self, target: Entity, event: &mut Event) {
        let Some(registry) = self.listeners.get(&target).cloned() else {
            return;
        };
        let name = event.name_rc();

        registry.borrow_mut().begin_dispatch();
        let mut cursor = None;
        loop {
            let next = registry.borrow_mut().next_listener(&name, cursor);
            let Some((id, callback)) = next else {
                break;
            };
            self.invoke(&callback, target, event);
            registry.borrow_mut().finish_listener(&name, id);
            cursor = Some(id);
            if event.is_stopped() || !self.is_alive(target) {
                break;
            }
        }
        registry.borrow_mut().end_dispatch();
    }

    /// Run one callback on behalf of `target`.
    pub(crate) fn invoke(&mut self, callback: &Callback, target: Entity, event: &mut Event) {
        match callback {
            Callback::Native(f) => (**f)(self, target, event),
            #[cfg(feature = "lua")]
            Callback::Lua(func) => self.invoke_lua(func, target, event),
        }
    }
}
