//! Behavior creation and the attach/detach state machine.
//!
//! States are `Unattached` (`BehaviorState::owner == None`) and `Attached`.
//! Attaching to a new owner while attached elsewhere detaches first, so the
//! behavior sees `detached` (old owner) and then `attached` (new owner).
//! Refusals are checked before anything is mutated.

use bevy_ecs::entity::Entity;
use log::{debug, warn};

use super::Engine;
use crate::behavior::{Behavior, BehaviorCategory, BehaviorEvents};
use crate::components::behaviors::{AttachedBehaviors, BehaviorState};
use crate::components::node::Node;
use crate::error::{EngineError, EngineResult};
use crate::events::{Event, EventArg, names};

impl Engine {
    pub fn create_behavior<B: Behavior>(&mut self, behavior: B) -> Entity {
        self.create_behavior_boxed(Box::new(behavior))
    }

    pub fn create_behavior_boxed(&mut self, behavior: Box<dyn Behavior>) -> Entity {
        let state = BehaviorState::new(behavior.type_name(), behavior.categories(), behavior.handles());
        let entity = self.world.spawn(state).id();
        debug!("created behavior {} ({})", entity, behavior.type_name());
        self.behavior_impls.insert(entity, behavior);
        entity
    }

    pub fn is_behavior(&self, entity: Entity) -> bool {
        self.world.get::<BehaviorState>(entity).is_some()
    }

    fn ensure_behavior(&self, behavior: Entity) -> EngineResult<()> {
        self.ensure_alive(behavior)?;
        if self.is_behavior(behavior) {
            Ok(())
        } else {
            warn!("entity {} is not a behavior", behavior);
            Err(EngineError::usage(format!("entity {behavior} is not a behavior")))
        }
    }

    /// Attach `behavior` to `owner` at `position` in its behavior list
    /// (appended if `None`). Attaching to the current owner is a no-op.
    ///
    /// When moving from another owner, `detached` listeners run before the
    /// new binding is made. If one of them destroys the new owner the attach
    /// fails with [`EngineError::StaleEntity`]; if one binds the behavior
    /// elsewhere, that binding stands and the attach returns `Ok`.
    pub fn attach(&mut self, behavior: Entity, owner: Entity, position: Option<usize>) -> EngineResult<()> {
        self.ensure_behavior(behavior)?;
        self.ensure_alive(owner)?;
        if self.world.get::<Node>(owner).is_none() {
            warn!("attach: owner {} is not a node", owner);
            return Err(EngineError::usage(format!("attach: owner {owner} is not a node")));
        }

        let (current, type_name) = match self.world.get::<BehaviorState>(behavior) {
            Some(state) => (state.owner, state.type_name),
            None => return Err(EngineError::StaleEntity(behavior)),
        };
        if current == Some(owner) {
            return Ok(());
        }

        let Some(imp) = self.behavior_impls.get(&behavior) else {
            warn!("attach: behavior {} is executing", behavior);
            return Err(EngineError::usage(format!("attach: behavior {behavior} is executing")));
        };
        if let Err(reason) = imp.can_attach(self, behavior, owner) {
            warn!("behavior '{}' refused owner {}: {}", type_name, owner, reason);
            return Err(EngineError::StructuralRefusal {
                behavior: type_name,
                owner,
                reason,
            });
        }

        if current.is_some() {
            self.detach(behavior)?;
            // `detached` listeners may have destroyed either side or bound
            // the behavior somewhere else.
            if !self.is_behavior(behavior) {
                warn!("attach: behavior {} was destroyed while detaching", behavior);
                return Err(EngineError::StaleEntity(behavior));
            }
            if self.world.get::<Node>(owner).is_none() {
                warn!("attach: owner {} was destroyed while detaching {}", owner, behavior);
                return Err(EngineError::StaleEntity(owner));
            }
            if let Some(rebound) = self.behavior_owner(behavior) {
                debug!("attach: behavior {} was rebound to {} while detaching", behavior, rebound);
                return Ok(());
            }
        }

        let Ok(mut owner_ref) = self.world.get_entity_mut(owner) else {
            return Err(EngineError::StaleEntity(owner));
        };
        match owner_ref.get_mut::<AttachedBehaviors>() {
            Some(mut list) => {
                let position = position.unwrap_or(list.len());
                list.insert(position, behavior);
            }
            None => {
                let mut list = AttachedBehaviors::default();
                list.insert(0, behavior);
                owner_ref.insert(list);
            }
        }
        if let Some(mut state) = self.world.get_mut::<BehaviorState>(behavior) {
            state.owner = Some(owner);
        }
        debug!("attached behavior {} ({}) to {}", behavior, type_name, owner);

        self.notify_behavior(behavior, names::ATTACHED, EventArg::Entity(owner));
        Ok(())
    }

    /// Detach from the current owner. `Ok(false)` if it was not attached.
    pub fn detach(&mut self, behavior: Entity) -> EngineResult<bool> {
        self.ensure_behavior(behavior)?;
        let Some(owner) = self.unbind(behavior) else {
            return Ok(false);
        };
        debug!("detached behavior {} from {}", behavior, owner);

        self.notify_behavior(behavior, names::DETACHED, EventArg::Entity(owner));
        Ok(true)
    }

    /// Clear the owner binding and the owner's list entry without notifying.
    fn unbind(&mut self, behavior: Entity) -> Option<Entity> {
        let owner = self.world.get_mut::<BehaviorState>(behavior)?.owner.take()?;
        if let Some(mut list) = self.world.get_mut::<AttachedBehaviors>(owner) {
            list.remove(behavior);
        }
        Some(owner)
    }

    pub fn set_behavior_active(&mut self, behavior: Entity, active: bool) -> EngineResult<()> {
        self.ensure_behavior(behavior)?;
        match self.world.get_mut::<BehaviorState>(behavior) {
            Some(mut state) if state.active != active => state.active = active,
            _ => return Ok(()),
        }
        self.notify_behavior(behavior, names::ACTIVE_CHANGED, EventArg::Bool(active));
        Ok(())
    }

    pub fn behavior_active(&self, behavior: Entity) -> bool {
        self.world
            .get::<BehaviorState>(behavior)
            .is_some_and(|s| s.active)
    }

    pub fn behavior_owner(&self, behavior: Entity) -> Option<Entity> {
        self.world.get::<BehaviorState>(behavior)?.owner
    }

    pub fn behavior_categories(&self, behavior: Entity) -> Option<BehaviorCategory> {
        self.world.get::<BehaviorState>(behavior).map(|s| s.categories)
    }

    /// Behaviors attached to `owner`, in dispatch order.
    pub fn behaviors_of(&self, owner: Entity) -> Vec<Entity> {
        self.world
            .get::<AttachedBehaviors>(owner)
            .map(|list| list.0.to_vec())
            .unwrap_or_default()
    }

    /// Downcast a behavior implementation. `None` while its hook runs.
    pub fn behavior_impl<T: Behavior>(&self, behavior: Entity) -> Option<&T> {
        self.behavior_impls.get(&behavior)?.as_any().downcast_ref::<T>()
    }

    pub fn behavior_impl_mut<T: Behavior>(&mut self, behavior: Entity) -> Option<&mut T> {
        self.behavior_impls
            .get_mut(&behavior)?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    /// Detach (firing `detached`), drop scheduled calls and listeners, and
    /// despawn the behavior.
    pub fn destroy_behavior(&mut self, behavior: Entity) -> EngineResult<()> {
        self.ensure_behavior(behavior)?;
        self.detach(behavior)?;
        if !self.is_behavior(behavior) {
            return Ok(());
        }
        // a `detached` listener may have attached it again
        if let Some(owner) = self.unbind(behavior) {
            debug!("dropping behavior {} rebound to {} during destroy", behavior, owner);
        }
        self.scheduler.cancel_all(behavior);
        self.listeners.remove(&behavior);
        self.handlers.remove(&behavior);
        self.behavior_impls.remove(&behavior);
        self.world.despawn(behavior);
        debug!("destroyed behavior {}", behavior);
        Ok(())
    }

    /// Run `f` with the behavior implementation taken out of the table. It is
    /// put back afterwards unless the behavior was destroyed meanwhile.
    /// Returns `None` if there is no implementation or it is already running.
    pub fn with_behavior<R>(
        &mut self,
        behavior: Entity,
        f: impl FnOnce(&mut Engine, &mut dyn Behavior) -> R,
    ) -> Option<R> {
        let mut imp = self.behavior_impls.remove(&behavior)?;
        let result = f(self, imp.as_mut());
        if self.is_behavior(behavior) {
            self.behavior_impls.insert(behavior, imp);
        }
        Some(result)
    }

    fn notify_behavior(&mut self, behavior: Entity, name: &str, arg: EventArg) {
        let mut event = Event::new(name).with_arg(arg).tracked_by(&self.event_stack);
        self.deliver(behavior, &mut event, true);
    }

    /// Fire `attached`/`detached` on every behavior in the subtree of `node`
    /// without touching owner bindings. Used when a subtree enters or leaves
    /// a scene.
    pub(crate) fn notify_subtree_behaviors(&mut self, node: Entity, name: &str) {
        for n in self.subtree(node) {
            for behavior in self.behaviors_of(n) {
                if let Some(owner) = self.behavior_owner(behavior) {
                    self.notify_behavior(behavior, name, EventArg::Entity(owner));
                }
            }
        }
    }

    /// Fire `activeChanged` on every behavior in the subtree of `node`.
    pub(crate) fn notify_subtree_active(&mut self, node: Entity) {
        for n in self.subtree(node) {
            for behavior in self.behaviors_of(n) {
                let active = self.behavior_active(behavior);
                self.notify_behavior(behavior, names::ACTIVE_CHANGED, EventArg::Bool(active));
            }
        }
    }

    /// Hand `event` to the behavior's implementation if it handles it.
    /// Lifecycle events reach inactive behaviors too.
    pub(crate) fn run_behavior_impl(&mut self, behavior: Entity, event: &mut Event) {
        let Some(state) = self.world.get::<BehaviorState>(behavior) else {
            return;
        };
        let flag = BehaviorEvents::from_name(event.name());
        if !state.handles.intersects(flag) || (!flag.is_lifecycle() && !state.active) {
            return;
        }
        let owner = state.owner;
        let subject = event.arg(0).and_then(EventArg::as_entity).or(owner);

        self.with_behavior(behavior, |engine, imp| {
            if flag == BehaviorEvents::ATTACHED {
                if let Some(subject) = subject {
                    imp.attached(engine, behavior, subject);
                }
            } else if flag == BehaviorEvents::DETACHED {
                if let Some(subject) = subject {
                    imp.detached(engine, behavior, subject);
                }
            } else if flag == BehaviorEvents::ACTIVE_CHANGED {
                imp.active_changed(engine, behavior, owner);
            } else {
                imp.on_event(engine, behavior, owner, event);
            }
        });
    }
}
