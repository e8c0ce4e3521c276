//! Physics-body behaviors.
//!
//! The physics engine itself is an external collaborator: the engine holds
//! an opaque [`PhysicsWorld`] and [`BodyHooks`] implementations do the actual
//! body work. [`BodyBehavior`] owns the lifecycle around those hooks:
//!
//! - the body is added when the behavior is attached to an owner that sits in
//!   a scene while a physics world is present, and removed on detach (which
//!   includes the owner leaving its scene);
//! - the body is enabled exactly when the behavior is active AND its owner is
//!   effectively active; either side flipping recomputes it;
//! - `prePhysics` pushes a dirty owner transform into the body, `postPhysics`
//!   pulls the simulated transform back.

use std::any::Any;

use bevy_ecs::entity::Entity;
use log::debug;

use super::{Behavior, BehaviorCategory, BehaviorEvents};
use crate::components::transform::Transform2D;
use crate::engine::Engine;
use crate::events::{Event, names};

/// Opaque handle to the physics simulation.
pub trait PhysicsWorld: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Body operations a concrete physics binding provides.
pub trait BodyHooks: 'static {
    /// Domain check run before attaching; return the refusal reason.
    fn accepts(&self, _engine: &Engine, _owner: Entity) -> Result<(), String> {
        Ok(())
    }

    fn add_body(&mut self, world: &mut dyn PhysicsWorld, owner: Entity, transform: &Transform2D);

    fn remove_body(&mut self, world: &mut dyn PhysicsWorld);

    fn set_enabled(&mut self, world: &mut dyn PhysicsWorld, enabled: bool);

    fn sync_object_to_body(&mut self, world: &mut dyn PhysicsWorld, transform: &Transform2D);

    /// The simulated transform, if the body moved.
    fn sync_body_to_object(&mut self, world: &mut dyn PhysicsWorld) -> Option<Transform2D>;
}

pub struct BodyBehavior<H: BodyHooks> {
    hooks: H,
    body_added: bool,
    enabled: bool,
}

impl<H: BodyHooks> BodyBehavior<H> {
    pub fn new(hooks: H) -> Self {
        Self {
            hooks,
            body_added: false,
            enabled: false,
        }
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    pub fn body_added(&self) -> bool {
        self.body_added
    }

    /// Whether the body is (or would be, once added) enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn add_body(&mut self, engine: &mut Engine, owner: Entity) {
        if self.body_added || engine.scene_of(owner).is_none() {
            return;
        }
        let transform = engine.transform(owner).unwrap_or_default();
        if let Some(world) = engine.physics_mut() {
            self.hooks.add_body(world, owner, &transform);
            self.body_added = true;
            debug!("body added for owner {}", owner);
        }
    }

    fn remove_body(&mut self, engine: &mut Engine, owner: Entity) {
        if !self.body_added {
            return;
        }
        if let Some(world) = engine.physics_mut() {
            self.hooks.remove_body(world);
        }
        self.body_added = false;
        debug!("body removed for owner {}", owner);
    }

    fn refresh_enabled(&mut self, engine: &mut Engine, me: Entity, owner: Entity) {
        self.enabled = engine.behavior_active(me) && engine.node_active(owner);
        if self.body_added {
            let enabled = self.enabled;
            if let Some(world) = engine.physics_mut() {
                self.hooks.set_enabled(world, enabled);
            }
        }
    }
}

impl<H: BodyHooks> Behavior for BodyBehavior<H> {
    fn type_name(&self) -> &'static str {
        "BodyBehavior"
    }

    fn categories(&self) -> BehaviorCategory {
        BehaviorCategory::BODY
    }

    fn handles(&self) -> BehaviorEvents {
        BehaviorEvents::LIFECYCLE | BehaviorEvents::PRE_PHYSICS | BehaviorEvents::POST_PHYSICS
    }

    fn can_attach(&self, engine: &Engine, me: Entity, owner: Entity) -> Result<(), String> {
        let has_body = engine.behaviors_of(owner).into_iter().any(|b| {
            b != me
                && engine
                    .behavior_categories(b)
                    .is_some_and(|c| c.contains(BehaviorCategory::BODY))
        });
        if has_body {
            return Err("owner already has a body behavior".to_string());
        }
        self.hooks.accepts(engine, owner)
    }

    fn attached(&mut self, engine: &mut Engine, me: Entity, owner: Entity) {
        self.add_body(engine, owner);
        self.refresh_enabled(engine, me, owner);
    }

    fn detached(&mut self, engine: &mut Engine, _me: Entity, owner: Entity) {
        self.remove_body(engine, owner);
    }

    fn active_changed(&mut self, engine: &mut Engine, me: Entity, owner: Option<Entity>) {
        if let Some(owner) = owner {
            self.refresh_enabled(engine, me, owner);
        }
    }

    fn on_event(&mut self, engine: &mut Engine, _me: Entity, owner: Option<Entity>, event: &mut Event) {
        let Some(owner) = owner else {
            return;
        };
        if !self.body_added {
            return;
        }
        match event.name() {
            names::PRE_PHYSICS => {
                if !engine.is_transform_dirty(owner) {
                    return;
                }
                let Some(transform) = engine.transform(owner) else {
                    return;
                };
                if let Some(world) = engine.physics_mut() {
                    self.hooks.sync_object_to_body(world, &transform);
                }
            }
            names::POST_PHYSICS if self.enabled => {
                let synced = engine
                    .physics_mut()
                    .and_then(|world| self.hooks.sync_body_to_object(world));
                if let Some(transform) = synced {
                    engine.write_simulated_transform(owner, transform);
                }
            }
            _ => {}
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
