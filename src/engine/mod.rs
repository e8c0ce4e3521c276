//! The engine: owner of the ECS world and every registry that holds
//! callbacks.
//!
//! Callbacks (native closures or Lua functions) are neither `Send` nor
//! `Sync`, so the registries that store them live on [`Engine`] rather than as
//! ECS resources. Plain data (configuration, clocks, the active-tween set)
//! lives in the [`World`] as resources.
//!
//! The engine API is split by concern:
//! - `dispatch` – listeners, handlers, `fire`, tree dispatch, late events
//! - `behaviors` – behavior creation and the attach/detach state machine
//! - `scene` – the scene-graph collaborator (nodes, hierarchy, transforms)
//! - `schedule` – async and debounced calls, physics sync passes
//! - `tweens` – tween creation and the active-set pass
//! - `script` – Lua host wiring (feature `lua`)

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use bevy_ecs::prelude::*;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::behavior::Behavior;
use crate::behavior::body::PhysicsWorld;
use crate::components::node::SceneRoot;
use crate::components::tween::Tween;
use crate::error::{EngineError, EngineResult};
use crate::events::{Callback, Event, EventArg, EventListenerRegistry, EventName, EventStack, names};
use crate::resources::config::EngineConfig;
use crate::resources::scheduler::ScheduledCallEngine;
use crate::resources::tweens::ActiveTweens;
use crate::resources::worldtime::WorldTime;
use crate::systems::time::update_world_time;

#[cfg(feature = "lua")]
use crate::resources::lua_runtime::LuaRuntime;

mod behaviors;
mod dispatch;
mod scene;
mod schedule;
#[cfg(feature = "lua")]
mod script;
mod tweens;

struct LateEvent {
    target: Entity,
    name: EventName,
    args: SmallVec<[EventArg; 4]>,
}

pub struct Engine {
    world: World,
    listeners: FxHashMap<Entity, Rc<RefCell<EventListenerRegistry>>>,
    handlers: FxHashMap<Entity, FxHashMap<EventName, Callback>>,
    scheduler: ScheduledCallEngine,
    behavior_impls: FxHashMap<Entity, Box<dyn Behavior>>,
    late_events: VecDeque<LateEvent>,
    event_stack: EventStack,
    physics: Option<Box<dyn PhysicsWorld>>,
    #[cfg(feature = "lua")]
    script: Option<Rc<LuaRuntime>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let mut world = World::new();
        world.insert_resource(WorldTime {
            time_scale: config.time_scale,
            ..Default::default()
        });
        world.insert_resource(ActiveTweens::default());
        world.insert_resource(config);

        Self {
            world,
            listeners: FxHashMap::default(),
            handlers: FxHashMap::default(),
            scheduler: ScheduledCallEngine::default(),
            behavior_impls: FxHashMap::default(),
            late_events: VecDeque::new(),
            event_stack: EventStack::default(),
            physics: None,
            #[cfg(feature = "lua")]
            script: None,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn config(&self) -> &EngineConfig {
        self.world.resource::<EngineConfig>()
    }

    pub fn world_time(&self) -> WorldTime {
        *self.world.resource::<WorldTime>()
    }

    pub fn set_time_scale(&mut self, scale: f32) {
        self.world.resource_mut::<WorldTime>().time_scale = scale.max(0.0);
    }

    pub fn set_physics(&mut self, physics: Box<dyn PhysicsWorld>) {
        self.physics = Some(physics);
    }

    pub fn physics_mut(&mut self) -> Option<&mut (dyn PhysicsWorld + 'static)> {
        self.physics.as_deref_mut()
    }

    /// Downcast the physics world.
    pub fn physics_as<T: PhysicsWorld>(&self) -> Option<&T> {
        self.physics.as_deref()?.as_any().downcast_ref::<T>()
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.world.get_entity(entity).is_ok()
    }

    pub(crate) fn ensure_alive(&self, entity: Entity) -> EngineResult<()> {
        if self.is_alive(entity) {
            Ok(())
        } else {
            log::warn!("entity {} does not exist", entity);
            Err(EngineError::StaleEntity(entity))
        }
    }

    /// Scene roots in creation order.
    pub fn scene_roots(&mut self) -> Vec<Entity> {
        let mut roots: Vec<Entity> = self
            .world
            .query_filtered::<Entity, With<SceneRoot>>()
            .iter(&self.world)
            .collect();
        roots.sort();
        roots
    }

    /// Advance one frame: clocks, scheduled calls, `update` and `lateUpdate`
    /// over every scene, tweens, then queued late events.
    pub fn tick(&mut self, dt: f32) {
        update_world_time(&mut self.world, dt);
        let time = self.world_time();

        self.advance_scheduled(time.delta, time.unscaled_delta);

        let roots = self.scene_roots();
        for name in [names::UPDATE, names::LATE_UPDATE] {
            for root in &roots {
                let mut event = Event::new(name)
                    .with_arg(time.delta)
                    .tracked_by(&self.event_stack);
                self.dispatch_tree(*root, &mut event);
            }
        }

        self.process_active_tweens(time.delta, time.unscaled_delta);
        self.drain_late_events();
    }

    /// Script-visible entities kept alive by `entity`: its children, attached
    /// behaviors, whatever a behavior reports from [`Behavior::trace`], and
    /// tweens targeting it.
    pub fn trace_protected(&mut self, entity: Entity) -> Vec<Entity> {
        let mut out = self.children_of(entity);
        out.extend(self.behaviors_of(entity));
        if let Some(imp) = self.behavior_impls.get(&entity) {
            imp.trace(&mut out);
        }
        let mut tweens: Vec<Entity> = self
            .world
            .query::<(Entity, &Tween)>()
            .iter(&self.world)
            .filter(|(_, tween)| tween.target == Some(entity))
            .map(|(e, _)| e)
            .collect();
        tweens.sort();
        out.extend(tweens);
        out
    }
}
