//! Render and UI behaviors.
//!
//! Drawing is external: a [`RenderHooks`] implementation receives the owner
//! and the render event's `behavior_param` (typically a render-target handle)
//! and does the actual work.

use std::any::Any;
use std::rc::Rc;

use bevy_ecs::entity::Entity;

use super::{Behavior, BehaviorCategory, BehaviorEvents};
use crate::engine::Engine;
use crate::events::{Event, names};

pub trait RenderHooks: 'static {
    fn render(&mut self, engine: &Engine, owner: Entity, target: Option<&Rc<dyn Any>>);
}

fn render_with<R: RenderHooks>(hooks: &mut R, engine: &Engine, owner: Option<Entity>, event: &Event) {
    if event.name() != names::RENDER {
        return;
    }
    if let Some(owner) = owner {
        hooks.render(engine, owner, event.behavior_param());
    }
}

pub struct RenderBehavior<R: RenderHooks> {
    hooks: R,
}

impl<R: RenderHooks> RenderBehavior<R> {
    pub fn new(hooks: R) -> Self {
        Self { hooks }
    }

    pub fn hooks(&self) -> &R {
        &self.hooks
    }
}

impl<R: RenderHooks> Behavior for RenderBehavior<R> {
    fn type_name(&self) -> &'static str {
        "RenderBehavior"
    }

    fn categories(&self) -> BehaviorCategory {
        BehaviorCategory::RENDER
    }

    fn handles(&self) -> BehaviorEvents {
        BehaviorEvents::RENDER
    }

    fn on_event(&mut self, engine: &mut Engine, _me: Entity, owner: Option<Entity>, event: &mut Event) {
        render_with(&mut self.hooks, engine, owner, event);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A render behavior that only attaches to UI-layer nodes.
pub struct UiBehavior<R: RenderHooks> {
    hooks: R,
}

impl<R: RenderHooks> UiBehavior<R> {
    pub fn new(hooks: R) -> Self {
        Self { hooks }
    }

    pub fn hooks(&self) -> &R {
        &self.hooks
    }
}

impl<R: RenderHooks> Behavior for UiBehavior<R> {
    fn type_name(&self) -> &'static str {
        "UiBehavior"
    }

    fn categories(&self) -> BehaviorCategory {
        BehaviorCategory::UI | BehaviorCategory::RENDER
    }

    fn handles(&self) -> BehaviorEvents {
        BehaviorEvents::RENDER
    }

    fn can_attach(&self, engine: &Engine, _me: Entity, owner: Entity) -> Result<(), String> {
        if engine.is_ui_layer(owner) {
            Ok(())
        } else {
            Err("owner is not a UI layer".to_string())
        }
    }

    fn on_event(&mut self, engine: &mut Engine, _me: Entity, owner: Option<Entity>, event: &mut Event) {
        render_with(&mut self.hooks, engine, owner, event);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
