//! Behaviors: attachable units of per-frame logic bound to one owner node.
//!
//! A behavior is created with [`Engine::create_behavior`], which spawns an
//! entity carrying [`BehaviorState`](crate::components::behaviors::BehaviorState)
//! and stores the boxed [`Behavior`] implementation in the engine. The set of
//! events an implementation handles is read once from [`Behavior::handles`]
//! and cached on the state, so dispatch never asks the implementation.
//!
//! Submodules:
//! - [`body`] – physics-body category over an opaque [`PhysicsWorld`](body::PhysicsWorld)
//! - [`render`] – render and UI categories
//! - `script` – behaviors implemented by a Lua table (feature `lua`)

use std::any::Any;

use bevy_ecs::entity::Entity;
use bitflags::bitflags;

use crate::engine::Engine;
use crate::events::{Event, names};

pub mod body;
pub mod render;
#[cfg(feature = "lua")]
pub mod script;

bitflags! {
    /// Category flags. Informative, not exclusive.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BehaviorCategory: u8 {
        const RENDER = 1 << 0;
        const BODY = 1 << 1;
        const UI = 1 << 2;
    }
}

bitflags! {
    /// Events a behavior implementation wants delivered.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BehaviorEvents: u16 {
        const ATTACHED = 1 << 0;
        const DETACHED = 1 << 1;
        const ACTIVE_CHANGED = 1 << 2;
        const UPDATE = 1 << 3;
        const LATE_UPDATE = 1 << 4;
        const RENDER = 1 << 5;
        const PRE_PHYSICS = 1 << 6;
        const POST_PHYSICS = 1 << 7;
        /// Any event name not listed above.
        const CUSTOM = 1 << 8;
    }
}

impl BehaviorEvents {
    pub const LIFECYCLE: Self = Self::ATTACHED
        .union(Self::DETACHED)
        .union(Self::ACTIVE_CHANGED);

    pub fn from_name(name: &str) -> Self {
        match name {
            names::ATTACHED => Self::ATTACHED,
            names::DETACHED => Self::DETACHED,
            names::ACTIVE_CHANGED => Self::ACTIVE_CHANGED,
            names::UPDATE => Self::UPDATE,
            names::LATE_UPDATE => Self::LATE_UPDATE,
            names::RENDER => Self::RENDER,
            names::PRE_PHYSICS => Self::PRE_PHYSICS,
            names::POST_PHYSICS => Self::POST_PHYSICS,
            _ => Self::CUSTOM,
        }
    }

    /// Lifecycle events reach a behavior even while it is inactive.
    pub fn is_lifecycle(self) -> bool {
        Self::LIFECYCLE.contains(self)
    }
}

/// An attachable behavior implementation.
///
/// `me` is the behavior's own entity. Hooks receive the engine mutably and
/// may fire events, attach, detach or destroy anything, including this
/// behavior; reentrant delivery to a behavior whose hook is running is
/// skipped.
pub trait Behavior: Any {
    fn type_name(&self) -> &'static str;

    fn categories(&self) -> BehaviorCategory {
        BehaviorCategory::empty()
    }

    fn handles(&self) -> BehaviorEvents;

    /// Refuse an owner by returning the reason. Must not mutate anything.
    fn can_attach(&self, _engine: &Engine, _me: Entity, _owner: Entity) -> Result<(), String> {
        Ok(())
    }

    fn attached(&mut self, _engine: &mut Engine, _me: Entity, _owner: Entity) {}

    fn detached(&mut self, _engine: &mut Engine, _me: Entity, _owner: Entity) {}

    /// Either the behavior's or its owner's active flag changed.
    fn active_changed(&mut self, _engine: &mut Engine, _me: Entity, _owner: Option<Entity>) {}

    /// Every other handled event (`update`, `render`, custom names, ...).
    fn on_event(&mut self, _engine: &mut Engine, _me: Entity, _owner: Option<Entity>, _event: &mut Event) {}

    /// Push every script-visible entity this behavior keeps alive.
    fn trace(&self, _out: &mut Vec<Entity>) {}

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_maps_builtins_and_custom() {
        assert_eq!(BehaviorEvents::from_name("update"), BehaviorEvents::UPDATE);
        assert_eq!(BehaviorEvents::from_name("lateUpdate"), BehaviorEvents::LATE_UPDATE);
        assert_eq!(BehaviorEvents::from_name("activeChanged"), BehaviorEvents::ACTIVE_CHANGED);
        assert_eq!(BehaviorEvents::from_name("explode"), BehaviorEvents::CUSTOM);
    }

    #[test]
    fn test_lifecycle_classification() {
        assert!(BehaviorEvents::ATTACHED.is_lifecycle());
        assert!(BehaviorEvents::ACTIVE_CHANGED.is_lifecycle());
        assert!(!BehaviorEvents::UPDATE.is_lifecycle());
        assert!(!BehaviorEvents::CUSTOM.is_lifecycle());
    }
}
