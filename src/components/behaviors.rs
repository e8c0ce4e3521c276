//! ECS-side state of behaviors and the per-node attachment list.
//!
//! A behavior is an entity carrying [`BehaviorState`]. Its implementation
//! lives in the engine's behavior table; the owner is a plain [`Entity`]
//! handle, so a despawned owner is detected instead of dangling.

use bevy_ecs::prelude::*;
use smallvec::SmallVec;

use crate::behavior::{BehaviorCategory, BehaviorEvents};

/// Behaviors attached to a node, in dispatch order.
#[derive(Component, Clone, Debug, Default)]
pub struct AttachedBehaviors(pub SmallVec<[Entity; 4]>);

impl AttachedBehaviors {
    /// Insert at `position` (clamped to the end).
    pub fn insert(&mut self, position: usize, behavior: Entity) {
        let position = position.min(self.0.len());
        self.0.insert(position, behavior);
    }

    pub fn remove(&mut self, behavior: Entity) -> bool {
        match self.0.iter().position(|b| *b == behavior) {
            Some(index) => {
                self.0.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, behavior: Entity) -> bool {
        self.0.contains(&behavior)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Attachment and activity state of one behavior.
#[derive(Component, Clone, Debug)]
pub struct BehaviorState {
    pub owner: Option<Entity>,
    pub active: bool,
    pub categories: BehaviorCategory,
    /// Events the implementation handles, resolved once at creation.
    pub handles: BehaviorEvents,
    pub type_name: &'static str,
}

impl BehaviorState {
    pub fn new(type_name: &'static str, categories: BehaviorCategory, handles: BehaviorEvents) -> Self {
        Self {
            owner: None,
            active: true,
            categories,
            handles,
            type_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_clamps_position() {
        let mut world = World::new();
        let a = world.spawn_empty().id();
        let b = world.spawn_empty().id();
        let c = world.spawn_empty().id();

        let mut list = AttachedBehaviors::default();
        list.insert(10, a);
        list.insert(0, b);
        list.insert(1, c);
        assert_eq!(list.0.as_slice(), &[b, c, a]);
        assert!(list.remove(c));
        assert!(!list.remove(c));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_new_state_is_active_and_unattached() {
        let state = BehaviorState::new("Tracker", BehaviorCategory::RENDER, BehaviorEvents::RENDER);
        assert!(state.active);
        assert!(state.owner.is_none());
        assert!(state.categories.contains(BehaviorCategory::RENDER));
    }
}
