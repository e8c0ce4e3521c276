//! The set of running tweens.

use bevy_ecs::prelude::*;

/// Running tweens in start order. Membership is the only record of whether a
/// tween runs.
#[derive(Resource, Debug, Default, Clone)]
pub struct ActiveTweens {
    tweens: Vec<Entity>,
}

impl ActiveTweens {
    /// Returns `false` if the tween was already running.
    pub fn insert(&mut self, tween: Entity) -> bool {
        if self.tweens.contains(&tween) {
            return false;
        }
        self.tweens.push(tween);
        true
    }

    pub fn remove(&mut self, tween: Entity) -> bool {
        match self.tweens.iter().position(|t| *t == tween) {
            Some(index) => {
                self.tweens.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, tween: Entity) -> bool {
        self.tweens.contains(&tween)
    }

    pub fn snapshot(&self) -> Vec<Entity> {
        self.tweens.clone()
    }

    pub fn len(&self) -> usize {
        self.tweens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tweens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_idempotent_and_ordered() {
        let mut world = World::new();
        let a = world.spawn_empty().id();
        let b = world.spawn_empty().id();
        let mut set = ActiveTweens::default();
        assert!(set.insert(a));
        assert!(set.insert(b));
        assert!(!set.insert(a));
        assert_eq!(set.snapshot(), vec![a, b]);
        assert!(set.remove(a));
        assert!(!set.remove(a));
        assert!(!set.contains(a));
        assert_eq!(set.len(), 1);
    }
}
