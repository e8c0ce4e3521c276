//! Named scalar properties exposed to scripts and tweens.

use bevy_ecs::prelude::Component;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Default, Component)]
pub struct Properties {
    pub scalars: FxHashMap<String, f32>,
}

impl Properties {
    pub fn set(&mut self, key: impl Into<String>, value: f32) {
        self.scalars.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<f32> {
        self.scalars.get(key).copied()
    }

    pub fn remove(&mut self, key: &str) -> Option<f32> {
        self.scalars.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.scalars.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let mut props = Properties::default();
        assert!(props.get("alpha").is_none());
        props.set("alpha", 0.5);
        assert_eq!(props.get("alpha"), Some(0.5));
        props.set("alpha", 1.0);
        assert_eq!(props.get("alpha"), Some(1.0));
        assert_eq!(props.remove("alpha"), Some(1.0));
        assert!(!props.contains("alpha"));
    }
}
