//! Local 2D transform of a node.

use bevy_ecs::prelude::Component;
use glam::Vec2;

/// Position, rotation (degrees) and scale, local to the parent node.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct Transform2D {
    pub position: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
}

impl Default for Transform2D {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
        }
    }
}

impl Transform2D {
    pub fn from_position(x: f32, y: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
            ..Self::default()
        }
    }

    pub fn with_rotation(mut self, degrees: f32) -> Self {
        self.rotation = degrees;
        self
    }

    pub fn with_scale(mut self, x: f32, y: f32) -> Self {
        self.scale = Vec2::new(x, y);
        self
    }
}

/// Present while the node's transform has changed since the last physics sync.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct TransformDirty;
