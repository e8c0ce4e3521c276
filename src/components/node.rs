//! Scene-graph node markers.
//!
//! Every node entity carries [`Node`] and [`Active`]. Parent/child links use
//! bevy's [`ChildOf`](bevy_ecs::hierarchy::ChildOf) relationship.

use bevy_ecs::prelude::Component;

/// A scene-graph node.
#[derive(Component, Clone, Debug, Default)]
pub struct Node {
    pub name: String,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Node { name: name.into() }
    }
}

/// The node's own active flag. A node is effectively active only if every
/// ancestor is active too; tree dispatch skips inactive subtrees.
#[derive(Component, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Active(pub bool);

impl Default for Active {
    fn default() -> Self {
        Active(true)
    }
}

/// Marks the root node of a scene.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct SceneRoot;

/// Marks a node as a UI layer. UI behaviors only attach to such nodes.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct UiLayer;
