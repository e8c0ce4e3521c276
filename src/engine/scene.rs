//! Minimal scene graph: nodes, hierarchy, activity, transforms and named
//! properties.
//!
//! Nodes are ECS entities; parent links use bevy's `ChildOf` relationship so
//! `Children` stays in insertion order. A node belongs to a scene when walking
//! `ChildOf` upwards reaches a [`SceneRoot`].

use std::any::Any;
use std::rc::Rc;

use bevy_ecs::hierarchy::{ChildOf, Children};
use bevy_ecs::prelude::*;
use log::{debug, warn};

use super::Engine;
use crate::components::behaviors::AttachedBehaviors;
use crate::components::node::{Active, Node, SceneRoot, UiLayer};
use crate::components::properties::Properties;
use crate::components::transform::{Transform2D, TransformDirty};
use crate::error::{EngineError, EngineResult};
use crate::events::{Event, EventArg, names};

impl Engine {
    fn node_bundle(name: &str) -> (Node, Active, Transform2D, Properties, AttachedBehaviors) {
        (
            Node::new(name),
            Active::default(),
            Transform2D::default(),
            Properties::default(),
            AttachedBehaviors::default(),
        )
    }

    /// Spawn the root node of a new scene.
    pub fn spawn_scene(&mut self, name: &str) -> Entity {
        let entity = self.world.spawn((Self::node_bundle(name), SceneRoot)).id();
        debug!("spawned scene '{}' as {}", name, entity);
        entity
    }

    /// Spawn a detached node.
    pub fn spawn_node(&mut self, name: &str) -> Entity {
        self.world.spawn(Self::node_bundle(name)).id()
    }

    pub fn is_node(&self, entity: Entity) -> bool {
        self.world.get::<Node>(entity).is_some()
    }

    fn ensure_node(&self, entity: Entity) -> EngineResult<()> {
        self.ensure_alive(entity)?;
        if self.is_node(entity) {
            Ok(())
        } else {
            warn!("entity {} is not a node", entity);
            Err(EngineError::usage(format!("entity {entity} is not a node")))
        }
    }

    pub fn node_name(&self, node: Entity) -> Option<&str> {
        self.world.get::<Node>(node).map(|n| n.name.as_str())
    }

    pub fn mark_ui_layer(&mut self, node: Entity) -> EngineResult<()> {
        self.ensure_node(node)?;
        self.world.entity_mut(node).insert(UiLayer);
        Ok(())
    }

    pub fn is_ui_layer(&self, node: Entity) -> bool {
        self.world.get::<UiLayer>(node).is_some()
    }

    pub fn parent_of(&self, node: Entity) -> Option<Entity> {
        self.world.get::<ChildOf>(node).map(ChildOf::parent)
    }

    pub fn children_of(&self, node: Entity) -> Vec<Entity> {
        self.world
            .get::<Children>(node)
            .map(|c| c.iter().collect())
            .unwrap_or_default()
    }

    /// `node` and all its descendants, parent first.
    pub fn subtree(&self, node: Entity) -> Vec<Entity> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if !self.is_alive(current) {
                continue;
            }
            out.push(current);
            let children = self.children_of(current);
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// The scene root `node` belongs to, if any.
    pub fn scene_of(&self, node: Entity) -> Option<Entity> {
        let mut current = node;
        loop {
            if self.world.get::<SceneRoot>(current).is_some() {
                return Some(current);
            }
            current = self.parent_of(current)?;
        }
    }

    fn is_ancestor_of(&self, ancestor: Entity, node: Entity) -> bool {
        let mut current = node;
        while let Some(parent) = self.parent_of(current) {
            if parent == ancestor {
                return true;
            }
            current = parent;
        }
        false
    }

    /// Make `child` the last child of `parent`. If the move changes the scene
    /// the subtree belongs to, its behaviors receive `detached` then
    /// `attached`; if it changes whether `child` is effectively active, they
    /// receive `activeChanged`.
    pub fn add_child(&mut self, parent: Entity, child: Entity) -> EngineResult<()> {
        self.ensure_node(parent)?;
        self.ensure_node(child)?;
        if parent == child || self.is_ancestor_of(child, parent) {
            warn!("add_child: {} would become its own ancestor", child);
            return Err(EngineError::usage("add_child: cycle in scene graph"));
        }
        if self.world.get::<SceneRoot>(child).is_some() {
            warn!("add_child: scene root {} cannot be a child", child);
            return Err(EngineError::usage("add_child: a scene root cannot be a child"));
        }

        let old_scene = self.scene_of(child);
        let was_active = self.node_active(child);
        self.world.entity_mut(child).insert(ChildOf(parent));
        let new_scene = self.scene_of(child);
        self.notify_scene_change(child, old_scene, new_scene);
        self.notify_activity_change(child, was_active);
        Ok(())
    }

    /// Unparent `node`. `Ok(false)` if it had no parent.
    pub fn remove_from_parent(&mut self, node: Entity) -> EngineResult<bool> {
        self.ensure_node(node)?;
        if self.parent_of(node).is_none() {
            return Ok(false);
        }
        let old_scene = self.scene_of(node);
        let was_active = self.node_active(node);
        self.world.entity_mut(node).remove::<ChildOf>();
        self.notify_scene_change(node, old_scene, None);
        self.notify_activity_change(node, was_active);
        Ok(true)
    }

    /// Reparenting can flip effective activity without touching any flag.
    fn notify_activity_change(&mut self, node: Entity, was_active: bool) {
        if self.is_alive(node) && self.node_active(node) != was_active {
            self.notify_subtree_active(node);
        }
    }

    fn notify_scene_change(&mut self, node: Entity, old: Option<Entity>, new: Option<Entity>) {
        if old == new {
            return;
        }
        if old.is_some() {
            self.notify_subtree_behaviors(node, names::DETACHED);
        }
        if new.is_some() {
            self.notify_subtree_behaviors(node, names::ATTACHED);
        }
    }

    /// Destroy `node` and its subtree, children first. Attached behaviors are
    /// destroyed (receiving `detached`), and pending calls and listeners are
    /// dropped with them.
    pub fn destroy_node(&mut self, node: Entity) -> EngineResult<()> {
        self.ensure_node(node)?;
        for child in self.children_of(node) {
            if self.is_alive(child) {
                self.destroy_node(child)?;
            }
        }
        for behavior in self.behaviors_of(node) {
            if self.is_behavior(behavior) {
                self.destroy_behavior(behavior)?;
            }
        }
        // A detached hook may already have destroyed it.
        if !self.is_alive(node) {
            return Ok(());
        }
        self.scheduler.cancel_all(node);
        self.listeners.remove(&node);
        self.handlers.remove(&node);
        self.world.despawn(node);
        debug!("destroyed node {}", node);
        Ok(())
    }

    /// The node's own flag, ignoring ancestors.
    pub fn own_active(&self, node: Entity) -> bool {
        self.world.get::<Active>(node).is_some_and(|a| a.0)
    }

    /// Whether `node` and every ancestor are active.
    pub fn node_active(&self, node: Entity) -> bool {
        let mut current = node;
        loop {
            if !self.own_active(current) {
                return false;
            }
            match self.parent_of(current) {
                Some(parent) => current = parent,
                None => return true,
            }
        }
    }

    /// Flip the node's own flag. The node's listeners and every behavior in
    /// its subtree receive `activeChanged`.
    pub fn set_node_active(&mut self, node: Entity, active: bool) -> EngineResult<()> {
        self.ensure_node(node)?;
        match self.world.get_mut::<Active>(node) {
            Some(mut flag) if flag.0 != active => flag.0 = active,
            _ => return Ok(()),
        }
        let mut event = Event::new(names::ACTIVE_CHANGED)
            .with_arg(EventArg::Bool(active))
            .tracked_by(&self.event_stack);
        self.deliver(node, &mut event, false);
        self.notify_subtree_active(node);
        Ok(())
    }

    pub fn transform(&self, node: Entity) -> Option<Transform2D> {
        self.world.get::<Transform2D>(node).copied()
    }

    /// Replace the node's transform and mark it dirty.
    pub fn set_transform(&mut self, node: Entity, transform: Transform2D) -> EngineResult<()> {
        self.ensure_node(node)?;
        self.world.entity_mut(node).insert((transform, TransformDirty));
        Ok(())
    }

    /// Mark `node` and its descendants as needing a physics sync.
    pub fn dirty_transform(&mut self, node: Entity) -> EngineResult<()> {
        self.ensure_node(node)?;
        for n in self.subtree(node) {
            self.world.entity_mut(n).insert(TransformDirty);
        }
        Ok(())
    }

    pub fn is_transform_dirty(&self, node: Entity) -> bool {
        self.world.get::<TransformDirty>(node).is_some()
    }

    /// Write a transform coming from the simulation without marking it dirty.
    pub(crate) fn write_simulated_transform(&mut self, node: Entity, transform: Transform2D) {
        if let Some(mut current) = self.world.get_mut::<Transform2D>(node) {
            *current = transform;
        }
    }

    /// Read a named property. Transform fields (`x`, `y`, `rotation`,
    /// `scale_x`, `scale_y`) come from [`Transform2D`].
    pub fn get_property(&self, node: Entity, name: &str) -> Option<f32> {
        if let Some(t) = self.world.get::<Transform2D>(node) {
            match name {
                "x" => return Some(t.position.x),
                "y" => return Some(t.position.y),
                "rotation" => return Some(t.rotation),
                "scale_x" => return Some(t.scale.x),
                "scale_y" => return Some(t.scale.y),
                _ => {}
            }
        }
        self.world.get::<Properties>(node)?.get(name)
    }

    pub fn set_property(&mut self, node: Entity, name: &str, value: f32) -> EngineResult<()> {
        self.ensure_node(node)?;
        let mut entity = self.world.entity_mut(node);
        let wrote_transform = match entity.get_mut::<Transform2D>() {
            Some(mut t) => write_transform_field(&mut t, name, value),
            None => false,
        };
        if wrote_transform {
            entity.insert(TransformDirty);
            return Ok(());
        }
        match entity.get_mut::<Properties>() {
            Some(mut props) => props.set(name, value),
            None => {
                let mut props = Properties::default();
                props.set(name, value);
                entity.insert(props);
            }
        }
        Ok(())
    }

    /// Dispatch `render` through the subtree of `node`, handing `param` to
    /// render behaviors. Returns `false` if a handler stopped it.
    pub fn render(&mut self, node: Entity, param: Option<Rc<dyn Any>>) -> EngineResult<bool> {
        self.ensure_node(node)?;
        let mut event = Event::new(names::RENDER);
        if let Some(param) = param {
            event = event.with_behavior_param(param);
        }
        let mut event = event.tracked_by(&self.event_stack);
        self.dispatch_tree(node, &mut event);
        Ok(!event.is_stopped())
    }
}

fn write_transform_field(t: &mut Transform2D, name: &str, value: f32) -> bool {
    match name {
        "x" => t.position.x = value,
        "y" => t.position.y = value,
        "rotation" => t.rotation = value,
        "scale_x" => t.scale.x = value,
        "scale_y" => t.scale.y = value,
        _ => return false,
    }
    true
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::components::tween::Tween;
    use crate::events::Callback;

    #[test]
    fn test_scene_of_walks_to_root() {
        let mut engine = Engine::default();
        let scene = engine.spawn_scene("level");
        let a = engine.spawn_node("a");
        let b = engine.spawn_node("b");
        engine.add_child(scene, a).unwrap();
        engine.add_child(a, b).unwrap();
        assert_eq!(engine.scene_of(b), Some(scene));
        assert_eq!(engine.children_of(scene), vec![a]);
        assert_eq!(engine.parent_of(b), Some(a));

        assert!(engine.remove_from_parent(a).unwrap());
        assert_eq!(engine.scene_of(b), None);
        assert!(!engine.remove_from_parent(a).unwrap());
    }

    #[test]
    fn test_add_child_rejects_cycles() {
        let mut engine = Engine::default();
        let a = engine.spawn_node("a");
        let b = engine.spawn_node("b");
        engine.add_child(a, b).unwrap();
        assert!(matches!(engine.add_child(b, a), Err(EngineError::Usage(_))));
        assert!(matches!(engine.add_child(a, a), Err(EngineError::Usage(_))));
    }

    #[test]
    fn test_node_active_follows_ancestors() {
        let mut engine = Engine::default();
        let scene = engine.spawn_scene("s");
        let child = engine.spawn_node("c");
        engine.add_child(scene, child).unwrap();
        engine.set_node_active(scene, false).unwrap();
        assert!(engine.own_active(child));
        assert!(!engine.node_active(child));
        engine.set_node_active(scene, true).unwrap();
        assert!(engine.node_active(child));
    }

    #[test]
    fn test_set_node_active_notifies_listeners_once() {
        let mut engine = Engine::default();
        let node = engine.spawn_node("n");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = Rc::clone(&seen);
        engine
            .on(
                node,
                names::ACTIVE_CHANGED,
                Callback::native(move |_, _, ev| {
                    seen2.borrow_mut().push(ev.arg(0).and_then(EventArg::as_bool));
                }),
                false,
                0,
            )
            .unwrap();
        engine.set_node_active(node, false).unwrap();
        engine.set_node_active(node, false).unwrap();
        assert_eq!(*seen.borrow(), vec![Some(false)]);
    }

    #[test]
    fn test_properties_route_transform_fields() {
        let mut engine = Engine::default();
        let node = engine.spawn_node("n");
        engine.set_property(node, "x", 4.0).unwrap();
        engine.set_property(node, "scale_y", 2.0).unwrap();
        engine.set_property(node, "alpha", 0.5).unwrap();
        let t = engine.transform(node).unwrap();
        assert_eq!(t.position.x, 4.0);
        assert_eq!(t.scale.y, 2.0);
        assert_eq!(engine.get_property(node, "alpha"), Some(0.5));
        assert_eq!(engine.get_property(node, "missing"), None);
        assert!(engine.is_transform_dirty(node));
    }

    #[test]
    fn test_set_property_requires_a_node() {
        let mut engine = Engine::default();
        let node = engine.spawn_node("n");
        let tween = engine.create_tween(Tween::new(node, 1.0));
        assert!(matches!(
            engine.set_property(tween, "alpha", 1.0),
            Err(EngineError::Usage(_))
        ));
        assert!(engine.world().get::<Properties>(tween).is_none());
    }

    #[test]
    fn test_dirty_transform_marks_subtree() {
        let mut engine = Engine::default();
        let a = engine.spawn_node("a");
        let b = engine.spawn_node("b");
        engine.add_child(a, b).unwrap();
        engine.dirty_transform(a).unwrap();
        assert!(engine.is_transform_dirty(a));
        assert!(engine.is_transform_dirty(b));
    }

    #[test]
    fn test_destroy_node_takes_subtree() {
        let mut engine = Engine::default();
        let a = engine.spawn_node("a");
        let b = engine.spawn_node("b");
        engine.add_child(a, b).unwrap();
        engine.add_async(b, Callback::native(|_, _, _| {}), 1.0, false).unwrap();
        engine.destroy_node(a).unwrap();
        assert!(!engine.is_alive(a));
        assert!(!engine.is_alive(b));
        assert_eq!(engine.pending_asyncs(b), 0);
    }

    #[test]
    fn test_subtree_is_parent_first() {
        let mut engine = Engine::default();
        let root = engine.spawn_node("root");
        let a = engine.spawn_node("a");
        let b = engine.spawn_node("b");
        let a1 = engine.spawn_node("a1");
        engine.add_child(root, a).unwrap();
        engine.add_child(root, b).unwrap();
        engine.add_child(a, a1).unwrap();
        assert_eq!(engine.subtree(root), vec![root, a, a1, b]);
    }
}
