//! The transient [`Event`] value passed through every dispatch.
//!
//! Events live on the stack of the dispatching call. Nothing retains an
//! `Event` past the call that produced it; handlers receive `&mut Event` so
//! they can read arguments and call [`Event::stop`].

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use bevy_ecs::entity::Entity;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::stack::{EventStack, StackEntry};

/// Interned event name. Cloning is a reference-count bump.
pub type EventName = Rc<str>;

/// Names of the events the engine itself fires.
pub mod names {
    pub const ATTACHED: &str = "attached";
    pub const DETACHED: &str = "detached";
    pub const ACTIVE_CHANGED: &str = "activeChanged";
    pub const UPDATE: &str = "update";
    pub const LATE_UPDATE: &str = "lateUpdate";
    pub const RENDER: &str = "render";
    pub const PRE_PHYSICS: &str = "prePhysics";
    pub const POST_PHYSICS: &str = "postPhysics";
    pub const FINISHED: &str = "finished";
    pub const ASYNC: &str = "async";
    pub const DEBOUNCE: &str = "debounce";
}

/// A typed event argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventArg {
    Nil,
    Bool(bool),
    Int(i64),
    Number(f64),
    Str(String),
    Entity(#[serde(with = "entity_bits")] Entity),
}

impl EventArg {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            EventArg::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            EventArg::Int(i) => Some(*i as f64),
            EventArg::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EventArg::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<Entity> {
        match self {
            EventArg::Entity(e) => Some(*e),
            _ => None,
        }
    }
}

impl From<bool> for EventArg {
    fn from(value: bool) -> Self {
        EventArg::Bool(value)
    }
}
impl From<i64> for EventArg {
    fn from(value: i64) -> Self {
        EventArg::Int(value)
    }
}
impl From<f64> for EventArg {
    fn from(value: f64) -> Self {
        EventArg::Number(value)
    }
}
impl From<f32> for EventArg {
    fn from(value: f32) -> Self {
        EventArg::Number(value as f64)
    }
}
impl From<&str> for EventArg {
    fn from(value: &str) -> Self {
        EventArg::Str(value.to_string())
    }
}
impl From<String> for EventArg {
    fn from(value: String) -> Self {
        EventArg::Str(value)
    }
}
impl From<Entity> for EventArg {
    fn from(value: Entity) -> Self {
        EventArg::Entity(value)
    }
}

mod entity_bits {
    use bevy_ecs::entity::Entity;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(entity: &Entity, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(entity.to_bits())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Entity, D::Error> {
        let bits = u64::deserialize(deserializer)?;
        if bits as u32 == u32::MAX {
            return Err(D::Error::custom(format!("invalid entity bits {bits}")));
        }
        Ok(Entity::from_bits(bits))
    }
}

/// A single event dispatch.
///
/// - `bubbles`: tree dispatch visits children before their parent.
/// - `stopped`: set by any handler through [`Event::stop`]; aborts the rest of
///   the dispatch.
/// - `skip_object`: one node excluded from tree dispatch.
/// - `behavior_param`: opaque payload for behaviors (render target, etc).
pub struct Event {
    name: EventName,
    bubbles: bool,
    stopped: bool,
    skip_object: Option<Entity>,
    behavior_param: Option<Rc<dyn Any>>,
    args: SmallVec<[EventArg; 4]>,
    tracked: Option<StackEntry>,
}

impl Event {
    pub fn new(name: impl Into<EventName>) -> Self {
        Event {
            name: name.into(),
            bubbles: false,
            stopped: false,
            skip_object: None,
            behavior_param: None,
            args: SmallVec::new(),
            tracked: None,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = EventArg>) -> Self {
        self.args.extend(args);
        self
    }

    pub fn with_arg(mut self, arg: impl Into<EventArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_bubbles(mut self, bubbles: bool) -> Self {
        self.bubbles = bubbles;
        self
    }

    pub fn skipping(mut self, node: Entity) -> Self {
        self.skip_object = Some(node);
        self
    }

    pub fn with_behavior_param(mut self, param: Rc<dyn Any>) -> Self {
        self.behavior_param = Some(param);
        self
    }

    /// Register this event on an active-event stack. The entry is popped when
    /// the event is dropped.
    pub fn tracked_by(mut self, stack: &EventStack) -> Self {
        if self.tracked.is_none() {
            self.tracked = Some(stack.push(self.name.clone()));
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_rc(&self) -> EventName {
        self.name.clone()
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn skip_object(&self) -> Option<Entity> {
        self.skip_object
    }

    pub fn behavior_param(&self) -> Option<&Rc<dyn Any>> {
        self.behavior_param.as_ref()
    }

    /// Downcast the behavior parameter.
    pub fn param<T: 'static>(&self) -> Option<&T> {
        self.behavior_param.as_ref()?.downcast_ref::<T>()
    }

    pub fn args(&self) -> &[EventArg] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> Option<&EventArg> {
        self.args.get(index)
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("bubbles", &self.bubbles)
            .field("stopped", &self.stopped)
            .field("skip_object", &self.skip_object)
            .field("has_behavior_param", &self.behavior_param.is_some())
            .field("args", &self.args)
            .finish()
    }
}
