//! Callback handles shared by listeners, handlers, scheduled calls and
//! script behaviors.
//!
//! A callback is either a native closure or a function owned by the scripting
//! host. Identity (used by `off` and idempotent `on`) is pointer identity of
//! the underlying closure or script function.

use std::fmt;
use std::rc::Rc;

use bevy_ecs::entity::Entity;

use crate::engine::Engine;
use crate::events::event::Event;

/// Signature of native callbacks: the engine, the entity the callback is
/// registered on, and the event being delivered.
pub type NativeCallback = dyn Fn(&mut Engine, Entity, &mut Event);

#[derive(Clone)]
pub enum Callback {
    Native(Rc<NativeCallback>),
    #[cfg(feature = "lua")]
    Lua(mlua::Function),
}

impl Callback {
    pub fn native<F>(f: F) -> Self
    where
        F: Fn(&mut Engine, Entity, &mut Event) + 'static,
    {
        Callback::Native(Rc::new(f))
    }

    /// Whether both handles refer to the same closure or script function.
    pub fn same_as(&self, other: &Callback) -> bool {
        match (self, other) {
            (Callback::Native(a), Callback::Native(b)) => Rc::ptr_eq(a, b),
            #[cfg(feature = "lua")]
            (Callback::Lua(a), Callback::Lua(b)) => a.to_pointer() == b.to_pointer(),
            #[cfg(feature = "lua")]
            _ => false,
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callback::Native(cb) => write!(f, "Callback::Native({:p})", Rc::as_ptr(cb) as *const ()),
            #[cfg(feature = "lua")]
            Callback::Lua(func) => write!(f, "Callback::Lua({:p})", func.to_pointer()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_is_same() {
        let a = Callback::native(|_, _, _| {});
        let b = a.clone();
        assert!(a.same_as(&b));
    }

    #[test]
    fn test_distinct_closures_differ() {
        let a = Callback::native(|_, _, _| {});
        let b = Callback::native(|_, _, _| {});
        assert!(!a.same_as(&b));
    }
}
