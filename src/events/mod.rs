//! Event values and the listener machinery every entity shares.
//!
//! Submodules:
//! - [`event`] – the transient [`Event`](event::Event) and its typed arguments
//! - [`callback`] – native or scripted callback handles with identity
//! - [`listeners`] – per-entity priority-ordered listener lists, safe to mutate
//!   while dispatching
//! - [`stack`] – the active-event stack used for reentrancy introspection
//!
//! Dispatch itself lives on [`Engine`](crate::engine::Engine), since listeners
//! receive the engine mutably.
pub mod callback;
pub mod event;
pub mod listeners;
pub mod stack;

pub use callback::Callback;
pub use event::{Event, EventArg, EventName, names};
pub use listeners::EventListenerRegistry;
pub use stack::EventStack;
