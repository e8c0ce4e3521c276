//! Behavior and event core of a scriptable 2D engine.
//!
//! Scene-graph nodes, behaviors and tweens are `bevy_ecs` entities owned by an
//! [`Engine`](engine::Engine). Behaviors attach to nodes and receive lifecycle
//! and per-frame events; every entity can carry prioritized listeners, a
//! deferred-call schedule (async and debounced calls) and, with the `lua`
//! feature, Lua callbacks for all of the above.
//!
//! ```
//! use behavior_core::engine::Engine;
//! use behavior_core::events::Callback;
//!
//! let mut engine = Engine::default();
//! let scene = engine.spawn_scene("level");
//! engine
//!     .on(scene, "update", Callback::native(|_, _, _| {}), false, 0)
//!     .unwrap();
//! engine.tick(1.0 / 60.0);
//! ```

pub mod behavior;
pub mod color;
pub mod components;
pub mod engine;
pub mod error;
pub mod events;
pub mod resources;
pub mod systems;
