//! Per-frame stepping logic that does not need the whole engine.
//!
//! Submodules overview
//! - [`time`] – advance [`WorldTime`](crate::resources::worldtime::WorldTime)
//! - [`tween`] – easing curves and single-tween stepping

pub mod time;
pub mod tween;
