//! ECS components for nodes, behaviors and tweens.
//!
//! Submodules overview:
//! - [`node`] – node name, active flag, scene-root and UI-layer markers
//! - [`transform`] – local 2D transform and its dirty marker
//! - [`properties`] – named scalar properties writable by scripts and tweens
//! - [`behaviors`] – per-node attachment list and per-behavior state
//! - [`tween`] – property interpolation data and easing catalogue

pub mod behaviors;
pub mod node;
pub mod properties;
pub mod transform;
pub mod tween;
