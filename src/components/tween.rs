//! Tween component for animated property interpolation.
//!
//! A [`Tween`] is its own entity: it drives a list of named properties on a
//! target node from start to end values over `duration` seconds. Whether it is
//! running is decided solely by membership in the
//! [`ActiveTweens`](crate::resources::tweens::ActiveTweens) set. See
//! [`crate::systems::tween`] for the stepping logic.

use bevy_ecs::prelude::{Component, Entity};
use serde::{Deserialize, Serialize};

/// Easing functions for smooth interpolation.
///
/// These functions transform a linear `t` value (0.0 to 1.0) to create
/// different acceleration/deceleration curves.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    /// Constant speed (no easing).
    #[default]
    Linear,
    /// Starts slow, accelerates (quadratic).
    QuadIn,
    /// Starts fast, decelerates (quadratic).
    QuadOut,
    /// Slow start and end (quadratic).
    QuadInOut,
    /// Starts slow, accelerates (cubic).
    CubicIn,
    /// Starts fast, decelerates (cubic).
    CubicOut,
    /// Slow start and end (cubic).
    CubicInOut,
    SineIn,
    SineOut,
    SineInOut,
}

/// Convert an easing name to [`Easing`]. Unknown names fall back to linear.
pub fn parse_easing(name: &str) -> Easing {
    match name {
        "quad_in" => Easing::QuadIn,
        "quad_out" => Easing::QuadOut,
        "quad_in_out" => Easing::QuadInOut,
        "cubic_in" => Easing::CubicIn,
        "cubic_out" => Easing::CubicOut,
        "cubic_in_out" => Easing::CubicInOut,
        "sine_in" => Easing::SineIn,
        "sine_out" => Easing::SineOut,
        "sine_in_out" => Easing::SineInOut,
        _ => Easing::Linear,
    }
}

/// Interpolates named properties of `target`.
///
/// `properties`, `start` and `end` are parallel; a missing start or end value
/// at some index reads as `0.0`.
#[derive(Component, Clone, Debug, Default)]
pub struct Tween {
    pub target: Option<Entity>,
    pub properties: Vec<String>,
    pub start: Vec<f32>,
    pub end: Vec<f32>,
    /// Duration in seconds.
    pub duration: f32,
    /// Elapsed time within the tween.
    pub time: f32,
    pub easing: Easing,
    /// Advance on the unscaled clock.
    pub unscaled_time: bool,
}

impl Tween {
    pub fn new(target: Entity, duration: f32) -> Self {
        Tween {
            target: Some(target),
            duration,
            ..Default::default()
        }
    }

    /// Track one more property.
    pub fn with_property(mut self, name: impl Into<String>, start: f32, end: f32) -> Self {
        let index = self.properties.len();
        self.properties.push(name.into());
        self.start.resize(index, 0.0);
        self.end.resize(index, 0.0);
        self.start.push(start);
        self.end.push(end);
        self
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn with_unscaled_time(mut self, unscaled: bool) -> Self {
        self.unscaled_time = unscaled;
        self
    }

    pub fn start_value(&self, index: usize) -> f32 {
        self.start.get(index).copied().unwrap_or(0.0)
    }

    pub fn end_value(&self, index: usize) -> f32 {
        self.end.get(index).copied().unwrap_or(0.0)
    }
}
