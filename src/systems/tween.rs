//! Tween stepping.
//!
//! [`step_tween`] advances one [`Tween`] by a frame and reports the values to
//! write; the engine applies them to the target and manages the active set
//! (see [`Engine::process_active_tweens`](crate::engine::Engine::process_active_tweens)).

use std::f32::consts::PI;

use crate::components::tween::{Easing, Tween};

/// Apply an easing function to a normalized time value.
///
/// The input `t` is clamped to [0.0, 1.0] and transformed according to the
/// easing curve.
pub fn ease(e: Easing, t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    match e {
        Easing::Linear => t,
        Easing::QuadIn => t * t,
        Easing::QuadOut => t * (2.0 - t),
        Easing::QuadInOut => {
            if t < 0.5 {
                2.0 * t * t
            } else {
                -1.0 + (4.0 - 2.0 * t) * t
            }
        }
        Easing::CubicIn => t * t * t,
        Easing::CubicOut => {
            let p = t - 1.0;
            p * p * p + 1.0
        }
        Easing::CubicInOut => {
            if t < 0.5 {
                4.0 * t * t * t
            } else {
                let p = 2.0 * t - 2.0;
                0.5 * p * p * p + 1.0
            }
        }
        Easing::SineIn => 1.0 - (t * PI / 2.0).cos(),
        Easing::SineOut => (t * PI / 2.0).sin(),
        Easing::SineInOut => -((PI * t).cos() - 1.0) / 2.0,
    }
}

/// Linearly interpolate between two floats.
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Outcome of one [`step_tween`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweenStep {
    /// Still running.
    Continue,
    /// Reached `pos >= 1`; end values were written.
    Finished,
    /// No target or no tracked properties; nothing was written.
    Invalid,
}

/// Advance `tween` by the delta of its clock and hand each
/// `(property, value)` pair to `write`.
///
/// At `pos >= 1` the exact end values are written.
pub fn step_tween(
    tween: &mut Tween,
    dt: f32,
    unscaled_dt: f32,
    mut write: impl FnMut(&str, f32),
) -> TweenStep {
    if tween.target.is_none() || tween.properties.is_empty() {
        return TweenStep::Invalid;
    }

    tween.time += if tween.unscaled_time { unscaled_dt } else { dt };
    let pos = if tween.duration > 0.0 {
        tween.time / tween.duration
    } else {
        1.0
    };

    if pos >= 1.0 {
        for (i, name) in tween.properties.iter().enumerate() {
            write(name, tween.end_value(i));
        }
        return TweenStep::Finished;
    }

    let t = ease(tween.easing, pos);
    for (i, name) in tween.properties.iter().enumerate() {
        write(name, lerp(tween.start_value(i), tween.end_value(i), t));
    }
    TweenStep::Continue
}
