//! Time update system.
//!
//! Updates the shared [`WorldTime`](crate::resources::worldtime::WorldTime)
//! resource once per frame, clamping the raw delta to
//! [`EngineConfig::max_delta`](crate::resources::config::EngineConfig) and
//! applying `time_scale` for the scaled clock.
use bevy_ecs::prelude::*;

use crate::resources::config::EngineConfig;
use crate::resources::worldtime::WorldTime;

/// Advance `WorldTime` by the raw frame delta `dt` (seconds).
pub fn update_world_time(world: &mut World, dt: f32) {
    let max_delta = world
        .get_resource::<EngineConfig>()
        .map(|c| c.max_delta)
        .unwrap_or(f32::INFINITY);
    let dt = dt.clamp(0.0, max_delta.max(0.0));

    let mut wt = world.resource_mut::<WorldTime>();
    let scaled_dt = dt * wt.time_scale;
    wt.elapsed += scaled_dt;
    wt.delta = scaled_dt;
    wt.unscaled_delta = dt;
    wt.frame_count += 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_with(config: EngineConfig, time_scale: f32) -> World {
        let mut world = World::new();
        world.insert_resource(config);
        world.insert_resource(WorldTime {
            time_scale,
            ..Default::default()
        });
        world
    }

    #[test]
    fn test_scaled_and_unscaled_deltas() {
        let mut world = world_with(EngineConfig::default(), 0.5);
        update_world_time(&mut world, 0.2);
        let wt = *world.resource::<WorldTime>();
        assert!((wt.delta - 0.1).abs() < 1e-6);
        assert!((wt.unscaled_delta - 0.2).abs() < 1e-6);
        assert!((wt.elapsed - 0.1).abs() < 1e-6);
        assert_eq!(wt.frame_count, 1);
    }

    #[test]
    fn test_delta_clamped_to_max() {
        let config = EngineConfig {
            max_delta: 0.1,
            ..EngineConfig::default()
        };
        let mut world = world_with(config, 1.0);
        update_world_time(&mut world, 5.0);
        assert!((world.resource::<WorldTime>().unscaled_delta - 0.1).abs() < 1e-6);
        update_world_time(&mut world, -1.0);
        assert_eq!(world.resource::<WorldTime>().delta, 0.0);
    }
}
