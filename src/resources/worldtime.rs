use bevy_ecs::prelude::Resource;

/// Simulation clock, advanced once per frame by
/// [`update_world_time`](crate::systems::time::update_world_time).
#[derive(Resource, Clone, Copy, Debug)]
pub struct WorldTime {
    pub elapsed: f32,
    /// Scaled frame delta.
    pub delta: f32,
    /// Frame delta before `time_scale`.
    pub unscaled_delta: f32,
    pub time_scale: f32,
    pub frame_count: u64,
}

impl Default for WorldTime {
    fn default() -> Self {
        WorldTime {
            elapsed: 0.0,
            delta: 0.0,
            unscaled_delta: 0.0,
            time_scale: 1.0,
            frame_count: 0,
        }
    }
}

impl WorldTime {
    /// Delta for the clock selected by `unscaled`.
    pub fn delta_for(&self, unscaled: bool) -> f32 {
        if unscaled {
            self.unscaled_delta
        } else {
            self.delta
        }
    }
}
