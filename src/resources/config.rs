//! Engine configuration resource.
//!
//! Settings loaded from an INI file or string. Defaults are safe to run with;
//! missing keys keep their current value.
//!
//! # Configuration File Format
//!
//! ```ini
//! [time]
//! time_scale = 1.0
//! max_delta = 0.25
//!
//! [tween]
//! default_easing = linear
//!
//! [events]
//! trace = false
//! ```

use std::path::Path;

use bevy_ecs::prelude::*;
use configparser::ini::Ini;
use log::info;

use crate::components::tween::{Easing, parse_easing};

const DEFAULT_TIME_SCALE: f32 = 1.0;
const DEFAULT_MAX_DELTA: f32 = 0.25;

#[derive(Resource, Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Multiplier applied to the frame delta for the scaled clock.
    pub time_scale: f32,
    /// Upper bound for a single frame delta, in seconds.
    pub max_delta: f32,
    /// Easing used by tweens created without an explicit one.
    pub default_easing: Easing,
    /// Log every fired event at trace level.
    pub trace_events: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    /// Create a new configuration with safe default values.
    pub fn new() -> Self {
        Self {
            time_scale: DEFAULT_TIME_SCALE,
            max_delta: DEFAULT_MAX_DELTA,
            default_easing: Easing::Linear,
            trace_events: false,
        }
    }

    /// Parse settings from INI text on top of the defaults.
    pub fn from_ini_str(text: &str) -> Result<Self, String> {
        let mut config = Self::new();
        let mut ini = Ini::new();
        ini.read(text.to_string())
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.apply(&ini);
        Ok(config)
    }

    /// Load configuration from an INI file.
    ///
    /// Missing values retain their current values.
    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<(), String> {
        let mut ini = Ini::new();
        ini.load(path.as_ref())
            .map_err(|e| format!("Failed to load config file: {}", e))?;
        self.apply(&ini);

        info!(
            "Loaded config: time_scale={}, max_delta={}, default_easing={:?}, trace_events={}",
            self.time_scale, self.max_delta, self.default_easing, self.trace_events
        );
        Ok(())
    }

    pub fn to_ini_string(&self) -> String {
        let mut ini = Ini::new();
        ini.set("time", "time_scale", Some(self.time_scale.to_string()));
        ini.set("time", "max_delta", Some(self.max_delta.to_string()));
        ini.set("tween", "default_easing", Some(easing_name(self.default_easing).to_string()));
        ini.set("events", "trace", Some(self.trace_events.to_string()));
        ini.writes()
    }

    fn apply(&mut self, ini: &Ini) {
        // [time] section
        if let Some(scale) = ini.getfloat("time", "time_scale").ok().flatten() {
            self.time_scale = scale as f32;
        }
        if let Some(max) = ini.getfloat("time", "max_delta").ok().flatten() {
            self.max_delta = max as f32;
        }

        // [tween] section
        if let Some(name) = ini.get("tween", "default_easing") {
            self.default_easing = parse_easing(name.trim());
        }

        // [events] section
        if let Some(trace) = ini.getbool("events", "trace").ok().flatten() {
            self.trace_events = trace;
        }
    }
}

fn easing_name(easing: Easing) -> &'static str {
    match easing {
        Easing::Linear => "linear",
        Easing::QuadIn => "quad_in",
        Easing::QuadOut => "quad_out",
        Easing::QuadInOut => "quad_in_out",
        Easing::CubicIn => "cubic_in",
        Easing::CubicOut => "cubic_out",
        Easing::CubicInOut => "cubic_in_out",
        Easing::SineIn => "sine_in",
        Easing::SineOut => "sine_out",
        Easing::SineInOut => "sine_in_out",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.time_scale, 1.0);
        assert_eq!(config.max_delta, 0.25);
        assert_eq!(config.default_easing, Easing::Linear);
        assert!(!config.trace_events);
    }

    #[test]
    fn test_from_ini_str_overrides_present_keys() {
        let text = "[time]\ntime_scale = 0.5\n\n[tween]\ndefault_easing = quad_out\n";
        let config = EngineConfig::from_ini_str(text).unwrap();
        assert_eq!(config.time_scale, 0.5);
        assert_eq!(config.max_delta, 0.25);
        assert_eq!(config.default_easing, Easing::QuadOut);
        assert!(!config.trace_events);
    }

    #[test]
    fn test_unknown_easing_falls_back_to_linear() {
        let config = EngineConfig::from_ini_str("[tween]\ndefault_easing = wobbly\n").unwrap();
        assert_eq!(config.default_easing, Easing::Linear);
    }

    #[test]
    fn test_ini_string_round_trip() {
        let config = EngineConfig {
            time_scale: 2.0,
            max_delta: 0.1,
            default_easing: Easing::SineInOut,
            trace_events: true,
        };
        let parsed = EngineConfig::from_ini_str(&config.to_ini_string()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let mut config = EngineConfig::new();
        assert!(config.load_from_file("/nonexistent/engine.ini").is_err());
        assert_eq!(config, EngineConfig::new());
    }
}
