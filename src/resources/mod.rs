//! Long-lived engine state.
//!
//! Overview
//! - `config` – INI-backed engine settings
//! - `worldtime` – scaled and unscaled simulation clocks
//! - `scheduler` – per-owner async and debounced calls
//! - `tweens` – the set of running tweens
//! - `lua_runtime` – the Lua scripting host (feature `lua`)
pub mod config;
#[cfg(feature = "lua")]
pub mod lua_runtime;
pub mod scheduler;
pub mod tweens;
pub mod worldtime;
