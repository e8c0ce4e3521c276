//! Commands queued by the `engine` Lua table.
//!
//! Lua functions that only change engine state push a [`ScriptCmd`]; the
//! engine applies the queue right after the Lua callback returns, or before
//! any synchronous `engine.fire` / `engine.cancel_*` call so their effects
//! stay in script order. Entity handles cross the boundary as `u64` bits.

use mlua::prelude::LuaFunction;

use crate::events::EventArg;

#[derive(Debug, Clone)]
pub enum ScriptCmd {
    On {
        entity_id: u64,
        events: Vec<String>,
        handler: LuaFunction,
        once: bool,
        priority: i32,
    },
    Off {
        entity_id: u64,
        events: Vec<String>,
        handler: Option<LuaFunction>,
    },
    FireLate {
        entity_id: u64,
        event: String,
        args: Vec<EventArg>,
    },
    /// `index` was allocated when the script called `engine.async`.
    Async {
        entity_id: u64,
        index: u64,
        handler: LuaFunction,
        delay: f32,
        unscaled: bool,
    },
    Debounce {
        entity_id: u64,
        key: String,
        handler: LuaFunction,
        delay: Option<f32>,
        unscaled: bool,
    },
    SetHandler {
        entity_id: u64,
        event: String,
        handler: Option<LuaFunction>,
    },
    /// Node or behavior active flag.
    SetActive { entity_id: u64, active: bool },
    SetTweenRunning { tween_id: u64, running: bool },
    SetProperty {
        entity_id: u64,
        name: String,
        value: f32,
    },
}
