//! Lua scripting host.
//!
//! Scripts reach the engine through the global `engine` table. Calls that
//! only change engine state are queued as [`ScriptCmd`]s and applied once the
//! running Lua callback returns. `fire`, `cancel_async` and
//! `cancel_debouncer` run synchronously and return their result: the engine
//! binds them to itself for as long as it is running Lua.
//!
//! # Example
//!
//! ```lua
//! local function on_hit(id, name, damage)
//!     engine.log("hit for " .. damage)
//!     if damage > 10 then
//!         return false -- stop the event
//!     end
//! end
//!
//! engine.on(player, "hit", on_hit, false, 5)
//! if not engine.fire(player, "hit", 20) then
//!     engine.log("hit was stopped")
//! end
//! local id = engine.async(player, function() engine.fire(player, "hit", 1) end, 0.5)
//! engine.debounce(player, "save", function() engine.log("saved") end, 1.0)
//! ```

mod commands;
mod runtime;

pub use commands::ScriptCmd;
pub use runtime::{HOSTED_FUNCTIONS, LuaRuntime};
