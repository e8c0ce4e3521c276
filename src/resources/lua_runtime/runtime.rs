//! Lua runtime core implementation.
//!
//! This module contains the `LuaRuntime` struct which owns the Lua state and
//! provides the `engine` table API to Lua scripts.

use std::cell::RefCell;

use bevy_ecs::entity::Entity;
use log::{error, info, warn};
use mlua::prelude::*;
use mlua::{FromLua, IntoLua, Variadic};

use super::commands::ScriptCmd;
use crate::events::{Event, EventArg};
use crate::resources::scheduler::CallIndexAllocator;

/// Shared state accessible from Lua function closures.
/// Stored in Lua's app_data so `engine.*` functions can queue commands.
pub(super) struct LuaAppData {
    commands: RefCell<Vec<ScriptCmd>>,
    /// Shared with the scheduler so `engine.async` can return its id at once.
    indices: CallIndexAllocator,
}

pub struct LuaRuntime {
    lua: Lua,
}

fn push_command(lua: &Lua, cmd: ScriptCmd) -> LuaResult<()> {
    lua.app_data_ref::<LuaAppData>()
        .ok_or_else(|| LuaError::runtime("LuaAppData not found"))?
        .commands
        .borrow_mut()
        .push(cmd);
    Ok(())
}

/// Registers a Lua function that pushes a command to the queue in `LuaAppData`.
macro_rules! register_cmd {
    ($engine:expr, $lua:expr, $name:expr, |$args:pat_param| $arg_ty:ty, $cmd:expr) => {
        $engine.set(
            $name,
            $lua.create_function(|lua, $args: $arg_ty| push_command(lua, $cmd))?,
        )?;
    };
}

/// `engine` functions whose result the caller needs. They only work while the
/// engine is running Lua; outside of that they raise an error.
pub const HOSTED_FUNCTIONS: [&str; 3] = ["fire", "cancel_async", "cancel_debouncer"];

fn register_hosted_placeholders(lua: &Lua, engine: &LuaTable) -> LuaResult<()> {
    for name in HOSTED_FUNCTIONS {
        engine.set(
            name,
            lua.create_function(move |_, _: LuaMultiValue| -> LuaResult<()> {
                Err(LuaError::runtime(format!(
                    "engine.{name} can only be called while the engine runs Lua"
                )))
            })?,
        )?;
    }
    Ok(())
}

/// Accepts either one event name or a sequence of names.
fn event_names(value: LuaValue) -> LuaResult<Vec<String>> {
    match value {
        LuaValue::String(s) => Ok(vec![s.to_str()?.to_string()]),
        LuaValue::Table(t) => t.sequence_values::<String>().collect(),
        other => Err(LuaError::runtime(format!(
            "expected event name or list of names, got {}",
            other.type_name()
        ))),
    }
}

impl IntoLua for EventArg {
    fn into_lua(self, lua: &Lua) -> LuaResult<LuaValue> {
        match self {
            EventArg::Nil => Ok(LuaValue::Nil),
            EventArg::Bool(b) => Ok(LuaValue::Boolean(b)),
            EventArg::Int(i) => i.into_lua(lua),
            EventArg::Number(n) => Ok(LuaValue::Number(n)),
            EventArg::Str(s) => s.into_lua(lua),
            EventArg::Entity(e) => e.to_bits().into_lua(lua),
        }
    }
}

impl FromLua for EventArg {
    fn from_lua(value: LuaValue, _lua: &Lua) -> LuaResult<Self> {
        match value {
            LuaValue::Nil => Ok(EventArg::Nil),
            LuaValue::Boolean(b) => Ok(EventArg::Bool(b)),
            LuaValue::Integer(i) => Ok(EventArg::Int(i as i64)),
            LuaValue::Number(n) => Ok(EventArg::Number(n)),
            LuaValue::String(s) => Ok(EventArg::Str(s.to_str()?.to_string())),
            other => Err(LuaError::runtime(format!(
                "unsupported event argument type: {}",
                other.type_name()
            ))),
        }
    }
}

impl LuaRuntime {
    /// Creates a new Lua runtime and registers the `engine` table.
    ///
    /// # Errors
    ///
    /// Returns an error if Lua initialization or API registration fails.
    pub fn new(indices: CallIndexAllocator) -> LuaResult<Self> {
        let lua = Lua::new();
        lua.set_app_data(LuaAppData {
            commands: RefCell::new(Vec::new()),
            indices,
        });

        let runtime = Self { lua };
        runtime.register_base_api()?;
        runtime.register_event_api()?;
        runtime.register_schedule_api()?;
        runtime.register_entity_api()?;
        Ok(runtime)
    }

    /// Registers the base `engine` table with logging functions.
    fn register_base_api(&self) -> LuaResult<()> {
        let engine = self.lua.create_table()?;

        // engine.log(message) - General purpose logging
        engine.set(
            "log",
            self.lua.create_function(|_, msg: String| {
                info!(target: "lua", "{}", msg);
                Ok(())
            })?,
        )?;
        engine.set(
            "log_info",
            self.lua.create_function(|_, msg: String| {
                info!(target: "lua", "{}", msg);
                Ok(())
            })?,
        )?;
        engine.set(
            "log_warn",
            self.lua.create_function(|_, msg: String| {
                warn!(target: "lua", "{}", msg);
                Ok(())
            })?,
        )?;
        engine.set(
            "log_error",
            self.lua.create_function(|_, msg: String| {
                error!(target: "lua", "{}", msg);
                Ok(())
            })?,
        )?;

        self.lua.globals().set("engine", engine)?;
        Ok(())
    }

    /// `on`, `off`, `fire_late`, `set_handler`, plus the `fire` placeholder.
    fn register_event_api(&self) -> LuaResult<()> {
        let engine: LuaTable = self.lua.globals().get("engine")?;

        // engine.on(id, name|{names}, fn, once?, priority?) -> fn
        engine.set(
            "on",
            self.lua.create_function(
                |lua, (entity_id, events, handler, once, priority): (u64, LuaValue, LuaFunction, Option<bool>, Option<i32>)| {
                    push_command(
                        lua,
                        ScriptCmd::On {
                            entity_id,
                            events: event_names(events)?,
                            handler: handler.clone(),
                            once: once.unwrap_or(false),
                            priority: priority.unwrap_or(0),
                        },
                    )?;
                    Ok(handler)
                },
            )?,
        )?;

        // engine.off(id, name|{names}, fn?)
        engine.set(
            "off",
            self.lua.create_function(
                |lua, (entity_id, events, handler): (u64, LuaValue, Option<LuaFunction>)| {
                    push_command(
                        lua,
                        ScriptCmd::Off {
                            entity_id,
                            events: event_names(events)?,
                            handler,
                        },
                    )
                },
            )?,
        )?;

        register_cmd!(engine, self.lua, "fire_late",
            |(entity_id, event, args)| (u64, String, Variadic<EventArg>),
            ScriptCmd::FireLate { entity_id, event, args: args.to_vec() });
        register_cmd!(engine, self.lua, "set_handler",
            |(entity_id, event, handler)| (u64, String, Option<LuaFunction>),
            ScriptCmd::SetHandler { entity_id, event, handler });
        register_hosted_placeholders(&self.lua, &engine)
    }

    /// `async`, `cancel_async`, `debounce`, `cancel_debouncer`.
    fn register_schedule_api(&self) -> LuaResult<()> {
        let engine: LuaTable = self.lua.globals().get("engine")?;

        // engine.async(id, fn, delay?, unscaled?) -> call id
        engine.set(
            "async",
            self.lua.create_function(
                |lua, (entity_id, handler, delay, unscaled): (u64, LuaFunction, Option<f32>, Option<bool>)| {
                    let index = lua
                        .app_data_ref::<LuaAppData>()
                        .ok_or_else(|| LuaError::runtime("LuaAppData not found"))?
                        .indices
                        .next();
                    push_command(
                        lua,
                        ScriptCmd::Async {
                            entity_id,
                            index,
                            handler,
                            delay: delay.unwrap_or(0.0),
                            unscaled: unscaled.unwrap_or(false),
                        },
                    )?;
                    Ok(index)
                },
            )?,
        )?;

        register_cmd!(engine, self.lua, "debounce",
            |(entity_id, key, handler, delay, unscaled)| (u64, String, LuaFunction, Option<f32>, Option<bool>),
            ScriptCmd::Debounce { entity_id, key, handler, delay, unscaled: unscaled.unwrap_or(false) });
        Ok(())
    }

    /// `set_active`, `set_tween_running`, `set_property`.
    fn register_entity_api(&self) -> LuaResult<()> {
        let engine: LuaTable = self.lua.globals().get("engine")?;
        register_cmd!(engine, self.lua, "set_active",
            |(entity_id, active)| (u64, bool),
            ScriptCmd::SetActive { entity_id, active });
        register_cmd!(engine, self.lua, "set_tween_running",
            |(tween_id, running)| (u64, bool),
            ScriptCmd::SetTweenRunning { tween_id, running });
        register_cmd!(engine, self.lua, "set_property",
            |(entity_id, name, value)| (u64, String, f32),
            ScriptCmd::SetProperty { entity_id, name, value });
        Ok(())
    }

    /// Drains all queued script commands, oldest first.
    pub fn drain_commands(&self) -> Vec<ScriptCmd> {
        self.lua
            .app_data_ref::<LuaAppData>()
            .map(|data| data.commands.borrow_mut().drain(..).collect())
            .unwrap_or_default()
    }

    pub fn has_pending_commands(&self) -> bool {
        self.lua
            .app_data_ref::<LuaAppData>()
            .is_some_and(|data| !data.commands.borrow().is_empty())
    }

    /// Calls a Lua listener as `fn(entity_id, event_name, ...args)`.
    ///
    /// Returns `Ok(false)` if the listener returned exactly `false`, which
    /// stops the event.
    pub fn call_listener(&self, func: &LuaFunction, entity: Entity, event: &Event) -> LuaResult<bool> {
        let args: Variadic<EventArg> = event.args().iter().cloned().collect();
        let result: LuaValue = func.call((entity.to_bits(), event.name(), args))?;
        Ok(!matches!(result, LuaValue::Boolean(false)))
    }

    /// Executes a chunk of Lua source.
    pub fn exec(&self, source: &str, chunk_name: &str) -> LuaResult<()> {
        self.lua.load(source).set_name(chunk_name).exec()
    }

    /// Loads and executes a Lua script from a file path.
    pub fn run_script(&self, path: &str) -> LuaResult<()> {
        let script = std::fs::read_to_string(path)
            .map_err(|e| LuaError::ExternalError(std::sync::Arc::new(e)))?;
        self.exec(&script, path)
    }

    /// Looks up a global table, `None` if absent or not a table.
    pub fn global_table(&self, name: &str) -> LuaResult<Option<LuaTable>> {
        match self.lua.globals().get::<LuaValue>(name)? {
            LuaValue::Table(t) => Ok(Some(t)),
            _ => Ok(None),
        }
    }

    /// The global `engine` table.
    pub fn api_table(&self) -> LuaResult<LuaTable> {
        self.lua.globals().get("engine")
    }

    /// Returns a reference to the underlying Lua state.
    pub fn lua(&self) -> &Lua {
        &self.lua
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime() -> LuaRuntime {
        LuaRuntime::new(CallIndexAllocator::default()).unwrap()
    }

    #[test]
    fn test_engine_table_has_api() {
        let rt = runtime();
        let engine: LuaTable = rt.lua().globals().get("engine").unwrap();
        for name in [
            "log", "log_info", "log_warn", "log_error", "on", "off", "fire", "fire_late",
            "async", "cancel_async", "debounce", "cancel_debouncer", "set_handler",
            "set_active", "set_tween_running", "set_property",
        ] {
            assert!(engine.get::<LuaFunction>(name).is_ok(), "missing engine.{name}");
        }
    }

    #[test]
    fn test_fire_late_queues_command_with_args() {
        let rt = runtime();
        rt.exec(r#"engine.fire_late(7, "hit", 3, "left", true)"#, "test").unwrap();
        let cmds = rt.drain_commands();
        assert_eq!(cmds.len(), 1);
        match &cmds[0] {
            ScriptCmd::FireLate { entity_id, event, args } => {
                assert_eq!(*entity_id, 7);
                assert_eq!(event, "hit");
                assert_eq!(args.len(), 3);
                assert_eq!(args[0].as_number(), Some(3.0));
                assert_eq!(args[1].as_str(), Some("left"));
                assert_eq!(args[2].as_bool(), Some(true));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(!rt.has_pending_commands());
    }

    #[test]
    fn test_on_accepts_name_list_and_returns_handler() {
        let rt = runtime();
        rt.exec(
            r#"
            local f = function() end
            returned_same = engine.on(1, {"a", "b"}, f, true, 3) == f
            "#,
            "test",
        )
        .unwrap();
        assert!(rt.lua().globals().get::<bool>("returned_same").unwrap());
        match &rt.drain_commands()[0] {
            ScriptCmd::On { events, once, priority, .. } => {
                assert_eq!(events, &vec!["a".to_string(), "b".to_string()]);
                assert!(*once);
                assert_eq!(*priority, 3);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_async_returns_increasing_ids() {
        let indices = CallIndexAllocator::default();
        indices.next();
        let rt = LuaRuntime::new(indices).unwrap();
        rt.exec(
            r#"
            first = engine.async(1, function() end, 0.5)
            second = engine.async(1, function() end)
            "#,
            "test",
        )
        .unwrap();
        assert_eq!(rt.lua().globals().get::<u64>("first").unwrap(), 2);
        assert_eq!(rt.lua().globals().get::<u64>("second").unwrap(), 3);
        assert_eq!(rt.drain_commands().len(), 2);
    }

    #[test]
    fn test_unsupported_event_arg_is_error() {
        let rt = runtime();
        let result = rt.exec(r#"engine.fire_late(1, "x", {})"#, "test");
        assert!(result.is_err());
        assert!(rt.drain_commands().is_empty());
    }

    #[test]
    fn test_hosted_functions_fail_without_engine() {
        let rt = runtime();
        for name in HOSTED_FUNCTIONS {
            let source = format!("engine.{name}(1, 'x')");
            assert!(rt.exec(&source, "test").is_err(), "engine.{name} ran unhosted");
        }
        assert!(rt.drain_commands().is_empty());
    }

    #[test]
    fn test_call_listener_stop_convention() {
        let rt = runtime();
        let mut world = bevy_ecs::world::World::new();
        let e = world.spawn_empty().id();
        let stopper: LuaFunction = rt.lua().load("return function() return false end").eval().unwrap();
        let passer: LuaFunction = rt.lua().load("return function() end").eval().unwrap();
        let ev = Event::new("ping").with_arg(1i64);
        assert!(!rt.call_listener(&stopper, e, &ev).unwrap());
        assert!(rt.call_listener(&passer, e, &ev).unwrap());
    }

    #[test]
    fn test_missing_global_table_is_none() {
        let rt = runtime();
        assert!(rt.global_table("Nope").unwrap().is_none());
        rt.exec("Spinner = { speed = 2 }", "test").unwrap();
        assert!(rt.global_table("Spinner").unwrap().is_some());
    }
}
