//! Lua host wiring: applying queued script commands and calling Lua
//! callbacks on behalf of entities.
//!
//! Every entry into Lua goes through [`Engine::call_lua`], which binds the
//! synchronous `engine.fire`, `engine.cancel_async` and
//! `engine.cancel_debouncer` to this engine for the duration of the call.

use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use bevy_ecs::entity::Entity;
use log::{debug, error, warn};
use mlua::Variadic;
use mlua::prelude::*;

use super::Engine;
use crate::behavior::script::ScriptBehavior;
use crate::error::{EngineError, EngineResult};
use crate::events::{Callback, Event, EventArg};
use crate::resources::config::EngineConfig;
use crate::resources::lua_runtime::{HOSTED_FUNCTIONS, LuaRuntime, ScriptCmd};

/// Entity ids cross into Lua as `u64` bits. Rejects bit patterns that cannot
/// name an entity instead of panicking on them.
pub(crate) fn entity_from_id(id: u64) -> Option<Entity> {
    if id as u32 == u32::MAX {
        return None;
    }
    Some(Entity::from_bits(id))
}

fn report<T>(op: &str, result: EngineResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            debug!("lua {} failed: {}", op, err);
            None
        }
    }
}

/// A hosted function reached through a stale reference while an inner call
/// holds the engine.
fn host_mut<'a, 'e>(host: &'a RefCell<&'e mut Engine>) -> LuaResult<RefMut<'a, &'e mut Engine>> {
    host.try_borrow_mut()
        .map_err(|_| LuaError::runtime("engine is busy: use the current engine table"))
}

impl Engine {
    /// An engine with a Lua runtime whose `engine.async` ids come from the
    /// scheduler's own allocator.
    pub fn with_scripting(config: EngineConfig) -> EngineResult<Self> {
        let mut engine = Self::new(config);
        let runtime = LuaRuntime::new(engine.scheduler.indices().clone())?;
        engine.script = Some(Rc::new(runtime));
        Ok(engine)
    }

    pub fn script(&self) -> Option<&LuaRuntime> {
        self.script.as_deref()
    }

    fn runtime(&self) -> EngineResult<&LuaRuntime> {
        self.script.as_deref().ok_or_else(|| {
            warn!("no Lua runtime attached to the engine");
            EngineError::MissingResource("lua runtime".into())
        })
    }

    /// Run a chunk of Lua, then apply whatever it queued.
    pub fn run_script_str(&mut self, source: &str, chunk_name: &str) -> EngineResult<()> {
        self.runtime()?;
        self.call_lua(|runtime| runtime.exec(source, chunk_name)).map_err(|err| {
            error!("script '{}' failed: {}", chunk_name, err);
            EngineError::from(err)
        })
    }

    pub fn run_script_file(&mut self, path: &str) -> EngineResult<()> {
        self.runtime()?;
        self.call_lua(|runtime| runtime.run_script(path)).map_err(|err| {
            error!("script '{}' failed: {}", path, err);
            EngineError::from(err)
        })
    }

    /// Build a [`ScriptBehavior`] from the global Lua table `table_name`.
    pub fn create_script_behavior(&mut self, table_name: &str) -> EngineResult<Entity> {
        let behavior = ScriptBehavior::from_global(self.runtime()?, table_name)?;
        Ok(self.create_behavior(behavior))
    }

    /// Run `body` with the synchronous `engine` functions bound to this
    /// engine, then apply whatever Lua queued.
    pub(crate) fn call_lua<R>(&mut self, body: impl FnOnce(&LuaRuntime) -> LuaResult<R>) -> LuaResult<R> {
        let Some(runtime) = self.script.clone() else {
            return Err(LuaError::runtime("no Lua runtime attached to the engine"));
        };
        let result = self.with_hosted_api(&runtime, body);
        self.apply_script_commands();
        result
    }

    /// Nested calls install their own bindings and restore the outer ones on
    /// the way out; the scope invalidates this call's bindings when it ends.
    fn with_hosted_api<R>(
        &mut self,
        runtime: &LuaRuntime,
        body: impl FnOnce(&LuaRuntime) -> LuaResult<R>,
    ) -> LuaResult<R> {
        let api = runtime.api_table()?;
        let saved = HOSTED_FUNCTIONS
            .iter()
            .map(|name| api.get::<LuaValue>(*name))
            .collect::<LuaResult<Vec<_>>>()?;
        let host = RefCell::new(self);

        let result = runtime.lua().scope(|scope| {
            // engine.fire(id, name, ...) -> false if stopped
            api.set(
                "fire",
                scope.create_function(|_, (id, name, args): (u64, String, Variadic<EventArg>)| {
                    Ok(host_mut(&host)?.script_fire(id, &name, args.to_vec()))
                })?,
            )?;
            // engine.cancel_async(id, index?) -> bool
            api.set(
                "cancel_async",
                scope.create_function(|_, (id, index): (u64, Option<u64>)| {
                    Ok(host_mut(&host)?.script_cancel_async(id, index))
                })?,
            )?;
            // engine.cancel_debouncer(id, key?) -> bool
            api.set(
                "cancel_debouncer",
                scope.create_function(|_, (id, key): (u64, Option<String>)| {
                    Ok(host_mut(&host)?.script_cancel_debouncer(id, key.as_deref()))
                })?,
            )?;
            body(runtime)
        });

        let restored = HOSTED_FUNCTIONS
            .iter()
            .zip(saved)
            .try_for_each(|(name, value)| api.set(*name, value));
        result.and_then(|value| restored.map(|()| value))
    }

    /// Commands queued earlier in the same chunk run first so the event sees
    /// them.
    fn script_fire(&mut self, id: u64, name: &str, args: Vec<EventArg>) -> bool {
        self.apply_script_commands();
        let Some(target) = self.script_entity(id) else {
            return false;
        };
        report("fire", self.fire(target, name, args)).unwrap_or(false)
    }

    fn script_cancel_async(&mut self, id: u64, index: Option<u64>) -> bool {
        self.apply_script_commands();
        self.script_entity(id)
            .is_some_and(|owner| self.cancel_async(owner, index))
    }

    fn script_cancel_debouncer(&mut self, id: u64, key: Option<&str>) -> bool {
        self.apply_script_commands();
        self.script_entity(id)
            .is_some_and(|owner| self.cancel_debouncer(owner, key))
    }

    /// Apply queued script commands until the queue stays empty. Returns how
    /// many were applied.
    pub fn apply_script_commands(&mut self) -> usize {
        let mut applied = 0;
        loop {
            let commands = match &self.script {
                Some(runtime) => runtime.drain_commands(),
                None => return applied,
            };
            if commands.is_empty() {
                return applied;
            }
            for cmd in commands {
                self.apply_script_command(cmd);
                applied += 1;
            }
        }
    }

    fn apply_script_command(&mut self, cmd: ScriptCmd) {
        match cmd {
            ScriptCmd::On {
                entity_id,
                events,
                handler,
                once,
                priority,
            } => {
                let Some(entity) = self.script_entity(entity_id) else {
                    return;
                };
                let callback = Callback::Lua(handler);
                for name in &events {
                    report("on", self.on(entity, name, callback.clone(), once, priority));
                }
            }
            ScriptCmd::Off {
                entity_id,
                events,
                handler,
            } => {
                let Some(entity) = self.script_entity(entity_id) else {
                    return;
                };
                let callback = handler.map(Callback::Lua);
                for name in &events {
                    self.off(entity, name, callback.as_ref());
                }
            }
            ScriptCmd::FireLate {
                entity_id,
                event,
                args,
            } => {
                if let Some(entity) = self.script_entity(entity_id) {
                    report("fire_late", self.fire_late(entity, &event, args));
                }
            }
            ScriptCmd::Async {
                entity_id,
                index,
                handler,
                delay,
                unscaled,
            } => {
                if let Some(entity) = self.script_entity(entity_id) {
                    self.scheduler
                        .add_async_with_index(entity, Callback::Lua(handler), delay, unscaled, index);
                }
            }
            ScriptCmd::Debounce {
                entity_id,
                key,
                handler,
                delay,
                unscaled,
            } => {
                if let Some(entity) = self.script_entity(entity_id) {
                    report(
                        "debounce",
                        self.debounce(entity, &key, Callback::Lua(handler), delay, unscaled),
                    );
                }
            }
            ScriptCmd::SetHandler {
                entity_id,
                event,
                handler,
            } => {
                if let Some(entity) = self.script_entity(entity_id) {
                    report("set_handler", self.set_handler(entity, &event, handler.map(Callback::Lua)));
                }
            }
            ScriptCmd::SetActive { entity_id, active } => {
                let Some(entity) = self.script_entity(entity_id) else {
                    return;
                };
                if self.is_behavior(entity) {
                    report("set_active", self.set_behavior_active(entity, active));
                } else {
                    report("set_active", self.set_node_active(entity, active));
                }
            }
            ScriptCmd::SetTweenRunning { tween_id, running } => {
                if let Some(tween) = self.script_entity(tween_id) {
                    report("set_tween_running", self.set_tween_running(tween, running));
                }
            }
            ScriptCmd::SetProperty {
                entity_id,
                name,
                value,
            } => {
                if let Some(entity) = self.script_entity(entity_id) {
                    report("set_property", self.set_property(entity, &name, value));
                }
            }
        }
    }

    fn script_entity(&self, id: u64) -> Option<Entity> {
        match entity_from_id(id).filter(|e| self.is_alive(*e)) {
            Some(entity) => Some(entity),
            None => {
                warn!("lua referenced unknown entity id {}", id);
                None
            }
        }
    }

    /// Call a Lua listener. A `false` return stops the event; errors are
    /// logged and do not stop it.
    pub(crate) fn invoke_lua(&mut self, func: &LuaFunction, target: Entity, event: &mut Event) {
        if self.script.is_none() {
            warn!("lua callback on {} without a Lua runtime", target);
            return;
        }
        match self.call_lua(|runtime| runtime.call_listener(func, target, &*event)) {
            Ok(true) => {}
            Ok(false) => event.stop(),
            Err(err) => error!("lua listener for '{}' on {} failed: {}", event.name(), target, err),
        }
    }
}
