//! Behaviors implemented by a Lua table.
//!
//! ```lua
//! Spinner = {}
//!
//! function Spinner:attached(me, owner)
//!     engine.log("spinner on " .. owner)
//! end
//!
//! function Spinner:update(me, owner, name, dt)
//!     engine.set_property(owner, "rotation", dt * 90)
//! end
//!
//! -- any other event name
//! function Spinner:onEvent(me, owner, name, ...)
//! end
//! ```
//!
//! Hook functions are looked up once, when the behavior is created. Each is
//! called as `fn(table, me, owner, event_name, ...args)`; returning `false`
//! stops the event.

use std::any::Any;

use bevy_ecs::entity::Entity;
use log::{error, warn};
use mlua::Variadic;
use mlua::prelude::*;

use super::{Behavior, BehaviorEvents};
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::events::{Event, EventArg, names};
use crate::resources::lua_runtime::LuaRuntime;

const ON_EVENT: &str = "onEvent";

const HOOK_NAMES: [(BehaviorEvents, &str); 8] = [
    (BehaviorEvents::ATTACHED, names::ATTACHED),
    (BehaviorEvents::DETACHED, names::DETACHED),
    (BehaviorEvents::ACTIVE_CHANGED, names::ACTIVE_CHANGED),
    (BehaviorEvents::UPDATE, names::UPDATE),
    (BehaviorEvents::LATE_UPDATE, names::LATE_UPDATE),
    (BehaviorEvents::RENDER, names::RENDER),
    (BehaviorEvents::PRE_PHYSICS, names::PRE_PHYSICS),
    (BehaviorEvents::POST_PHYSICS, names::POST_PHYSICS),
];

pub struct ScriptBehavior {
    table_name: String,
    table: LuaTable,
    hooks: Vec<(BehaviorEvents, LuaFunction)>,
    on_event: Option<LuaFunction>,
    handles: BehaviorEvents,
}

impl ScriptBehavior {
    pub fn from_table(table_name: &str, table: LuaTable) -> LuaResult<Self> {
        let mut hooks = Vec::new();
        let mut handles = BehaviorEvents::empty();
        for (flag, key) in HOOK_NAMES {
            if let LuaValue::Function(func) = table.get::<LuaValue>(key)? {
                hooks.push((flag, func));
                handles |= flag;
            }
        }
        let on_event = match table.get::<LuaValue>(ON_EVENT)? {
            LuaValue::Function(func) => {
                handles |= BehaviorEvents::CUSTOM;
                Some(func)
            }
            _ => None,
        };
        Ok(Self {
            table_name: table_name.to_string(),
            table,
            hooks,
            on_event,
            handles,
        })
    }

    /// Resolve the global table `table_name`.
    pub fn from_global(runtime: &LuaRuntime, table_name: &str) -> EngineResult<Self> {
        match runtime.global_table(table_name)? {
            Some(table) => Ok(Self::from_table(table_name, table)?),
            None => {
                warn!("script behavior table '{}' not found", table_name);
                Err(EngineError::MissingResource(table_name.to_string()))
            }
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn table(&self) -> &LuaTable {
        &self.table
    }

    fn hook(&self, flag: BehaviorEvents) -> Option<&LuaFunction> {
        if flag == BehaviorEvents::CUSTOM {
            return self.on_event.as_ref();
        }
        self.hooks.iter().find(|(f, _)| *f == flag).map(|(_, func)| func)
    }

    /// Returns `false` if the hook asked to stop the event.
    fn call(
        &self,
        engine: &mut Engine,
        func: &LuaFunction,
        me: Entity,
        owner: Option<Entity>,
        name: &str,
        args: &[EventArg],
    ) -> bool {
        let args: Variadic<EventArg> = args.iter().cloned().collect();
        let result = engine.call_lua(|_| {
            func.call::<LuaValue>((
                self.table.clone(),
                me.to_bits(),
                owner.map(|o| o.to_bits()),
                name,
                args,
            ))
        });
        match result {
            Ok(LuaValue::Boolean(false)) => false,
            Ok(_) => true,
            Err(err) => {
                error!("{}.{} failed: {}", self.table_name, name, err);
                true
            }
        }
    }

    fn call_lifecycle(&self, engine: &mut Engine, flag: BehaviorEvents, me: Entity, owner: Option<Entity>, name: &str) {
        if let Some(func) = self.hook(flag) {
            self.call(engine, func, me, owner, name, &[]);
        }
    }
}

impl Behavior for ScriptBehavior {
    fn type_name(&self) -> &'static str {
        "ScriptBehavior"
    }

    fn handles(&self) -> BehaviorEvents {
        self.handles
    }

    fn attached(&mut self, engine: &mut Engine, me: Entity, owner: Entity) {
        self.call_lifecycle(engine, BehaviorEvents::ATTACHED, me, Some(owner), names::ATTACHED);
    }

    fn detached(&mut self, engine: &mut Engine, me: Entity, owner: Entity) {
        self.call_lifecycle(engine, BehaviorEvents::DETACHED, me, Some(owner), names::DETACHED);
    }

    fn active_changed(&mut self, engine: &mut Engine, me: Entity, owner: Option<Entity>) {
        self.call_lifecycle(engine, BehaviorEvents::ACTIVE_CHANGED, me, owner, names::ACTIVE_CHANGED);
    }

    fn on_event(&mut self, engine: &mut Engine, me: Entity, owner: Option<Entity>, event: &mut Event) {
        let flag = BehaviorEvents::from_name(event.name());
        let Some(func) = self.hook(flag) else {
            return;
        };
        if !self.call(engine, func, me, owner, event.name(), event.args()) {
            event.stop();
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
