//! Per-entity event listener registry.
//!
//! Each entity that has listeners owns one [`EventListenerRegistry`], mapping
//! event names to a priority-ordered list of registrations. Lower priorities
//! run first; equal priorities run in registration order.
//!
//! # Mutation during dispatch
//!
//! A dispatch walks the list by registration id instead of by iterator, so
//! listeners may call `on`/`off` on the list they are being dispatched from:
//!
//! - While any dispatch on the registry is in progress, removals only mark the
//!   registration as removed. Physical erasure happens when the outermost
//!   dispatch finishes.
//! - A removed registration is never invoked again, even later in the same
//!   pass. A registration that removes itself finishes its current invocation.
//! - A registration currently executing is skipped by nested dispatches.
//! - Registrations added during a dispatch run in that same pass if they land
//!   after the registration currently executing.

use rustc_hash::FxHashMap;

use super::callback::Callback;
use super::event::EventName;

#[derive(Debug)]
struct Registration {
    id: u64,
    callback: Callback,
    priority: i32,
    once: bool,
    executing: bool,
    removed: bool,
}

#[derive(Debug, Default)]
pub struct EventListenerRegistry {
    lists: FxHashMap<EventName, Vec<Registration>>,
    next_id: u64,
    dispatching: u32,
}

impl EventListenerRegistry {
    /// Register `callback` for `name`.
    ///
    /// Returns `false` (and changes nothing) if the same callback is already
    /// registered for that name.
    pub fn add(&mut self, name: &str, callback: Callback, once: bool, priority: i32) -> bool {
        if !self.lists.contains_key(name) {
            self.lists.insert(EventName::from(name), Vec::new());
        }
        let Some(list) = self.lists.get_mut(name) else {
            return false;
        };
        if list
            .iter()
            .any(|r| !r.removed && r.callback.same_as(&callback))
        {
            return false;
        }

        let position = list
            .iter()
            .position(|r| r.priority > priority)
            .unwrap_or(list.len());
        self.next_id += 1;
        list.insert(
            position,
            Registration {
                id: self.next_id,
                callback,
                priority,
                once,
                executing: false,
                removed: false,
            },
        );
        true
    }

    /// Remove `callback` from `name`, or every callback for `name` if `None`.
    ///
    /// Returns whether anything was removed.
    pub fn remove(&mut self, name: &str, callback: Option<&Callback>) -> bool {
        let Some(list) = self.lists.get_mut(name) else {
            return false;
        };
        let mut removed_any = false;
        for reg in list.iter_mut().filter(|r| !r.removed) {
            if callback.is_none_or(|c| reg.callback.same_as(c)) {
                reg.removed = true;
                removed_any = true;
            }
        }
        if self.dispatching == 0 {
            self.compact();
        }
        removed_any
    }

    /// Remove every registration for every event name.
    pub fn clear(&mut self) {
        for list in self.lists.values_mut() {
            for reg in list.iter_mut() {
                reg.removed = true;
            }
        }
        if self.dispatching == 0 {
            self.compact();
        }
    }

    /// Number of live registrations for `name`.
    pub fn listener_count(&self, name: &str) -> usize {
        self.lists
            .get(name)
            .map(|list| list.iter().filter(|r| !r.removed).count())
            .unwrap_or(0)
    }

    pub fn has_listeners(&self, name: &str) -> bool {
        self.listener_count(name) > 0
    }

    pub fn is_empty(&self) -> bool {
        self.lists
            .values()
            .all(|list| list.iter().all(|r| r.removed))
    }

    /// All live callbacks, in no particular order.
    pub fn callbacks(&self) -> impl Iterator<Item = &Callback> {
        self.lists
            .values()
            .flat_map(|list| list.iter())
            .filter(|r| !r.removed)
            .map(|r| &r.callback)
    }

    pub(crate) fn begin_dispatch(&mut self) {
        self.dispatching += 1;
    }

    pub(crate) fn end_dispatch(&mut self) {
        self.dispatching = self.dispatching.saturating_sub(1);
        if self.dispatching == 0 {
            self.compact();
        }
    }

    /// Find the next runnable registration after `after` (or from the start),
    /// mark it executing and hand out its callback.
    pub(crate) fn next_listener(
        &mut self,
        name: &str,
        after: Option<u64>,
    ) -> Option<(u64, Callback)> {
        let list = self.lists.get_mut(name)?;
        let start = match after {
            Some(id) => list.iter().position(|r| r.id == id)? + 1,
            None => 0,
        };
        let reg = list[start..]
            .iter_mut()
            .find(|r| !r.removed && !r.executing)?;
        reg.executing = true;
        Some((reg.id, reg.callback.clone()))
    }

    /// Clear the executing mark; `once` registrations are retired here.
    pub(crate) fn finish_listener(&mut self, name: &str, id: u64) {
        let Some(reg) = self
            .lists
            .get_mut(name)
            .and_then(|list| list.iter_mut().find(|r| r.id == id))
        else {
            return;
        };
        reg.executing = false;
        if reg.once {
            reg.removed = true;
        }
    }

    fn compact(&mut self) {
        for list in self.lists.values_mut() {
            list.retain(|r| !r.removed);
        }
        self.lists.retain(|_, list| !list.is_empty());
    }
}
