//! Deferred call registry: one-shot delayed calls ("async") and keyed
//! debounced calls, grouped by owning entity.
//!
//! The registry never invokes callbacks itself. Each frame the engine asks
//! for the calls that came due ([`ScheduledCallEngine::collect_due`]) and then
//! claims them one by one with [`ScheduledCallEngine::take_if_due`] right
//! before invoking. A call cancelled or re-armed by an earlier callback of the
//! same pass is therefore never invoked, and calls created during the pass are
//! not part of it.

use std::cell::Cell;
use std::rc::Rc;

use bevy_ecs::entity::Entity;
use rustc_hash::FxHashMap;

use crate::events::Callback;

/// Hands out monotonically increasing call indices. Cloning shares the
/// counter, so the scripting host can allocate ids synchronously.
#[derive(Debug, Clone, Default)]
pub struct CallIndexAllocator(Rc<Cell<u64>>);

impl CallIndexAllocator {
    pub fn next(&self) -> u64 {
        let index = self.0.get() + 1;
        self.0.set(index);
        index
    }
}

/// One deferred invocation.
#[derive(Debug, Clone)]
pub struct ScheduledCall {
    pub target: Entity,
    pub callback: Callback,
    pub time_set: f32,
    pub time_left: f32,
    pub index: u64,
    pub unscaled_time: bool,
}

impl ScheduledCall {
    fn tick(&mut self, dt: f32, unscaled_dt: f32) -> bool {
        self.time_left -= if self.unscaled_time { unscaled_dt } else { dt };
        self.time_left <= 0.0
    }
}

/// A call that reached zero during [`ScheduledCallEngine::collect_due`].
#[derive(Debug, Clone, PartialEq)]
pub enum DueCall {
    Async { owner: Entity, index: u64 },
    Debounce { owner: Entity, key: String, index: u64 },
}

impl DueCall {
    pub fn index(&self) -> u64 {
        match self {
            DueCall::Async { index, .. } | DueCall::Debounce { index, .. } => *index,
        }
    }
}

#[derive(Debug, Default)]
pub struct ScheduledCallEngine {
    indices: CallIndexAllocator,
    asyncs: FxHashMap<Entity, Vec<ScheduledCall>>,
    debouncers: FxHashMap<Entity, Vec<(String, ScheduledCall)>>,
}

impl ScheduledCallEngine {
    pub fn new(indices: CallIndexAllocator) -> Self {
        Self {
            indices,
            ..Default::default()
        }
    }

    pub fn indices(&self) -> &CallIndexAllocator {
        &self.indices
    }

    /// Schedule `callback` on `owner` after `delay` seconds; returns its index.
    pub fn add_async(&mut self, owner: Entity, callback: Callback, delay: f32, unscaled: bool) -> u64 {
        let index = self.indices.next();
        self.add_async_with_index(owner, callback, delay, unscaled, index);
        index
    }

    /// Schedule with an index allocated beforehand from [`Self::indices`].
    pub fn add_async_with_index(
        &mut self,
        owner: Entity,
        callback: Callback,
        delay: f32,
        unscaled: bool,
        index: u64,
    ) {
        let delay = delay.max(0.0);
        self.asyncs.entry(owner).or_default().push(ScheduledCall {
            target: owner,
            callback,
            time_set: delay,
            time_left: delay,
            index,
            unscaled_time: unscaled,
        });
    }

    /// Cancel one pending async by index, or all of `owner`'s if `None`.
    pub fn cancel_async(&mut self, owner: Entity, index: Option<u64>) -> bool {
        let Some(list) = self.asyncs.get_mut(&owner) else {
            return false;
        };
        let before = list.len();
        match index {
            Some(index) => list.retain(|c| c.index != index),
            None => list.clear(),
        }
        let removed = list.len() != before;
        if list.is_empty() {
            self.asyncs.remove(&owner);
        }
        removed
    }

    /// Create or re-arm the debouncer `key` on `owner`.
    ///
    /// An existing debouncer keeps its index and gets the new callback. A
    /// positive `delay` replaces its delay and restarts the countdown from it;
    /// otherwise the countdown restarts from the delay it was created with.
    pub fn add_debouncer(
        &mut self,
        owner: Entity,
        key: &str,
        callback: Callback,
        delay: Option<f32>,
        unscaled: bool,
    ) {
        let list = self.debouncers.entry(owner).or_default();
        if let Some((_, call)) = list.iter_mut().find(|(k, _)| k == key) {
            call.callback = callback;
            call.unscaled_time = unscaled;
            match delay {
                Some(delay) if delay > 0.0 => {
                    call.time_set = delay;
                    call.time_left = delay;
                }
                _ => call.time_left = call.time_set,
            }
            return;
        }

        let delay = delay.unwrap_or(0.0).max(0.0);
        let index = self.indices.next();
        list.push((
            key.to_string(),
            ScheduledCall {
                target: owner,
                callback,
                time_set: delay,
                time_left: delay,
                index,
                unscaled_time: unscaled,
            },
        ));
    }

    /// Cancel one debouncer by key, or all of `owner`'s if `None`.
    pub fn cancel_debouncer(&mut self, owner: Entity, key: Option<&str>) -> bool {
        let Some(list) = self.debouncers.get_mut(&owner) else {
            return false;
        };
        let before = list.len();
        match key {
            Some(key) => list.retain(|(k, _)| k != key),
            None => list.clear(),
        }
        let removed = list.len() != before;
        if list.is_empty() {
            self.debouncers.remove(&owner);
        }
        removed
    }

    /// Drop every pending call of `owner`. Used on teardown.
    pub fn cancel_all(&mut self, owner: Entity) -> bool {
        let a = self.asyncs.remove(&owner).is_some();
        let d = self.debouncers.remove(&owner).is_some();
        a || d
    }

    pub fn pending_asyncs(&self, owner: Entity) -> usize {
        self.asyncs.get(&owner).map_or(0, Vec::len)
    }

    pub fn has_debouncer(&self, owner: Entity, key: &str) -> bool {
        self.debouncers
            .get(&owner)
            .is_some_and(|list| list.iter().any(|(k, _)| k == key))
    }

    pub fn is_empty(&self) -> bool {
        self.asyncs.is_empty() && self.debouncers.is_empty()
    }

    /// Owners with at least one pending call.
    pub fn owners(&self) -> Vec<Entity> {
        let mut owners: Vec<Entity> = self.asyncs.keys().chain(self.debouncers.keys()).copied().collect();
        owners.sort();
        owners.dedup();
        owners
    }

    /// Count every pending call down by its clock and report those that
    /// reached zero, ordered by index.
    pub fn collect_due(&mut self, dt: f32, unscaled_dt: f32) -> Vec<DueCall> {
        let mut due = Vec::new();
        for (owner, list) in self.asyncs.iter_mut() {
            for call in list.iter_mut() {
                if call.tick(dt, unscaled_dt) {
                    due.push(DueCall::Async {
                        owner: *owner,
                        index: call.index,
                    });
                }
            }
        }
        for (owner, list) in self.debouncers.iter_mut() {
            for (key, call) in list.iter_mut() {
                if call.tick(dt, unscaled_dt) {
                    due.push(DueCall::Debounce {
                        owner: *owner,
                        key: key.clone(),
                        index: call.index,
                    });
                }
            }
        }
        due.sort_by_key(DueCall::index);
        due
    }

    /// Remove and return a due call if it is still pending and still due.
    pub fn take_if_due(&mut self, due: &DueCall) -> Option<ScheduledCall> {
        match due {
            DueCall::Async { owner, index } => {
                let list = self.asyncs.get_mut(owner)?;
                let pos = list
                    .iter()
                    .position(|c| c.index == *index && c.time_left <= 0.0)?;
                Some(list.remove(pos))
            }
            DueCall::Debounce { owner, key, index } => {
                let list = self.debouncers.get_mut(owner)?;
                let pos = list
                    .iter()
                    .position(|(k, c)| k == key && c.index == *index && c.time_left <= 0.0)?;
                Some(list.remove(pos).1)
            }
        }
    }

    /// Forget owners whose call lists became empty.
    pub fn prune(&mut self) {
        self.asyncs.retain(|_, list| !list.is_empty());
        self.debouncers.retain(|_, list| !list.is_empty());
    }
}
