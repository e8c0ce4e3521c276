//! Active-event stack.
//!
//! Tracked events push their name when created and pop it when dropped, so
//! handlers can ask which events are currently being dispatched (innermost
//! last). The stack is owned by the engine; entries hold a shared handle to it
//! so popping does not need a borrow of the engine.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::event::EventName;

#[derive(Debug, Default)]
struct Entries {
    next_id: Cell<u64>,
    names: RefCell<Vec<(u64, EventName)>>,
}

#[derive(Debug, Clone, Default)]
pub struct EventStack {
    entries: Rc<Entries>,
}

impl EventStack {
    pub(crate) fn push(&self, name: EventName) -> StackEntry {
        let id = self.entries.next_id.get();
        self.entries.next_id.set(id + 1);
        self.entries.names.borrow_mut().push((id, name));
        StackEntry {
            entries: Rc::clone(&self.entries),
            id,
        }
    }

    /// Names of the events currently being dispatched, innermost last.
    pub fn snapshot(&self) -> Vec<EventName> {
        self.entries
            .names
            .borrow()
            .iter()
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn depth(&self) -> usize {
        self.entries.names.borrow().len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.names.borrow().iter().any(|(_, n)| &**n == name)
    }
}

/// Removes exactly its own entry on drop, wherever it sits in the stack.
#[derive(Debug)]
pub(crate) struct StackEntry {
    entries: Rc<Entries>,
    id: u64,
}

impl Drop for StackEntry {
    fn drop(&mut self) {
        let mut names = self.entries.names.borrow_mut();
        if let Some(index) = names.iter().rposition(|(id, _)| *id == self.id) {
            names.remove(index);
        }
    }
}
