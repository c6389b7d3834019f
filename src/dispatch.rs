//! Key dispatch tables
//!
//! Each scope (buffer editing, session, prompt editing) has its own static
//! table from [`Key`] to a handler whose signature fits that scope. The edit
//! loop consults the buffer table first, then the session table, then falls
//! back to inserting printable input.

use crate::keys::{Key, KeyEvent};
use std::collections::HashMap;

/// Mapping from key identifier to handler for one scope
pub struct DispatchTable<H> {
    handlers: HashMap<Key, H>,
}

impl<H> Default for DispatchTable<H> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<H: Copy> DispatchTable<H> {
    /// Add a binding; keys are unique within a table
    pub fn bind(mut self, key: Key, handler: H) -> Self {
        if self.handlers.insert(key, handler).is_some() {
            log::warn!("duplicate binding for {}", key);
        }
        self
    }

    pub fn lookup(&self, key: &Key) -> Option<H> {
        self.handlers.get(key).copied()
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.handlers.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.handlers.keys()
    }
}

/// Keys bound in both tables; the first table shadows the second for these
pub fn shared_keys<A: Copy, B: Copy>(first: &DispatchTable<A>, second: &DispatchTable<B>) -> Vec<Key> {
    first.keys().filter(|key| second.contains(key)).copied().collect()
}

/// Where one event goes in the top-level edit loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<B, S> {
    Buffer(B),
    Session(S),
    Literal(char),
    Unknown,
}

/// Resolve an event against the buffer table, then the session table
pub fn route<B: Copy, S: Copy>(
    event: &KeyEvent,
    buffer: &DispatchTable<B>,
    session: &DispatchTable<S>,
) -> Route<B, S> {
    if let Some(handler) = buffer.lookup(&event.key) {
        Route::Buffer(handler)
    } else if let Some(handler) = session.lookup(&event.key) {
        Route::Session(handler)
    } else if let Some(c) = event.printable() {
        Route::Literal(c)
    } else {
        Route::Unknown
    }
}
