//! Synchronous change notification
//!
//! Every observable entity (grids, floating tiles, the document, the
//! operation history) owns a [`Listeners`] registry. Listeners run in
//! registration order, synchronously, inside the mutating call.
//!
//! A listener only receives the event payload, never the entity itself, so it
//! cannot mutate the grid it is reacting to. Renderers record the stale cells
//! and re-read them once the mutating call has returned.

use std::fmt;

/// Handle returned by [`Listeners::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Callback<E> = Box<dyn FnMut(&E) + Send + Sync>;

/// Registry of callbacks interested in events of type `E`
///
/// Subscriptions belong to one instance: a clone starts with no listeners and
/// equality comparisons ignore them.
pub struct Listeners<E> {
    next_id: u64,
    callbacks: Vec<(ListenerId, Callback<E>)>,
}

impl<E> Listeners<E> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            callbacks: Vec::new(),
        }
    }

    /// Register a callback; it runs after all previously registered ones
    pub fn subscribe(&mut self, callback: impl FnMut(&E) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.callbacks.push((id, Box::new(callback)));
        id
    }

    /// Remove a callback. Returns false if it was not registered here.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(existing, _)| *existing != id);
        self.callbacks.len() != before
    }

    /// Invoke every callback with `event`
    pub fn emit(&mut self, event: &E) {
        for (_, callback) in self.callbacks.iter_mut() {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for Listeners<E> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<E> PartialEq for Listeners<E> {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl<E> Eq for Listeners<E> {}

impl<E> fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("subscribed", &self.callbacks.len())
            .finish()
    }
}
