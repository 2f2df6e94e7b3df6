//! Undo/redo history for map operations
//!
//! [`OperationManager`] keeps a bounded undo stack and a redo stack of
//! executed [`Operation`]s, tracks the distance to the last saved state and
//! announces `can_undo`/`can_redo`/`is_dirty` transitions.

use crate::document::MapDocument;
use crate::events::{ListenerId, Listeners};
use crate::operation::Operation;
use crate::MapResult;
use log::debug;
use std::collections::VecDeque;

/// Default maximum number of undo steps
pub const DEFAULT_MAX_UNDO: usize = 100;

/// Raised when one of the history flags flips
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryEvent {
    CanUndoChanged(bool),
    CanRedoChanged(bool),
    IsDirtyChanged(bool),
}

#[derive(Clone, Copy, PartialEq, Eq)]
struct Flags {
    can_undo: bool,
    can_redo: bool,
    is_dirty: bool,
}

#[cfg_attr(feature = "bevy", derive(bevy::prelude::Resource))]
#[derive(Debug)]
pub struct OperationManager {
    undo_stack: VecDeque<Operation>,
    redo_stack: Vec<Operation>,
    max_undo: usize,
    /// Steps between the current state and the saved one.
    ///
    /// - `Some(0)`: the current state is the saved state
    /// - `Some(n)`, `n > 0`: `n` undos lead back to it
    /// - `Some(n)`, `n < 0`: `|n|` redos lead back to it
    /// - `None`: the saved state can no longer be reached
    save_distance: Option<i64>,
    listeners: Listeners<HistoryEvent>,
}

impl Default for OperationManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNDO)
    }
}

impl OperationManager {
    /// An empty, clean history keeping at most `max_undo` undo steps
    pub fn new(max_undo: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_undo: max_undo.max(1),
            save_distance: Some(0),
            listeners: Listeners::new(),
        }
    }

    /// Execute `operation` and record it
    ///
    /// A failed operation leaves both stacks untouched.
    pub fn execute(&mut self, mut operation: Operation, document: &mut MapDocument) -> MapResult {
        let before = self.flags();
        operation.execute(document)?;
        debug!("Executed '{}'", operation.description());

        if !self.redo_stack.is_empty() {
            self.redo_stack.clear();
            // The saved state was on the discarded branch
            if matches!(self.save_distance, Some(d) if d < 0) {
                self.save_distance = None;
            }
        }
        self.push_undo(operation);
        self.announce(before);
        Ok(())
    }

    /// Undo the most recent operation; does nothing when there is none
    pub fn undo(&mut self, document: &mut MapDocument) -> MapResult {
        let Some(mut operation) = self.undo_stack.pop_back() else {
            return Ok(());
        };
        let before = self.flags();
        if let Err(e) = operation.undo(document) {
            self.undo_stack.push_back(operation);
            return Err(e);
        }
        debug!("Undid '{}'", operation.description());

        self.redo_stack.push(operation);
        if let Some(d) = &mut self.save_distance {
            *d -= 1;
        }
        self.announce(before);
        Ok(())
    }

    /// Redo the most recently undone operation; does nothing when there is none
    pub fn redo(&mut self, document: &mut MapDocument) -> MapResult {
        let Some(mut operation) = self.redo_stack.pop() else {
            return Ok(());
        };
        let before = self.flags();
        if let Err(e) = operation.execute(document) {
            self.redo_stack.push(operation);
            return Err(e);
        }
        debug!("Redid '{}'", operation.description());

        self.push_undo(operation);
        self.announce(before);
        Ok(())
    }

    /// The operation [`undo`](Self::undo) would revert next
    pub fn peek_undo(&self) -> Option<&Operation> {
        self.undo_stack.back()
    }

    /// Swap the top of the undo stack for `operation` without executing it
    ///
    /// Used to coalesce an already executed edit into the previous step. If
    /// the replaced step was the saved state, the saved state is lost.
    pub fn replace(&mut self, operation: Operation) {
        let before = self.flags();
        debug!("Coalesced into '{}'", operation.description());
        if self.undo_stack.pop_back().is_some() {
            if self.save_distance == Some(0) {
                self.save_distance = None;
            }
            self.undo_stack.push_back(operation);
        } else {
            self.push_undo(operation);
        }
        self.announce(before);
    }

    /// Record the current state as the saved one
    pub fn set_now_as_mark(&mut self) {
        let before = self.flags();
        self.save_distance = Some(0);
        self.announce(before);
    }

    /// Whether the document differs from its saved state
    pub fn is_dirty(&self) -> bool {
        self.save_distance != Some(0)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Drop both stacks and treat the current state as saved
    pub fn clear(&mut self) {
        let before = self.flags();
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.save_distance = Some(0);
        self.announce(before);
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn max_undo(&self) -> usize {
        self.max_undo
    }

    /// Undo step labels, most recent first
    pub fn undo_descriptions(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.undo_stack.iter().rev().map(Operation::description)
    }

    /// Redo step labels, most recent first
    pub fn redo_descriptions(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.redo_stack.iter().rev().map(Operation::description)
    }

    pub fn subscribe(
        &mut self,
        callback: impl FnMut(&HistoryEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    fn push_undo(&mut self, operation: Operation) {
        self.undo_stack.push_back(operation);
        if let Some(d) = &mut self.save_distance {
            *d += 1;
        }
        if self.undo_stack.len() > self.max_undo {
            self.undo_stack.pop_front();
            if matches!(self.save_distance, Some(d) if d > self.undo_stack.len() as i64) {
                self.save_distance = None;
            }
        }
    }

    fn flags(&self) -> Flags {
        Flags {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            is_dirty: self.is_dirty(),
        }
    }

    fn announce(&mut self, before: Flags) {
        let now = self.flags();
        if now.can_undo != before.can_undo {
            self.listeners.emit(&HistoryEvent::CanUndoChanged(now.can_undo));
        }
        if now.can_redo != before.can_redo {
            self.listeners.emit(&HistoryEvent::CanRedoChanged(now.can_redo));
        }
        if now.is_dirty != before.is_dirty {
            self.listeners.emit(&HistoryEvent::IsDirtyChanged(now.is_dirty));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MapError;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_dirty_tracks_mark() {
        let mut doc = MapDocument::new(2, 2);
        let mut history = OperationManager::default();
        assert!(!history.is_dirty());

        history.set_now_as_mark();
        assert!(!history.is_dirty());

        history
            .execute(Operation::set_sea_level(4), &mut doc)
            .unwrap();
        assert!(history.is_dirty());

        history.undo(&mut doc).unwrap();
        assert!(!history.is_dirty());

        history.redo(&mut doc).unwrap();
        assert!(history.is_dirty());
        assert_eq!(doc.sea_level(), 4);
    }

    #[test]
    fn test_discarded_redo_branch_loses_mark() {
        let mut doc = MapDocument::new(2, 2);
        let mut history = OperationManager::default();
        history.execute(Operation::set_sea_level(1), &mut doc).unwrap();
        history.set_now_as_mark();
        history.undo(&mut doc).unwrap();

        history.execute(Operation::set_sea_level(2), &mut doc).unwrap();
        history.undo(&mut doc).unwrap();
        assert!(history.is_dirty());
    }

    #[test]
    fn test_undo_redo_on_empty_stacks_are_noops() {
        let mut doc = MapDocument::new(2, 2);
        let before = doc.clone();
        let mut history = OperationManager::default();
        history.undo(&mut doc).unwrap();
        history.redo(&mut doc).unwrap();
        assert_eq!(doc, before);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_failed_execute_records_nothing() {
        let mut doc = MapDocument::new(2, 2);
        let mut history = OperationManager::default();
        assert_eq!(
            history.execute(Operation::select_tile(0), &mut doc),
            Err(MapError::NoSuchFloatingTile(0))
        );
        assert_eq!(history.undo_count(), 0);
        assert!(!history.is_dirty());
    }

    #[test]
    fn test_replace_coalesces_one_step() {
        let mut doc = MapDocument::new(2, 2);
        let mut history = OperationManager::default();
        history.execute(Operation::set_sea_level(1), &mut doc).unwrap();

        let mut next = Operation::set_sea_level(2);
        next.execute(&mut doc).unwrap();
        let combined = history.peek_undo().and_then(|top| top.combine(&next));
        history.replace(combined.unwrap());

        assert_eq!(history.undo_count(), 1);
        history.undo(&mut doc).unwrap();
        assert_eq!(doc.sea_level(), 0);
        assert!(!history.is_dirty());
    }

    #[test]
    fn test_bounded_depth_drops_oldest() {
        let mut doc = MapDocument::new(2, 2);
        let mut history = OperationManager::new(2);
        for level in 1..=3 {
            history
                .execute(Operation::set_sea_level(level), &mut doc)
                .unwrap();
        }
        assert_eq!(history.undo_count(), 2);

        history.undo(&mut doc).unwrap();
        history.undo(&mut doc).unwrap();
        history.undo(&mut doc).unwrap();
        assert_eq!(doc.sea_level(), 1);
        // the saved state fell off the stack
        assert!(history.is_dirty());
    }

    #[test]
    fn test_clear_resets_mark() {
        let mut doc = MapDocument::new(2, 2);
        let mut history = OperationManager::default();
        history.execute(Operation::set_sea_level(1), &mut doc).unwrap();
        history.clear();
        assert!(!history.is_dirty());
        assert!(!history.can_undo());
    }

    #[test]
    fn test_flag_notifications() {
        let mut doc = MapDocument::new(2, 2);
        let mut history = OperationManager::default();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        history.subscribe(move |e| sink.lock().unwrap().push(*e));

        history.execute(Operation::set_sea_level(1), &mut doc).unwrap();
        history.execute(Operation::set_sea_level(2), &mut doc).unwrap();
        history.undo(&mut doc).unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                HistoryEvent::CanUndoChanged(true),
                HistoryEvent::IsDirtyChanged(true),
                HistoryEvent::CanRedoChanged(true),
            ]
        );
    }

    #[test]
    fn test_descriptions_most_recent_first() {
        let mut doc = MapDocument::new(2, 2);
        let mut history = OperationManager::default();
        history.execute(Operation::set_sea_level(1), &mut doc).unwrap();
        history
            .execute(Operation::set_start_position(0, None), &mut doc)
            .unwrap();
        history.undo(&mut doc).unwrap();

        assert_eq!(
            history.undo_descriptions().collect::<Vec<_>>(),
            vec!["Set sea level"]
        );
        assert_eq!(
            history.redo_descriptions().collect::<Vec<_>>(),
            vec!["Set start position"]
        );
    }
}
