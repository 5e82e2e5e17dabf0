// ── Undo/redo log ──

use crate::message::Envelope;

/// Append-only log of mutating messages with a time pointer.
///
/// `pointer` counts applied entries: `0..=len`. The log is in the
/// present exactly when `pointer == len`.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<Envelope>,
    pointer: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pointer(&self) -> usize {
        self.pointer
    }

    pub fn is_present(&self) -> bool {
        self.pointer == self.entries.len()
    }

    pub fn entries(&self) -> &[Envelope] {
        &self.entries
    }

    /// Append an entry. Anything after the pointer is dropped first.
    /// Returns `true` when a redo tail was truncated.
    pub fn record(&mut self, entry: Envelope) -> bool {
        let truncated = !self.is_present();
        self.entries.truncate(self.pointer);
        self.entries.push(entry);
        self.pointer = self.entries.len();
        truncated
    }

    /// Step back one entry and return it. `None` at the beginning.
    pub fn undo(&mut self) -> Option<&Envelope> {
        self.pointer = self.pointer.checked_sub(1)?;
        self.entries.get(self.pointer)
    }

    /// Step forward one entry and return it. `None` in the present.
    pub fn redo(&mut self) -> Option<&Envelope> {
        let entry = self.entries.get(self.pointer)?;
        self.pointer += 1;
        Some(entry)
    }

    /// The entry `undo` would step back over.
    pub fn peek_undo(&self) -> Option<&Envelope> {
        self.entries.get(self.pointer.checked_sub(1)?)
    }

    /// The entry `redo` would step forward over.
    pub fn peek_redo(&self) -> Option<&Envelope> {
        self.entries.get(self.pointer)
    }

    /// Replace the log wholesale, pointing at its end.
    pub fn replace(&mut self, entries: Vec<Envelope>) {
        self.pointer = entries.len();
        self.entries = entries;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.pointer = 0;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::message::{Message, Selected};

    fn entry(id: u64) -> Envelope {
        Envelope::new(1, Message::DeviceSelected(Selected { id }))
    }

    fn id_of(e: &Envelope) -> u64 {
        match &e.message {
            Message::DeviceSelected(s) => s.id,
            _ => 0,
        }
    }

    #[test]
    fn undo_redo_walks_the_pointer() {
        let mut h = History::new();
        assert!(h.undo().is_none());
        h.record(entry(1));
        h.record(entry(2));
        assert_eq!(id_of(h.undo().unwrap()), 2);
        assert_eq!(id_of(h.undo().unwrap()), 1);
        assert!(h.undo().is_none());
        assert_eq!(h.pointer(), 0);
        assert_eq!(id_of(h.redo().unwrap()), 1);
        assert!(!h.is_present());
        assert_eq!(id_of(h.redo().unwrap()), 2);
        assert!(h.is_present());
        assert!(h.redo().is_none());
    }

    #[test]
    fn peeks_do_not_move_the_pointer() {
        let mut h = History::new();
        assert!(h.peek_undo().is_none());
        h.record(entry(1));
        h.record(entry(2));
        assert_eq!(id_of(h.peek_undo().unwrap()), 2);
        assert!(h.peek_redo().is_none());
        h.undo();
        assert_eq!(id_of(h.peek_redo().unwrap()), 2);
        assert_eq!(id_of(h.peek_undo().unwrap()), 1);
        assert_eq!(h.pointer(), 1);
    }

    #[test]
    fn recording_in_the_past_truncates() {
        let mut h = History::new();
        h.record(entry(1));
        h.record(entry(2));
        h.undo();
        assert!(h.record(entry(3)));
        assert_eq!(h.len(), 2);
        assert!(h.is_present());
        assert_eq!(id_of(&h.entries()[1]), 3);
        assert!(!h.record(entry(4)));
    }
}
