use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use crate::core::types::RecordId;

#[derive(Debug, Clone, PartialEq)]
pub enum WriteAction {
    /// Deferred INSERT, raw `(field, value)` pairs cast when applied
    Insert(Vec<(String, String)>),
    Delete,
    Reid { to: RecordId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteEntry {
    pub index: String,
    pub id: RecordId,
    pub action: WriteAction,
}

impl WriteEntry {
    pub fn new(index: &str, id: RecordId, action: WriteAction) -> Self {
        WriteEntry {
            index: index.to_string(),
            id,
            action,
        }
    }

    /// Every id whose state this entry changes.
    fn touched(&self) -> impl Iterator<Item = RecordId> {
        let other = match self.action {
            WriteAction::Reid { to } if to != self.id => Some(to),
            _ => None,
        };
        std::iter::once(self.id).chain(other)
    }

    fn touches(&self, index: &str, id: RecordId) -> bool {
        self.index == index && self.touched().any(|touched| touched == id)
    }
}

/// FIFO of deferred mutations, addressable by (index, id).
///
/// Several entries may exist for one id; they are drained in insertion
/// order. The queue also carries the drain deadline: it is armed by the
/// first push into an empty queue and cleared once the queue empties.
#[derive(Debug, Default)]
pub struct WriteQueue {
    entries: VecDeque<WriteEntry>,
    pending: HashMap<(String, RecordId), usize>,
    due: Option<Instant>,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: WriteEntry, now: Instant, delay: Duration) {
        for id in entry.touched() {
            *self.pending.entry((entry.index.clone(), id)).or_insert(0) += 1;
        }
        self.entries.push_back(entry);
        if self.due.is_none() {
            self.due = Some(now + delay);
        }
    }

    /// Whether any queued entry touches `(index, id)`.
    pub fn contains(&self, index: &str, id: RecordId) -> bool {
        self.pending.contains_key(&(index.to_string(), id))
    }

    /// Next entry in FIFO order.
    pub fn pop(&mut self) -> Option<WriteEntry> {
        let entry = self.entries.pop_front()?;
        self.forget(&entry);
        if self.entries.is_empty() {
            self.due = None;
        }
        Some(entry)
    }

    /// Remove and return, in order, the entries touching `(index, id)`.
    pub fn take_for(&mut self, index: &str, id: RecordId) -> Vec<WriteEntry> {
        if !self.contains(index, id) {
            return Vec::new();
        }

        let (taken, kept): (Vec<_>, Vec<_>) = self
            .entries
            .drain(..)
            .partition(|entry| entry.touches(index, id));
        self.entries = kept.into();
        for entry in &taken {
            self.forget(entry);
        }
        if self.entries.is_empty() {
            self.due = None;
        }
        taken
    }

    /// Cancel every entry of an index, returns how many were dropped.
    pub fn discard_index(&mut self, index: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.index != index);
        self.pending.retain(|(name, _), _| name != index);
        if self.entries.is_empty() {
            self.due = None;
        }
        before - self.entries.len()
    }

    pub fn rename_index(&mut self, from: &str, to: &str) {
        for entry in self.entries.iter_mut().filter(|entry| entry.index == from) {
            entry.index = to.to_string();
        }
        let moved: Vec<_> = self
            .pending
            .keys()
            .filter(|(name, _)| name == from)
            .cloned()
            .collect();
        for key in moved {
            if let Some(count) = self.pending.remove(&key) {
                self.pending.insert((to.to_string(), key.1), count);
            }
        }
    }

    /// Whether a drain tick should run at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        self.due.is_some_and(|due| now >= due)
    }

    /// Re-arm for an immediate follow-up tick when work is left over.
    pub fn rearm(&mut self, now: Instant) {
        self.due = if self.entries.is_empty() { None } else { Some(now) };
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn forget(&mut self, entry: &WriteEntry) {
        for id in entry.touched() {
            let key = (entry.index.clone(), id);
            if let Some(count) = self.pending.get_mut(&key) {
                *count -= 1;
                if *count == 0 {
                    self.pending.remove(&key);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_with(entries: Vec<WriteEntry>) -> WriteQueue {
        let mut queue = WriteQueue::new();
        let now = Instant::now();
        for entry in entries {
            queue.push(entry, now, Duration::ZERO);
        }
        queue
    }

    #[test]
    fn fifo_order_and_membership() {
        let mut queue = queue_with(vec![
            WriteEntry::new("a", 1, WriteAction::Delete),
            WriteEntry::new("a", 2, WriteAction::Reid { to: 5 }),
            WriteEntry::new("a", 1, WriteAction::Insert(vec![])),
        ]);

        assert!(queue.contains("a", 1));
        assert!(queue.contains("a", 5));
        assert!(!queue.contains("b", 1));

        assert_eq!(queue.pop().unwrap().action, WriteAction::Delete);
        // Still pending through the deferred insert
        assert!(queue.contains("a", 1));
        assert_eq!(queue.pop().unwrap().id, 2);
        assert!(!queue.contains("a", 5));
        assert_eq!(queue.pop().unwrap().action, WriteAction::Insert(vec![]));
        assert!(queue.pop().is_none());
        assert!(!queue.contains("a", 1));
    }

    #[test]
    fn take_for_preserves_order_of_the_rest() {
        let mut queue = queue_with(vec![
            WriteEntry::new("a", 1, WriteAction::Delete),
            WriteEntry::new("a", 2, WriteAction::Delete),
            WriteEntry::new("a", 3, WriteAction::Reid { to: 1 }),
        ]);

        let taken = queue.take_for("a", 1);
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].id, 1);
        assert_eq!(taken[1].id, 3);
        assert!(!queue.contains("a", 3));
        assert_eq!(queue.len(), 1);
        assert!(queue.take_for("a", 9).is_empty());
    }

    #[test]
    fn discard_and_rename() {
        let mut queue = queue_with(vec![
            WriteEntry::new("a", 1, WriteAction::Delete),
            WriteEntry::new("b", 1, WriteAction::Delete),
        ]);

        queue.rename_index("b", "c");
        assert!(queue.contains("c", 1));
        assert!(!queue.contains("b", 1));

        assert_eq!(queue.discard_index("a"), 1);
        assert!(!queue.contains("a", 1));
        assert_eq!(queue.pop().unwrap().index, "c");
    }

    #[test]
    fn drain_deadline() {
        let now = Instant::now();
        let mut queue = WriteQueue::new();
        assert!(!queue.is_due(now));

        queue.push(WriteEntry::new("a", 1, WriteAction::Delete), now, Duration::from_millis(10));
        assert!(!queue.is_due(now));
        assert!(queue.is_due(now + Duration::from_millis(10)));

        queue.pop();
        assert!(!queue.is_due(now + Duration::from_secs(1)));
    }
}
