use std::collections::HashMap;
use std::iter::Peekable;
use std::time::{Duration, Instant};
use uuid::Uuid;
use crate::core::types::RecordId;

pub type IdStream = Box<dyn Iterator<Item = RecordId> + Send>;

/// Resumable search state held between CURSOR calls.
pub struct Cursor {
    pub index: String,
    ids: Peekable<IdStream>,
    pub offset: u64,
    pub total: u64,
    pub limit: usize,
    pub foreign_keys: Vec<String>,
    ttl: Duration,
    expires_at: Instant,
}

impl Cursor {
    pub fn new(index: &str, ids: IdStream, total: u64, limit: usize, ttl: Duration, now: Instant) -> Self {
        Cursor {
            index: index.to_string(),
            ids: ids.peekable(),
            offset: 0,
            total,
            limit,
            foreign_keys: Vec::new(),
            ttl,
            expires_at: now + ttl,
        }
    }

    pub fn with_foreign_keys(mut self, foreign_keys: Vec<String>) -> Self {
        self.foreign_keys = foreign_keys;
        self
    }

    /// Pull up to `limit` ids accepted by `live`, advancing the offset.
    pub fn next_page<F>(&mut self, live: F) -> Vec<RecordId>
    where
        F: Fn(RecordId) -> bool,
    {
        let mut page = Vec::with_capacity(self.limit.min(1024));
        while page.len() < self.limit {
            match self.ids.next() {
                Some(id) if live(id) => page.push(id),
                Some(_) => continue,
                None => break,
            }
        }

        // Skip dead ids so exhaustion is reported on this page
        while let Some(&id) = self.ids.peek() {
            if live(id) {
                break;
            }
            self.ids.next();
        }

        self.offset += page.len() as u64;
        page
    }

    pub fn has_more(&mut self) -> bool {
        self.ids.peek().is_some()
    }

    pub fn touch(&mut self, now: Instant) {
        self.expires_at = now + self.ttl;
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("index", &self.index)
            .field("offset", &self.offset)
            .field("total", &self.total)
            .field("limit", &self.limit)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Open cursors by id.
#[derive(Debug, Default)]
pub struct CursorStore {
    cursors: HashMap<String, Cursor>,
}

impl CursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cursor under a fresh id.
    pub fn open(&mut self, cursor: Cursor) -> String {
        let id = Uuid::new_v4().to_string();
        self.cursors.insert(id.clone(), cursor);
        id
    }

    /// Remove a cursor for the duration of a CURSOR call. Expired cursors
    /// are treated as missing even if no tick has collected them yet.
    pub fn take(&mut self, id: &str, now: Instant) -> Option<Cursor> {
        let cursor = self.cursors.remove(id)?;
        if cursor.is_expired(now) {
            return None;
        }
        Some(cursor)
    }

    /// Re-arm a cursor taken with `take`.
    pub fn restore(&mut self, id: String, mut cursor: Cursor, now: Instant) {
        cursor.touch(now);
        self.cursors.insert(id, cursor);
    }

    /// Drop expired cursors, returns how many were dropped.
    pub fn expire(&mut self, now: Instant) -> usize {
        let before = self.cursors.len();
        self.cursors.retain(|_, cursor| !cursor.is_expired(now));
        before - self.cursors.len()
    }

    /// Close every cursor over `index`, returns how many were closed.
    pub fn discard_index(&mut self, index: &str) -> usize {
        let before = self.cursors.len();
        self.cursors.retain(|_, cursor| cursor.index != index);
        before - self.cursors.len()
    }

    pub fn rename_index(&mut self, from: &str, to: &str) {
        for cursor in self.cursors.values_mut() {
            if cursor.index == from {
                cursor.index = to.to_string();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}
