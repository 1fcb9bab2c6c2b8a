use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Per-message record of which users have acknowledged it.
///
/// Kept apart from message storage: receipts are queried far more often than
/// messages are mutated, and eviction has to stay in step with the room log's
/// bound (the room directory reports the evicted id, the coordinator calls
/// `evict`).
#[derive(Default)]
pub struct ReceiptTracker {
    readers: HashMap<Uuid, HashSet<String>>,
}

impl ReceiptTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh message with its author as the first reader.
    pub fn init(&mut self, message_id: Uuid, author: &str) {
        self.readers
            .entry(message_id)
            .or_default()
            .insert(author.to_string());
    }

    /// Idempotent. Returns false when already recorded or the message is
    /// unknown (e.g. evicted).
    pub fn record_read(&mut self, message_id: &Uuid, username: &str) -> bool {
        match self.readers.get_mut(message_id) {
            Some(set) => set.insert(username.to_string()),
            None => false,
        }
    }

    pub fn count_for(&self, message_id: &Uuid) -> usize {
        self.readers.get(message_id).map_or(0, HashSet::len)
    }

    /// Readers sorted by name, for stable payloads.
    pub fn readers_of(&self, message_id: &Uuid) -> Vec<String> {
        let mut readers: Vec<String> = self
            .readers
            .get(message_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        readers.sort();
        readers
    }

    pub fn contains(&self, message_id: &Uuid) -> bool {
        self.readers.contains_key(message_id)
    }

    /// Releases the entry for a message pushed out of a room's bounded log.
    pub fn evict(&mut self, message_id: &Uuid) {
        self.readers.remove(message_id);
    }
}
