//! Pending-message queue operations.
//!
//! The whole conversation→entries map lives under one storage key, so every
//! mutation reserializes the full namespace and `all_pending_messages` is a
//! single read. Per conversation, enqueue order is preserved; the
//! reconciliation service drains front-to-back.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use courrier_shared::{ConversationId, Message, MessageId};

use crate::cache::{read_or_evict, write_entry, OfflineCache};
use crate::models::PendingEntry;

/// Stored form of the queue: conversation id string → ordered entries.
type PendingMap = BTreeMap<String, Vec<PendingEntry>>;

impl OfflineCache {
    /// Append a message to its conversation's pending queue.
    pub fn cache_pending_message(&self, message: Message) {
        self.cache_pending_message_at(message, Utc::now());
    }

    /// Same as [`cache_pending_message`](Self::cache_pending_message) with an
    /// injectable enqueue timestamp.
    pub fn cache_pending_message_at(&self, message: Message, now: DateTime<Utc>) {
        let key = self.pending_key();
        self.with_storage(|storage| {
            let mut map: PendingMap = read_or_evict(storage, &key).unwrap_or_default();
            map.entry(message.conversation_id.0.clone())
                .or_default()
                .push(PendingEntry {
                    message,
                    cached_at: now,
                });
            write_entry(storage, &key, &map);
        });
    }

    /// The pending queue for one conversation, in enqueue order.
    pub fn get_pending_messages(&self, conversation_id: &ConversationId) -> Vec<PendingEntry> {
        let key = self.pending_key();
        self.with_storage(|storage| {
            let map: PendingMap = read_or_evict(storage, &key).unwrap_or_default();
            map.get(conversation_id.as_str()).cloned().unwrap_or_default()
        })
    }

    /// The full map of every conversation's pending queue.
    pub fn all_pending_messages(&self) -> BTreeMap<ConversationId, Vec<PendingEntry>> {
        let key = self.pending_key();
        self.with_storage(|storage| {
            let map: PendingMap = read_or_evict(storage, &key).unwrap_or_default();
            map.into_iter()
                .map(|(conversation, entries)| (ConversationId::new(conversation), entries))
                .collect()
        })
    }

    /// Whether an entry with this message id is already queued for the
    /// conversation.
    pub fn pending_contains(&self, conversation_id: &ConversationId, id: MessageId) -> bool {
        self.get_pending_messages(conversation_id)
            .iter()
            .any(|entry| entry.message.id == id)
    }

    /// Remove one entry by id. The conversation key disappears from the map
    /// once its queue becomes empty.
    pub fn remove_pending_message(&self, conversation_id: &ConversationId, id: MessageId) {
        let key = self.pending_key();
        self.with_storage(|storage| {
            let mut map: PendingMap = read_or_evict(storage, &key).unwrap_or_default();

            let Some(entries) = map.get_mut(conversation_id.as_str()) else {
                return;
            };
            let before = entries.len();
            entries.retain(|entry| entry.message.id != id);
            if entries.len() == before {
                return;
            }
            if entries.is_empty() {
                map.remove(conversation_id.as_str());
            }

            debug!(conversation = %conversation_id, message = %id, "pending entry removed");
            write_entry(storage, &key, &map);
        });
    }

    /// Total number of queued entries across all conversations.
    pub fn pending_count(&self) -> usize {
        let key = self.pending_key();
        self.with_storage(|storage| {
            let map: PendingMap = read_or_evict(storage, &key).unwrap_or_default();
            map.values().map(Vec::len).sum()
        })
    }
}
