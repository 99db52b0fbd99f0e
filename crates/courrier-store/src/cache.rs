//! Offline cache over the key-value substrate.
//!
//! Three namespaces, each serialized wholesale on every write:
//!
//! - `<prefix>messages:<conversation>` — conversation snapshots
//! - `<prefix>meta:<conversation>` — counterpart display metadata
//! - `<prefix>pending` — the pending-message queue map (see `pending.rs`)
//!
//! Writes are atomic at the key level, not across keys. Reads never fail:
//! substrate errors and corrupt JSON degrade to "absent" with a log line.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use courrier_shared::constants::{CACHE_TTL_SECS, STORAGE_PREFIX};
use courrier_shared::{ConversationId, Message, UserSummary};

use crate::models::{CachedMetadata, CachedSnapshot};
use crate::storage::KeyValueStorage;

/// Tunables for the offline cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long snapshots and metadata stay readable.
    pub ttl: Duration,
    /// Prefix for every storage key this cache owns.
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::seconds(CACHE_TTL_SECS),
            key_prefix: STORAGE_PREFIX.to_string(),
        }
    }
}

/// The Local Durable Cache.
///
/// Holds the substrate behind a mutex so that read-modify-write sequences on
/// the pending queue stay single-writer even when the dispatcher and the
/// reconciliation service run interleaved.
pub struct OfflineCache {
    storage: Mutex<Box<dyn KeyValueStorage>>,
    config: CacheConfig,
}

impl OfflineCache {
    pub fn new(storage: Box<dyn KeyValueStorage>) -> Self {
        Self::with_config(storage, CacheConfig::default())
    }

    pub fn with_config(storage: Box<dyn KeyValueStorage>, config: CacheConfig) -> Self {
        Self {
            storage: Mutex::new(storage),
            config,
        }
    }

    // -- Key layout --------------------------------------------------------

    fn messages_key(&self, conversation_id: &ConversationId) -> String {
        format!("{}messages:{}", self.config.key_prefix, conversation_id)
    }

    fn metadata_key(&self, conversation_id: &ConversationId) -> String {
        format!("{}meta:{}", self.config.key_prefix, conversation_id)
    }

    pub(crate) fn pending_key(&self) -> String {
        format!("{}pending", self.config.key_prefix)
    }

    // -- Substrate access --------------------------------------------------

    /// Run `f` with the substrate locked. Every public operation goes through
    /// here exactly once, so each call is atomic at the key level.
    pub(crate) fn with_storage<R>(&self, f: impl FnOnce(&mut dyn KeyValueStorage) -> R) -> R {
        let mut guard = self
            .storage
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(guard.as_mut())
    }

    // -- Snapshots ---------------------------------------------------------

    /// Wholesale-replace the snapshot for a conversation, stamping
    /// `last_updated = now`.
    pub fn cache_messages(
        &self,
        conversation_id: &ConversationId,
        messages: Vec<Message>,
        other_user: UserSummary,
    ) {
        self.cache_messages_at(conversation_id, messages, other_user, Utc::now());
    }

    /// Same as [`cache_messages`](Self::cache_messages) with an injectable
    /// timestamp.
    pub fn cache_messages_at(
        &self,
        conversation_id: &ConversationId,
        messages: Vec<Message>,
        other_user: UserSummary,
        now: DateTime<Utc>,
    ) {
        let key = self.messages_key(conversation_id);
        self.with_storage(|storage| {
            // `last_updated` only moves forward.
            if let Some(existing) = read_entry::<CachedSnapshot>(storage, &key) {
                if existing.last_updated > now {
                    warn!(
                        conversation = %conversation_id,
                        "skipping snapshot write older than the cached one"
                    );
                    return;
                }
            }

            let snapshot = CachedSnapshot {
                conversation_id: conversation_id.clone(),
                messages,
                other_user,
                last_updated: now,
            };
            write_entry(storage, &key, &snapshot);
        });
    }

    /// Read the snapshot for a conversation. Returns `None` when absent or
    /// older than the TTL; an expired entry is evicted as a side effect of
    /// the read.
    pub fn get_cached_messages(&self, conversation_id: &ConversationId) -> Option<CachedSnapshot> {
        self.get_cached_messages_at(conversation_id, Utc::now())
    }

    /// Same as [`get_cached_messages`](Self::get_cached_messages) with an
    /// injectable timestamp.
    pub fn get_cached_messages_at(
        &self,
        conversation_id: &ConversationId,
        now: DateTime<Utc>,
    ) -> Option<CachedSnapshot> {
        let key = self.messages_key(conversation_id);
        let ttl = self.config.ttl;
        self.with_storage(|storage| {
            let snapshot: CachedSnapshot = read_or_evict(storage, &key)?;
            if now - snapshot.last_updated > ttl {
                debug!(conversation = %conversation_id, "evicting expired snapshot");
                remove_entry(storage, &key);
                return None;
            }
            Some(snapshot)
        })
    }

    // -- Conversation metadata ---------------------------------------------

    /// Cache the counterpart's display identity for a conversation, so the
    /// UI can resolve it before the first snapshot exists.
    pub fn cache_conversation_metadata(
        &self,
        conversation_id: &ConversationId,
        other_user: UserSummary,
    ) {
        self.cache_conversation_metadata_at(conversation_id, other_user, Utc::now());
    }

    pub fn cache_conversation_metadata_at(
        &self,
        conversation_id: &ConversationId,
        other_user: UserSummary,
        now: DateTime<Utc>,
    ) {
        let key = self.metadata_key(conversation_id);
        self.with_storage(|storage| {
            let metadata = CachedMetadata {
                other_user,
                last_updated: now,
            };
            write_entry(storage, &key, &metadata);
        });
    }

    pub fn get_cached_conversation_metadata(
        &self,
        conversation_id: &ConversationId,
    ) -> Option<UserSummary> {
        self.get_cached_conversation_metadata_at(conversation_id, Utc::now())
    }

    pub fn get_cached_conversation_metadata_at(
        &self,
        conversation_id: &ConversationId,
        now: DateTime<Utc>,
    ) -> Option<UserSummary> {
        let key = self.metadata_key(conversation_id);
        let ttl = self.config.ttl;
        self.with_storage(|storage| {
            let metadata: CachedMetadata = read_or_evict(storage, &key)?;
            if now - metadata.last_updated > ttl {
                debug!(conversation = %conversation_id, "evicting expired metadata");
                remove_entry(storage, &key);
                return None;
            }
            Some(metadata.other_user)
        })
    }

    // -- Maintenance -------------------------------------------------------

    /// Delete every key owned by this cache. Keys outside the configured
    /// prefix are never touched.
    pub fn clear_cache(&self) {
        let prefix = self.config.key_prefix.clone();
        self.with_storage(|storage| {
            let keys = match storage.keys() {
                Ok(keys) => keys,
                Err(e) => {
                    warn!(error = %e, "could not enumerate storage keys");
                    return;
                }
            };
            for key in keys.iter().filter(|k| k.starts_with(&prefix)) {
                remove_entry(storage, key);
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Substrate helpers
// ---------------------------------------------------------------------------

/// Read and parse one entry. Substrate failures and corrupt JSON are logged
/// and surface as `None`.
pub(crate) fn read_entry<T: DeserializeOwned>(
    storage: &dyn KeyValueStorage,
    key: &str,
) -> Option<T> {
    let raw = match storage.get_item(key) {
        Ok(raw) => raw?,
        Err(e) => {
            warn!(key, error = %e, "storage read failed");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "corrupt cache entry");
            None
        }
    }
}

/// Like [`read_entry`], but also deletes the entry when it is corrupt so the
/// namespace heals on the next write.
pub(crate) fn read_or_evict<T: DeserializeOwned>(
    storage: &mut dyn KeyValueStorage,
    key: &str,
) -> Option<T> {
    let raw = match storage.get_item(key) {
        Ok(raw) => raw?,
        Err(e) => {
            warn!(key, error = %e, "storage read failed");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "corrupt cache entry, evicting");
            remove_entry(storage, key);
            None
        }
    }
}

/// Serialize and write one entry, logging failures.
pub(crate) fn write_entry<T: Serialize>(storage: &mut dyn KeyValueStorage, key: &str, value: &T) {
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(key, error = %e, "cache entry serialization failed");
            return;
        }
    };
    if let Err(e) = storage.set_item(key, &raw) {
        warn!(key, error = %e, "storage write failed");
    }
}

pub(crate) fn remove_entry(storage: &mut dyn KeyValueStorage, key: &str) {
    if let Err(e) = storage.remove_item(key) {
        warn!(key, error = %e, "storage remove failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use courrier_shared::{MessageDraft, MessageId};

    fn cache() -> OfflineCache {
        OfflineCache::new(Box::new(MemoryStorage::new()))
    }

    fn other_user() -> UserSummary {
        UserSummary {
            id: "u2".into(),
            name: "Grace".into(),
            avatar: None,
        }
    }

    fn message(conversation: &str, text: &str) -> Message {
        let sender = UserSummary {
            id: "u1".into(),
            name: "Ada".into(),
            avatar: None,
        };
        MessageDraft::text(sender, text).stamp(
            ConversationId::new(conversation),
            MessageId::new(),
            Utc::now(),
        )
    }

    #[test]
    fn snapshot_round_trip() {
        let cache = cache();
        let conv = ConversationId::new("c1");

        assert!(cache.get_cached_messages(&conv).is_none());

        cache.cache_messages(&conv, vec![message("c1", "hi")], other_user());
        let snapshot = cache.get_cached_messages(&conv).expect("snapshot present");
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.other_user, other_user());
    }

    #[test]
    fn snapshot_expires_after_ttl_and_is_evicted() {
        let cache = cache();
        let conv = ConversationId::new("c1");
        let t0 = Utc::now();

        cache.cache_messages_at(&conv, vec![message("c1", "hi")], other_user(), t0);

        // Just inside the TTL: retrievable.
        let just_before = t0 + Duration::seconds(CACHE_TTL_SECS) - Duration::milliseconds(1);
        assert!(cache.get_cached_messages_at(&conv, just_before).is_some());

        // Just past the TTL: absent, and the read evicts the entry.
        let just_after = t0 + Duration::seconds(CACHE_TTL_SECS) + Duration::milliseconds(1);
        assert!(cache.get_cached_messages_at(&conv, just_after).is_none());

        // Back inside the window: still absent, proving the eviction stuck.
        assert!(cache.get_cached_messages_at(&conv, just_before).is_none());
    }

    #[test]
    fn snapshot_is_replaced_wholesale() {
        let cache = cache();
        let conv = ConversationId::new("c1");

        cache.cache_messages(
            &conv,
            vec![message("c1", "one"), message("c1", "two")],
            other_user(),
        );
        cache.cache_messages(&conv, vec![message("c1", "three")], other_user());

        let snapshot = cache.get_cached_messages(&conv).unwrap();
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].text, "three");
    }

    #[test]
    fn last_updated_never_moves_backward() {
        let cache = cache();
        let conv = ConversationId::new("c1");
        let t0 = Utc::now();

        cache.cache_messages_at(&conv, vec![message("c1", "new")], other_user(), t0);
        cache.cache_messages_at(
            &conv,
            vec![message("c1", "stale")],
            other_user(),
            t0 - Duration::seconds(10),
        );

        let snapshot = cache.get_cached_messages_at(&conv, t0).unwrap();
        assert_eq!(snapshot.messages[0].text, "new");
        assert_eq!(snapshot.last_updated, t0);
    }

    #[test]
    fn configured_ttl_overrides_the_default() {
        let config = CacheConfig {
            ttl: Duration::seconds(60),
            ..CacheConfig::default()
        };
        let cache = OfflineCache::with_config(Box::new(MemoryStorage::new()), config);
        let conv = ConversationId::new("c1");
        let t0 = Utc::now();

        cache.cache_messages_at(&conv, vec![message("c1", "hi")], other_user(), t0);
        assert!(cache
            .get_cached_messages_at(&conv, t0 + Duration::seconds(59))
            .is_some());
        assert!(cache
            .get_cached_messages_at(&conv, t0 + Duration::seconds(61))
            .is_none());
    }

    #[test]
    fn metadata_round_trip_with_ttl() {
        let cache = cache();
        let conv = ConversationId::new("c1");
        let t0 = Utc::now();

        assert!(cache.get_cached_conversation_metadata(&conv).is_none());

        cache.cache_conversation_metadata_at(&conv, other_user(), t0);
        assert_eq!(
            cache.get_cached_conversation_metadata_at(&conv, t0),
            Some(other_user())
        );

        let expired = t0 + Duration::seconds(CACHE_TTL_SECS + 1);
        assert!(cache
            .get_cached_conversation_metadata_at(&conv, expired)
            .is_none());
    }

    #[test]
    fn corrupt_entry_reads_as_absent_and_heals() {
        let cache = cache();
        let conv = ConversationId::new("c1");
        let key = cache.messages_key(&conv);

        cache.with_storage(|storage| storage.set_item(&key, "{not json").unwrap());
        assert!(cache.get_cached_messages(&conv).is_none());

        // The namespace is writable again after the corrupt read.
        cache.cache_messages(&conv, vec![message("c1", "ok")], other_user());
        assert!(cache.get_cached_messages(&conv).is_some());
    }

    #[test]
    fn clear_cache_only_touches_owned_keys() {
        let cache = cache();
        let conv = ConversationId::new("c1");

        cache.cache_messages(&conv, vec![message("c1", "hi")], other_user());
        cache.with_storage(|storage| storage.set_item("unrelated", "kept").unwrap());

        cache.clear_cache();

        assert!(cache.get_cached_messages(&conv).is_none());
        cache.with_storage(|storage| {
            assert_eq!(storage.get_item("unrelated").unwrap().as_deref(), Some("kept"));
        });
    }
}
