//! Records persisted in the offline cache namespaces.
//!
//! Every struct derives `Serialize` and `Deserialize`; each namespace is
//! stored as one JSON document under one storage key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use courrier_shared::{ConversationId, Message, UserSummary};

// ---------------------------------------------------------------------------
// CachedSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time mirror of the authoritative store's message list for one
/// conversation, kept for offline reads.
///
/// Replaced wholesale on each authoritative update, never merged
/// field-by-field. `last_updated` only moves forward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CachedSnapshot {
    pub conversation_id: ConversationId,
    pub messages: Vec<Message>,
    /// Display identity of the counterpart in this conversation.
    pub other_user: UserSummary,
    pub last_updated: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// CachedMetadata
// ---------------------------------------------------------------------------

/// Counterpart display identity cached before the first snapshot exists.
/// Separate namespace from snapshots, same TTL behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CachedMetadata {
    pub other_user: UserSummary,
    pub last_updated: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// PendingEntry
// ---------------------------------------------------------------------------

/// A message awaiting reconciliation with the authoritative store.
///
/// An entry exists if and only if the message's `needs_remote_sync` flag is
/// set and reconciliation has not yet succeeded for it. Entries leave the
/// queue only through successful reconciliation or explicit removal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingEntry {
    pub message: Message,
    /// When the entry was enqueued.
    pub cached_at: DateTime<Utc>,
}
