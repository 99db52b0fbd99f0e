//! The transport-agnostic message envelope.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the UI layer and carried verbatim over the peer wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ConversationId, MessageId, Transport};

// ---------------------------------------------------------------------------
// UserSummary
// ---------------------------------------------------------------------------

/// Sender identity as captured at send time. Never re-resolved afterwards:
/// a later display-name change does not rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSummary {
    /// Backend user id.
    pub id: String,
    /// Display name at send time.
    pub name: String,
    /// Optional avatar URL at send time.
    pub avatar: Option<String>,
}

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// Payload category of a message. The single place that branches on this is
/// peer-frame packaging, which matches exhaustively.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    File,
    Audio,
    Document,
}

impl Default for MessageKind {
    fn default() -> Self {
        MessageKind::Text
    }
}

// ---------------------------------------------------------------------------
// ReplyRef
// ---------------------------------------------------------------------------

/// Reference to a quoted message, carrying a snapshot of the quoted text and
/// sender so the quote renders even when the original is not locally cached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplyRef {
    pub message_id: MessageId,
    pub text: String,
    pub sender_name: String,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A fully stamped message as it flows through dispatch, the pending queue,
/// and listener fan-out.
///
/// The dispatcher is the sole writer of `transport` and `needs_remote_sync`;
/// `needs_remote_sync` stays true for anything that did not reach the
/// authoritative store, until reconciliation confirms acceptance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Globally unique identifier, immutable once assigned.
    pub id: MessageId,
    /// The conversation this message belongs to.
    pub conversation_id: ConversationId,
    /// Sender identity snapshot.
    pub sender: UserSummary,
    /// Message body (caption for non-text kinds).
    pub text: String,
    /// Payload category.
    pub kind: MessageKind,
    /// Optional quoted message.
    pub reply_to: Option<ReplyRef>,
    /// Creation time, assigned once, never mutated.
    pub timestamp: DateTime<Utc>,
    /// Which channel actually carried the message.
    pub transport: Transport,
    /// True whenever `transport != Remote` and reconciliation has not yet
    /// confirmed the authoritative store accepted this message.
    pub needs_remote_sync: bool,
}

// ---------------------------------------------------------------------------
// MessageDraft
// ---------------------------------------------------------------------------

/// What the composer hands to the dispatcher: the envelope minus the fields
/// the dispatcher assigns (`id`, `timestamp`, `transport`,
/// `needs_remote_sync`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageDraft {
    pub sender: UserSummary,
    pub text: String,
    #[serde(default)]
    pub kind: MessageKind,
    pub reply_to: Option<ReplyRef>,
}

impl MessageDraft {
    pub fn text(sender: UserSummary, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            kind: MessageKind::Text,
            reply_to: None,
        }
    }

    /// Promote the draft to a full envelope. The transport tag and sync flag
    /// are stamped later, once the dispatch decision is made.
    pub fn stamp(
        self,
        conversation_id: ConversationId,
        id: MessageId,
        timestamp: DateTime<Utc>,
    ) -> Message {
        Message {
            id,
            conversation_id,
            sender: self.sender,
            text: self.text,
            kind: self.kind,
            reply_to: self.reply_to,
            timestamp,
            transport: Transport::Cache,
            needs_remote_sync: true,
        }
    }
}
