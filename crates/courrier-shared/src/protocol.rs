//! Peer wire protocol.
//!
//! A [`PeerFrame`] is the UTF-8 JSON serialization of the envelope fields a
//! peer needs to reconstruct the message. The receiver-local fields
//! (`transport`, `needs_remote_sync`) never travel: the receiving end stamps
//! them itself on decode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_PEER_FRAME_SIZE, WIRE_VERSION};
use crate::error::CourrierError;
use crate::message::{Message, MessageKind, ReplyRef, UserSummary};
use crate::types::{ConversationId, MessageId, Transport};

/// One message as it travels over a radio channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerFrame {
    /// Wire version, bumped on incompatible changes.
    pub v: u8,
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender: UserSummary,
    /// Wire tag of the payload kind, see [`kind_tag`].
    pub kind: String,
    pub text: String,
    pub reply_to: Option<ReplyRef>,
    pub timestamp: DateTime<Utc>,
}

/// The one point that branches on the payload kind: map each variant to its
/// wire tag. Exhaustive on purpose; adding a kind must extend the wire here.
fn kind_tag(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Text => "text",
        MessageKind::Image => "image",
        MessageKind::File => "file",
        MessageKind::Audio => "audio",
        MessageKind::Document => "document",
    }
}

fn kind_from_tag(tag: &str) -> Result<MessageKind, CourrierError> {
    match tag {
        "text" => Ok(MessageKind::Text),
        "image" => Ok(MessageKind::Image),
        "file" => Ok(MessageKind::File),
        "audio" => Ok(MessageKind::Audio),
        "document" => Ok(MessageKind::Document),
        other => Err(CourrierError::Protocol(format!(
            "unknown payload kind tag: {other}"
        ))),
    }
}

impl PeerFrame {
    /// Package a message for the radio channel.
    pub fn pack(message: &Message) -> Self {
        Self {
            v: WIRE_VERSION,
            id: message.id,
            conversation_id: message.conversation_id.clone(),
            sender: message.sender.clone(),
            kind: kind_tag(message.kind).to_string(),
            text: message.text.clone(),
            reply_to: message.reply_to.clone(),
            timestamp: message.timestamp,
        }
    }

    /// Encode to UTF-8 JSON bytes, enforcing the frame size cap.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CourrierError> {
        let bytes = serde_json::to_vec(self)
            .map_err(|e| CourrierError::Serialization(e.to_string()))?;
        if bytes.len() > MAX_PEER_FRAME_SIZE {
            return Err(CourrierError::Protocol(format!(
                "frame of {} bytes exceeds the {} byte cap",
                bytes.len(),
                MAX_PEER_FRAME_SIZE
            )));
        }
        Ok(bytes)
    }

    /// Decode from UTF-8 JSON bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CourrierError> {
        if data.len() > MAX_PEER_FRAME_SIZE {
            return Err(CourrierError::Protocol(format!(
                "frame of {} bytes exceeds the {} byte cap",
                data.len(),
                MAX_PEER_FRAME_SIZE
            )));
        }
        let frame: PeerFrame = serde_json::from_slice(data)
            .map_err(|e| CourrierError::Serialization(e.to_string()))?;
        if frame.v != WIRE_VERSION {
            return Err(CourrierError::Protocol(format!(
                "unsupported wire version {}",
                frame.v
            )));
        }
        Ok(frame)
    }

    /// Rebuild the envelope on the receiving side. Inbound peer messages are
    /// always tagged `Transport::Peer` and queued for remote sync.
    pub fn into_message(self) -> Result<Message, CourrierError> {
        let kind = kind_from_tag(&self.kind)?;
        Ok(Message {
            id: self.id,
            conversation_id: self.conversation_id,
            sender: self.sender,
            text: self.text,
            kind,
            reply_to: self.reply_to,
            timestamp: self.timestamp,
            transport: Transport::Peer,
            needs_remote_sync: true,
        })
    }
}
