use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Message identity = UUID minted at dispatch (or decoded from a peer frame)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a logical conversation, assigned by the hosted backend.
/// Partitions every queue and cache namespace. Ordered so conversations can
/// key the pending-queue map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a paired radio device, as reported by the host API.
/// A re-pairing may reuse the same id for a brand new connection entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which channel actually carried a message. Stamped after the dispatch
/// decision, never before.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Accepted by the authoritative remote store.
    Remote,
    /// Written to at least one connected radio peer.
    Peer,
    /// Persisted to the durable local queue only.
    Cache,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Remote => "remote",
            Transport::Peer => "peer",
            Transport::Cache => "cache",
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a tracked peer connection. An entry is created `Connected` on
/// successful pairing and marked `Disconnected` on write failure or explicit
/// teardown, never resurrected; discovery and channel negotiation happen
/// before an entry exists. There is no automatic reconnect: a disconnected
/// device stays disconnected until the caller runs a fresh scan/connect
/// cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeviceState {
    Connected,
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_tags_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Transport::Remote).unwrap(), "\"remote\"");
        assert_eq!(serde_json::to_string(&Transport::Peer).unwrap(), "\"peer\"");
        assert_eq!(serde_json::to_string(&Transport::Cache).unwrap(), "\"cache\"");
    }

    #[test]
    fn message_ids_are_unique() {
        assert_ne!(MessageId::new(), MessageId::new());
    }
}
