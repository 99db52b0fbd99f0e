//! Hybrid dispatcher: the transport-selection core.
//!
//! Given a draft and a caller-observed connectivity hint, try the
//! authoritative store, then the local radio, then the durable queue, in
//! that order, first success wins. The call never fails from the caller's
//! perspective: the worst case is "accepted but not yet delivered",
//! surfaced through the receipt's transport tag.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use courrier_net::{InboundSubscription, PeerTransport};
use courrier_shared::{ConversationId, Message, MessageDraft, MessageId, Transport};
use courrier_store::OfflineCache;

use crate::events::{MessageListeners, Subscription};
use crate::remote::{OutgoingMessage, RemoteStore};

/// Result of one dispatch. `accepted` is always true; a caller that wants to
/// distinguish "delivered" from "queued" reads the transport tag.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DispatchReceipt {
    pub accepted: bool,
    pub transport: Transport,
    pub detail: String,
    pub message_id: MessageId,
    /// The fully stamped envelope, as republished to listeners.
    pub message: Message,
}

/// Orchestrates transport selection, queue side effects and event fan-out.
///
/// Sole writer of `transport` and `needs_remote_sync` on outgoing messages.
pub struct HybridDispatcher {
    remote: Arc<dyn RemoteStore>,
    peers: Arc<PeerTransport>,
    cache: Arc<OfflineCache>,
    listeners: MessageListeners,
}

impl HybridDispatcher {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        peers: Arc<PeerTransport>,
        cache: Arc<OfflineCache>,
    ) -> Self {
        Self {
            remote,
            peers,
            cache,
            listeners: MessageListeners::new(),
        }
    }

    /// Register a listener for every locally originated send (after
    /// transport tagging) and every inbound peer message.
    pub fn on_message(&self, handler: impl Fn(&Message) + Send + Sync + 'static) -> Subscription {
        self.listeners.subscribe(handler)
    }

    /// Wire the peer adapter's inbound fan-out into this dispatcher: every
    /// inbound peer message is enqueued for remote sync (deduplicated by id
    /// against the queue) and republished to listeners.
    pub fn attach_peer_inbound(&self) -> InboundSubscription {
        let cache = Arc::clone(&self.cache);
        let listeners = self.listeners.clone();
        self.peers.on_message(move |message| {
            if cache.pending_contains(&message.conversation_id, message.id) {
                debug!(message = %message.id, "duplicate peer delivery, queue unchanged");
            } else {
                cache.cache_pending_message(message.clone());
            }
            // Fan-out is intentionally not deduplicated.
            listeners.emit(message);
        })
    }

    /// Dispatch one message. Resolves with `accepted = true` on every path.
    pub async fn send(
        &self,
        conversation_id: ConversationId,
        draft: MessageDraft,
        online_hint: bool,
    ) -> DispatchReceipt {
        let message_id = MessageId::new();
        let mut message = draft.stamp(conversation_id, message_id, Utc::now());

        // Step 1: the authoritative store, when the caller believes we are
        // online. A failure here falls through; it is never surfaced.
        if online_hint {
            let outgoing = OutgoingMessage::from_message(&message);
            match self
                .remote
                .send_remote(&message.conversation_id, &outgoing)
                .await
            {
                Ok(()) => {
                    message.transport = Transport::Remote;
                    message.needs_remote_sync = false;
                    info!(message = %message_id, "delivered to remote store");
                    return self.finish(message, "delivered to the remote store");
                }
                Err(e) => {
                    warn!(message = %message_id, error = %e, "remote send failed, falling back");
                }
            }
        }

        // Step 2: fan out to connected peers. One acceptance is enough;
        // write failures only flip that device's connected flag.
        if self.peers.is_available() {
            message.transport = Transport::Peer;
            message.needs_remote_sync = true;
            if self.peers.send(&message).await {
                info!(message = %message_id, "delivered over peer radio");
                return self.finish(message, "delivered to nearby peers, queued for sync");
            }
            debug!(message = %message_id, "no peer accepted the write");
        }

        // Step 3: the durable queue, unconditionally.
        message.transport = Transport::Cache;
        message.needs_remote_sync = true;
        info!(message = %message_id, "queued locally");
        self.finish(message, "queued locally until connectivity returns")
    }

    /// Shared tail of every dispatch path: persist the queue entry when the
    /// transport was not authoritative, emit the canonical event, build the
    /// receipt.
    fn finish(&self, message: Message, detail: &str) -> DispatchReceipt {
        if message.transport != Transport::Remote {
            self.cache.cache_pending_message(message.clone());
        }
        self.listeners.emit(&message);

        DispatchReceipt {
            accepted: true,
            transport: message.transport,
            detail: detail.to_string(),
            message_id: message.id,
            message,
        }
    }
}
