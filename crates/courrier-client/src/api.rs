//! Public facade of the delivery core.
//!
//! One [`Messenger`] is constructed at process start with its collaborators
//! injected, and handed by reference to everything that sends, listens, or
//! drives the offline-mode indicators. No global lookup.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use courrier_net::{PeerTransport, RadioApi};
use courrier_shared::{
    ConversationId, CourrierError, Message, MessageDraft, MessageId, ScanError, Transport,
    UserSummary,
};
use courrier_store::{KeyValueStorage, OfflineCache};

use crate::dispatch::HybridDispatcher;
use crate::events::Subscription;
use crate::mirror::mirror_conversation;
use crate::remote::{RemoteStore, RemoteSubscription};
use crate::sync::{ReconciliationService, SyncReport};

/// What the composer gets back from a send. `success` is always true; the
/// transport tag tells the UI whether to render "sent" or "queued".
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SendOutcome {
    pub success: bool,
    pub transport: Transport,
    pub message: Message,
    pub message_id: MessageId,
}

/// The delivery core, fully wired.
pub struct Messenger {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<OfflineCache>,
    peers: Arc<PeerTransport>,
    dispatcher: Arc<HybridDispatcher>,
    reconciler: Arc<ReconciliationService>,
    _peer_inbound: courrier_net::InboundSubscription,
}

impl Messenger {
    /// Wire the delivery core from its three injected collaborators.
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        radio: Arc<dyn RadioApi>,
        storage: Box<dyn KeyValueStorage>,
    ) -> Self {
        let cache = Arc::new(OfflineCache::new(storage));
        let peers = Arc::new(PeerTransport::new(radio));
        let dispatcher = Arc::new(HybridDispatcher::new(
            Arc::clone(&remote),
            Arc::clone(&peers),
            Arc::clone(&cache),
        ));
        let peer_inbound = dispatcher.attach_peer_inbound();
        let reconciler = Arc::new(ReconciliationService::new(
            Arc::clone(&remote),
            Arc::clone(&cache),
        ));

        Self {
            remote,
            cache,
            peers,
            dispatcher,
            reconciler,
            _peer_inbound: peer_inbound,
        }
    }

    /// Send a message using the best available transport. Never fails: the
    /// worst case is `transport == Cache`, which the UI shows as "queued".
    pub async fn hybrid_send(
        &self,
        conversation_id: ConversationId,
        draft: MessageDraft,
        is_online: bool,
    ) -> SendOutcome {
        let receipt = self
            .dispatcher
            .send(conversation_id, draft, is_online)
            .await;
        SendOutcome {
            success: receipt.accepted,
            transport: receipt.transport,
            message_id: receipt.message_id,
            message: receipt.message,
        }
    }

    /// Listen for every locally- or peer-originated message.
    pub fn on_hybrid_message(
        &self,
        handler: impl Fn(&Message) + Send + Sync + 'static,
    ) -> Subscription {
        self.dispatcher.on_message(handler)
    }

    /// Scan for a nearby device and connect to it.
    ///
    /// Resolves `Ok(true)` once a peer is connected and `Ok(false)` when the
    /// user dismissed the device picker; hard failures are errors.
    pub async fn enable_bluetooth_mode(&self) -> Result<bool, CourrierError> {
        match self.peers.start_scanning().await {
            Ok(()) => Ok(self.peers.is_available()),
            Err(CourrierError::Scan(ScanError::Cancelled)) => {
                info!("device selection cancelled");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Number of peer devices currently believed connected.
    pub fn connected_device_count(&self) -> usize {
        self.peers.connected_count()
    }

    /// Best-effort teardown of every peer connection.
    pub async fn disconnect_peers(&self) {
        self.peers.disconnect_all().await;
    }

    /// Run one reconciliation pass against the authoritative store.
    pub async fn sync_pending_messages(&self) -> SyncReport {
        self.reconciler.sync_pending_messages().await
    }

    /// Register a callback for completed reconciliation passes.
    pub fn on_sync_complete(&self, callback: impl Fn(&SyncReport) + Send + Sync + 'static) {
        self.reconciler.on_sync_complete(callback);
    }

    /// Entries awaiting reconciliation, across all conversations.
    pub fn pending_message_count(&self) -> usize {
        self.reconciler.pending_count()
    }

    /// Called when the caller observes connectivity coming back; drains the
    /// pending queue unless it is empty.
    pub async fn connectivity_restored(&self) -> SyncReport {
        info!("connectivity restored");
        self.reconciler.auto_sync().await
    }

    /// Keep a conversation's cached snapshot current with the authoritative
    /// store. Dropping the guard stops mirroring.
    pub fn mirror_conversation(
        &self,
        conversation_id: ConversationId,
        other_user: UserSummary,
    ) -> RemoteSubscription {
        mirror_conversation(
            self.remote.as_ref(),
            Arc::clone(&self.cache),
            conversation_id,
            other_user,
        )
    }

    /// Direct access to the offline cache, for offline reads by the UI.
    pub fn cache(&self) -> &OfflineCache {
        &self.cache
    }
}
