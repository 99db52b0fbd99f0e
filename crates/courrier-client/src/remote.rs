//! Authoritative remote store capability.
//!
//! The hosted backend (create/read/subscribe, handled elsewhere in the
//! application) is consumed through this trait. Production wires an actual
//! backend client; tests wire stubs that succeed, reject, or stall on demand.

use async_trait::async_trait;

use courrier_shared::{
    ConversationId, Message, MessageKind, RemoteSendError, ReplyRef, UserSummary,
};

/// The fields the authoritative store accepts on message creation. The store
/// assigns its own persistence identity; ours travels only on peer frames
/// and in the pending queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub sender: UserSummary,
    pub kind: MessageKind,
    pub reply_to: Option<ReplyRef>,
}

impl OutgoingMessage {
    /// Project a stamped envelope back onto the store's create payload,
    /// keeping the original sender/type/reply fields.
    pub fn from_message(message: &Message) -> Self {
        Self {
            text: message.text.clone(),
            sender: message.sender.clone(),
            kind: message.kind,
            reply_to: message.reply_to.clone(),
        }
    }
}

/// Callback invoked with the full authoritative message list on every change.
pub type RemoteSnapshotHandler = Box<dyn Fn(Vec<Message>) + Send + Sync>;

/// Guard for a remote subscription; unsubscribes when dropped.
pub struct RemoteSubscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl RemoteSubscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }
}

impl Drop for RemoteSubscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// The authoritative networked message store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create a message in the store. Failure carries no structure beyond
    /// "failed"; the dispatcher only needs to know whether to fall back.
    async fn send_remote(
        &self,
        conversation_id: &ConversationId,
        outgoing: &OutgoingMessage,
    ) -> Result<(), RemoteSendError>;

    /// Subscribe to authoritative changes for one conversation.
    fn subscribe_remote(
        &self,
        conversation_id: &ConversationId,
        on_change: RemoteSnapshotHandler,
    ) -> RemoteSubscription;
}
