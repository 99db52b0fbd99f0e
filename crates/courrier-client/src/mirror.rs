//! Mirrors authoritative conversation state into the offline cache.
//!
//! The dispatcher never writes snapshots; this is the component that
//! subscribes to the remote store and wholesale-replaces the cached copy on
//! every change, so the conversation stays readable offline.

use std::sync::Arc;

use tracing::debug;

use courrier_shared::{ConversationId, UserSummary};
use courrier_store::OfflineCache;

use crate::remote::{RemoteStore, RemoteSubscription};

/// Subscribe to a conversation's authoritative changes and keep its cached
/// snapshot current. Dropping the returned guard stops mirroring.
pub fn mirror_conversation(
    remote: &dyn RemoteStore,
    cache: Arc<OfflineCache>,
    conversation_id: ConversationId,
    other_user: UserSummary,
) -> RemoteSubscription {
    // Make the counterpart resolvable before the first snapshot lands.
    cache.cache_conversation_metadata(&conversation_id, other_user.clone());

    let conversation = conversation_id.clone();
    remote.subscribe_remote(
        &conversation_id,
        Box::new(move |messages| {
            debug!(conversation = %conversation, count = messages.len(), "mirroring snapshot");
            cache.cache_messages(&conversation, messages, other_user.clone());
        }),
    )
}
