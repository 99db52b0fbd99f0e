//! Reconciliation of the pending queue with the authoritative store.
//!
//! Runs when connectivity returns: every queued entry is re-submitted with
//! its original sender/type/reply fields. Successes leave the queue;
//! failures stay queued for the next pass. One failing entry never aborts
//! the batch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info, warn};

use courrier_shared::{ConversationId, MessageId};
use courrier_store::OfflineCache;

use crate::remote::{OutgoingMessage, RemoteStore};

/// One entry that the authoritative store rejected during a pass.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SyncFailure {
    pub conversation_id: ConversationId,
    pub message_id: MessageId,
    pub error: String,
}

/// Aggregate result of one reconciliation pass.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SyncReport {
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<SyncFailure>,
}

type SyncCallback = Arc<dyn Fn(&SyncReport) + Send + Sync>;

/// Releases the in-flight flag once the pass (callbacks included) is done.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drains the pending queue into the authoritative store.
pub struct ReconciliationService {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<OfflineCache>,
    in_flight: AtomicBool,
    callbacks: Mutex<Vec<SyncCallback>>,
}

impl ReconciliationService {
    pub fn new(remote: Arc<dyn RemoteStore>, cache: Arc<OfflineCache>) -> Self {
        Self {
            remote,
            cache,
            in_flight: AtomicBool::new(false),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    /// Register a callback invoked with the aggregate result of every
    /// completed pass.
    pub fn on_sync_complete(&self, callback: impl Fn(&SyncReport) + Send + Sync + 'static) {
        let mut guard = self
            .callbacks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.push(Arc::new(callback));
    }

    /// Re-submit every queued entry, front-to-back per conversation.
    ///
    /// Refuses to run concurrently with itself: a second invocation while
    /// one is in flight returns a zero report immediately instead of
    /// queuing behind it.
    pub async fn sync_pending_messages(&self) -> SyncReport {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("reconciliation already in flight, returning zero report");
            return SyncReport::default();
        }
        let _guard = InFlightGuard(&self.in_flight);

        let queues = self.cache.all_pending_messages();
        let mut report = SyncReport::default();

        for (conversation_id, entries) in queues {
            for entry in entries {
                let outgoing = OutgoingMessage::from_message(&entry.message);
                match self.remote.send_remote(&conversation_id, &outgoing).await {
                    Ok(()) => {
                        self.cache
                            .remove_pending_message(&conversation_id, entry.message.id);
                        report.success += 1;
                    }
                    Err(e) => {
                        warn!(
                            conversation = %conversation_id,
                            message = %entry.message.id,
                            error = %e,
                            "entry left queued for the next pass"
                        );
                        report.errors.push(SyncFailure {
                            conversation_id: conversation_id.clone(),
                            message_id: entry.message.id,
                            error: e.to_string(),
                        });
                        report.failed += 1;
                    }
                }
            }
        }

        info!(
            success = report.success,
            failed = report.failed,
            "reconciliation pass finished"
        );

        let callbacks: Vec<SyncCallback> = {
            let guard = self
                .callbacks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.clone()
        };
        for callback in callbacks {
            callback(&report);
        }

        report
    }

    /// Convenience wrapper that skips the pass entirely when nothing is
    /// queued.
    pub async fn auto_sync(&self) -> SyncReport {
        if self.cache.pending_count() == 0 {
            debug!("nothing pending, skipping reconciliation");
            return SyncReport::default();
        }
        self.sync_pending_messages().await
    }

    /// Total queued entries across all conversations.
    pub fn pending_count(&self) -> usize {
        self.cache.pending_count()
    }
}
