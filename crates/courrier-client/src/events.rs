//! Canonical message event fan-out.
//!
//! Every locally originated send (after transport tagging) and every inbound
//! peer message is republished here so the UI can append to the visible
//! thread in real time, regardless of which transport carried the message.
//!
//! Fan-out is not deduplicated; listeners must no-op on ids they have
//! already rendered.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tracing::debug;
use uuid::Uuid;

use courrier_shared::Message;

type ListenerMap = HashMap<Uuid, Arc<dyn Fn(&Message) + Send + Sync>>;

/// Registry of message listeners. Cheap to clone; clones share the registry.
#[derive(Clone, Default)]
pub struct MessageListeners {
    inner: Arc<Mutex<ListenerMap>>,
}

/// Handle returned by [`MessageListeners::subscribe`]; call
/// [`unsubscribe`](Self::unsubscribe) to deregister.
pub struct Subscription {
    id: Uuid,
    inner: Weak<Mutex<ListenerMap>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(inner) = self.inner.upgrade() {
            let mut guard = inner
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.remove(&self.id);
        }
    }
}

impl MessageListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: impl Fn(&Message) + Send + Sync + 'static) -> Subscription {
        let id = Uuid::new_v4();
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(id, Arc::new(handler));
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Invoke every registered listener. The lock is released before the
    /// callbacks run, so a listener may subscribe or unsubscribe reentrantly.
    pub fn emit(&self, message: &Message) {
        let snapshot: Vec<Arc<dyn Fn(&Message) + Send + Sync>> = {
            let guard = self
                .inner
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.values().cloned().collect()
        };

        debug!(message = %message.id, listeners = snapshot.len(), "emitting message event");
        for listener in snapshot {
            listener(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use courrier_shared::{ConversationId, MessageDraft, MessageId, UserSummary};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn message() -> Message {
        let sender = UserSummary {
            id: "u1".into(),
            name: "Ada".into(),
            avatar: None,
        };
        MessageDraft::text(sender, "hi").stamp(
            ConversationId::new("c1"),
            MessageId::new(),
            Utc::now(),
        )
    }

    #[test]
    fn emit_reaches_every_listener() {
        let listeners = MessageListeners::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c1 = Arc::clone(&count);
        let _s1 = listeners.subscribe(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        let c2 = Arc::clone(&count);
        let _s2 = listeners.subscribe(move |_| {
            c2.fetch_add(1, Ordering::SeqCst);
        });

        listeners.emit(&message());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribed_listener_stops_receiving() {
        let listeners = MessageListeners::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&count);
        let subscription = listeners.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        listeners.emit(&message());
        subscription.unsubscribe();
        listeners.emit(&message());

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
