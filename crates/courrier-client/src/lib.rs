//! # courrier-client
//!
//! Orchestration core of the Courrier delivery layer: the hybrid dispatcher,
//! the reconciliation service, the snapshot mirror, and the [`Messenger`]
//! facade the UI talks to.

pub mod api;
pub mod dispatch;
pub mod events;
pub mod mirror;
pub mod remote;
pub mod sync;

pub use api::{Messenger, SendOutcome};
pub use dispatch::{DispatchReceipt, HybridDispatcher};
pub use events::{MessageListeners, Subscription};
pub use mirror::mirror_conversation;
pub use remote::{OutgoingMessage, RemoteSnapshotHandler, RemoteStore, RemoteSubscription};
pub use sync::{ReconciliationService, SyncFailure, SyncReport};

use tracing_subscriber::{fmt, EnvFilter};

/// Initialise logging for a host process. `RUST_LOG` wins when set.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("courrier_client=debug,courrier_net=debug,courrier_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    tracing::info!("Courrier delivery core logging initialised");
}
