//! # courrier-shared
//!
//! Common types for the Courrier delivery core: the transport-agnostic
//! message envelope, the peer wire protocol, identifiers, and the error
//! taxonomy shared by every crate in the workspace.

pub mod constants;
pub mod error;
pub mod message;
pub mod protocol;
pub mod types;

pub use error::{ConnectionError, CourrierError, RemoteSendError, ScanError};
pub use message::{Message, MessageDraft, MessageKind, ReplyRef, UserSummary};
pub use protocol::PeerFrame;
pub use types::{ConversationId, DeviceId, DeviceState, MessageId, Transport};
