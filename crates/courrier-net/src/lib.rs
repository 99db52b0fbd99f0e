// Peer radio transport layer over the host radio capability traits.

pub mod adapter;
pub mod radio;

pub use adapter::{ConnectedDevice, InboundSubscription, PeerTransport};
pub use radio::{InboundHandler, RadioApi, RadioChannel, RadioDevice, ScanFilter};
