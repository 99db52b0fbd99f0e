//! Host radio capability traits.
//!
//! The low-level radio stack (discovery prompt, pairing, GATT plumbing) is an
//! external collaborator. The adapter consumes it through these traits; tests
//! and headless environments provide their own implementations.

use async_trait::async_trait;

use courrier_shared::constants::RADIO_SERVICE;
use courrier_shared::{ConnectionError, ScanError};

/// Filter handed to the host device picker.
#[derive(Debug, Clone)]
pub struct ScanFilter {
    /// Service name the counterpart must advertise.
    pub service: String,
}

impl Default for ScanFilter {
    fn default() -> Self {
        Self {
            service: RADIO_SERVICE.to_string(),
        }
    }
}

/// Callback invoked with every raw inbound payload from a channel.
pub type InboundHandler = Box<dyn Fn(&[u8]) + Send + Sync>;

/// Entry point of the host radio stack.
#[async_trait]
pub trait RadioApi: Send + Sync {
    /// Whether the host environment exposes a radio stack at all.
    fn is_supported(&self) -> bool;

    /// Prompt for a nearby device advertising the filtered service.
    ///
    /// User dismissal of the picker must surface as
    /// [`ScanError::Cancelled`], distinguishable from hard failures.
    async fn request_device(&self, filter: &ScanFilter) -> Result<Box<dyn RadioDevice>, ScanError>;
}

/// A device the picker returned. Holding a handle implies nothing about
/// connection state.
#[async_trait]
pub trait RadioDevice: Send + Sync {
    fn id(&self) -> String;

    fn name(&self) -> Option<String>;

    /// Negotiate a connection and open the bidirectional message channel.
    async fn open_channel(&self) -> Result<Box<dyn RadioChannel>, ConnectionError>;
}

/// An open notification channel to one connected device.
#[async_trait]
pub trait RadioChannel: Send + Sync {
    /// Write one encoded frame to the device.
    async fn write(&self, frame: &[u8]) -> Result<(), ConnectionError>;

    /// Start notifications, routing every inbound payload to `handler`.
    async fn subscribe(&self, handler: InboundHandler) -> Result<(), ConnectionError>;

    /// Release the notification subscription and close the channel.
    async fn close(&self) -> Result<(), ConnectionError>;
}
