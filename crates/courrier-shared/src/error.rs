use thiserror::Error;

#[derive(Error, Debug)]
pub enum CourrierError {
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Remote send error: {0}")]
    RemoteSend(#[from] RemoteSendError),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Failures of the device discovery flow. `Cancelled` is deliberately a
/// separate variant so the UI can say "you cancelled" instead of "something
/// broke". None of these variants change the connected set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("Radio API is not available in this environment")]
    Unavailable,

    #[error("Device selection was cancelled by the user")]
    Cancelled,

    #[error("Device discovery timed out")]
    Timeout,

    #[error("Device discovery failed: {0}")]
    Failed(String),
}

/// Failures while establishing a logical connection to a discovered device.
/// A device that fails to connect is never added to the connected set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Connection negotiation failed: {0}")]
    Negotiation(String),

    #[error("Notification channel could not be opened: {0}")]
    Channel(String),
}

/// The authoritative store rejected or timed out a send. No structured
/// taxonomy beyond "failed" is required of the collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Remote store rejected the send: {0}")]
pub struct RemoteSendError(pub String);

impl RemoteSendError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}
