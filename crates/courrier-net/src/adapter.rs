//! Peer transport adapter.
//!
//! Tracks connected radio devices, fans outgoing frames out to every
//! connected channel, and decodes inbound payloads for handler fan-out.
//!
//! Failure detection is lazy: `connected` is an optimistic flag, corrected
//! when a write to the device fails. There is no heartbeat and no automatic
//! reconnect; a disconnected device requires a fresh scan/connect cycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, info, warn};
use uuid::Uuid;

use courrier_shared::{
    ConnectionError, CourrierError, DeviceId, DeviceState, Message, PeerFrame, ScanError,
};

use crate::radio::{RadioApi, RadioChannel, RadioDevice, ScanFilter};

type HandlerMap = HashMap<Uuid, Arc<dyn Fn(&Message) + Send + Sync>>;

/// One logical connection to a paired device.
///
/// Created on successful pairing, marked `Disconnected` on write failure or
/// teardown, never resurrected: a re-pairing appends a new entry, possibly
/// with the same device id.
struct PeerConnection {
    conn_id: u64,
    device_id: DeviceId,
    display_name: String,
    state: DeviceState,
    channel: Arc<dyn RadioChannel>,
}

/// Snapshot of a tracked connection, for status surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedDevice {
    pub device_id: DeviceId,
    pub display_name: String,
    pub state: DeviceState,
}

/// Handle returned by [`PeerTransport::on_message`]; call
/// [`unsubscribe`](Self::unsubscribe) to deregister the handler.
pub struct InboundSubscription {
    id: Uuid,
    handlers: Weak<Mutex<HandlerMap>>,
}

impl InboundSubscription {
    pub fn unsubscribe(self) {
        if let Some(handlers) = self.handlers.upgrade() {
            let mut guard = handlers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.remove(&self.id);
        }
    }
}

/// Manages discovery, connection lifecycle and message exchange with nearby
/// peer devices.
pub struct PeerTransport {
    radio: Arc<dyn RadioApi>,
    filter: ScanFilter,
    connections: Mutex<Vec<PeerConnection>>,
    handlers: Arc<Mutex<HandlerMap>>,
    scanning: AtomicBool,
    next_conn_id: AtomicU64,
}

/// Clears the scan-in-progress flag on every exit path.
struct ScanGuard<'a>(&'a AtomicBool);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl PeerTransport {
    pub fn new(radio: Arc<dyn RadioApi>) -> Self {
        Self::with_filter(radio, ScanFilter::default())
    }

    pub fn with_filter(radio: Arc<dyn RadioApi>, filter: ScanFilter) -> Self {
        Self {
            radio,
            filter,
            connections: Mutex::new(Vec::new()),
            handlers: Arc::new(Mutex::new(HashMap::new())),
            scanning: AtomicBool::new(false),
            next_conn_id: AtomicU64::new(0),
        }
    }

    /// True only when the host exposes a radio stack AND at least one device
    /// is currently connected.
    pub fn is_available(&self) -> bool {
        self.radio.is_supported() && self.connected_count() > 0
    }

    /// Number of devices currently believed connected.
    pub fn connected_count(&self) -> usize {
        self.lock_connections()
            .iter()
            .filter(|c| c.state == DeviceState::Connected)
            .count()
    }

    /// Snapshot of every tracked connection.
    pub fn connected_devices(&self) -> Vec<ConnectedDevice> {
        self.lock_connections()
            .iter()
            .map(|c| ConnectedDevice {
                device_id: c.device_id.clone(),
                display_name: c.display_name.clone(),
                state: c.state,
            })
            .collect()
    }

    /// Prompt for a nearby device and connect to it.
    ///
    /// Re-entrant calls while a scan is in progress are no-ops. User
    /// cancellation surfaces as [`ScanError::Cancelled`]; neither
    /// cancellation nor failure changes the connected set.
    pub async fn start_scanning(&self) -> Result<(), CourrierError> {
        if !self.radio.is_supported() {
            return Err(ScanError::Unavailable.into());
        }

        if self.scanning.swap(true, Ordering::SeqCst) {
            debug!("scan already in progress");
            return Ok(());
        }
        let _guard = ScanGuard(&self.scanning);

        let device = self.radio.request_device(&self.filter).await?;
        debug!(device = %device.id(), "device discovered");

        self.connect(device).await?;
        Ok(())
    }

    /// Establish a logical connection to a discovered device and register
    /// for its inbound payloads. The device is not added to the connected
    /// set on failure.
    pub async fn connect(&self, device: Box<dyn RadioDevice>) -> Result<(), ConnectionError> {
        let device_id = DeviceId::new(device.id());
        let display_name = device.name().unwrap_or_else(|| device_id.to_string());

        debug!(device = %device_id, "negotiating connection");

        let channel: Arc<dyn RadioChannel> = Arc::from(device.open_channel().await?);

        let handlers = Arc::clone(&self.handlers);
        channel
            .subscribe(Box::new(move |payload| {
                dispatch_inbound(&handlers, payload);
            }))
            .await?;

        let conn_id = self.next_conn_id.fetch_add(1, Ordering::SeqCst);
        self.lock_connections().push(PeerConnection {
            conn_id,
            device_id: device_id.clone(),
            display_name: display_name.clone(),
            state: DeviceState::Connected,
            channel,
        });

        info!(device = %device_id, name = %display_name, "peer connected");
        Ok(())
    }

    /// Serialize the message and write it to every connected device.
    ///
    /// Returns true iff at least one write succeeded. Devices whose write
    /// fails are marked disconnected as a side effect and skipped on
    /// subsequent sends.
    pub async fn send(&self, message: &Message) -> bool {
        let bytes = match PeerFrame::pack(message).to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(message = %message.id, error = %e, "could not encode peer frame");
                return false;
            }
        };

        let targets: Vec<(u64, DeviceId, Arc<dyn RadioChannel>)> = self
            .lock_connections()
            .iter()
            .filter(|c| c.state == DeviceState::Connected)
            .map(|c| (c.conn_id, c.device_id.clone(), Arc::clone(&c.channel)))
            .collect();

        let mut delivered = 0usize;
        let mut failed: Vec<u64> = Vec::new();

        for (conn_id, device_id, channel) in targets {
            match channel.write(&bytes).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(device = %device_id, error = %e, "peer write failed, marking disconnected");
                    failed.push(conn_id);
                }
            }
        }

        if !failed.is_empty() {
            let mut connections = self.lock_connections();
            for conn in connections.iter_mut() {
                if failed.contains(&conn.conn_id) {
                    conn.state = DeviceState::Disconnected;
                }
            }
        }

        debug!(message = %message.id, delivered, "peer send finished");
        delivered > 0
    }

    /// Register a handler for every decoded inbound message.
    ///
    /// Malformed payloads are logged and dropped before reaching handlers.
    pub fn on_message(
        &self,
        handler: impl Fn(&Message) + Send + Sync + 'static,
    ) -> InboundSubscription {
        let id = Uuid::new_v4();
        let mut guard = self
            .handlers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(id, Arc::new(handler));
        InboundSubscription {
            id,
            handlers: Arc::downgrade(&self.handlers),
        }
    }

    /// Best-effort teardown of every connection. Close failures are logged,
    /// never propagated.
    pub async fn disconnect_all(&self) {
        let channels: Vec<(DeviceId, Arc<dyn RadioChannel>)> = self
            .lock_connections()
            .iter()
            .filter(|c| c.state == DeviceState::Connected)
            .map(|c| (c.device_id.clone(), Arc::clone(&c.channel)))
            .collect();

        for (device_id, channel) in channels {
            if let Err(e) = channel.close().await {
                warn!(device = %device_id, error = %e, "channel close failed");
            }
        }

        let mut connections = self.lock_connections();
        let count = connections.len();
        connections.clear();
        info!(count, "all peers disconnected");
    }

    fn lock_connections(&self) -> std::sync::MutexGuard<'_, Vec<PeerConnection>> {
        self.connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Decode one inbound payload and fan it out to every registered handler.
/// The handler lock is released before invoking callbacks so handlers may
/// register or unsubscribe reentrantly.
fn dispatch_inbound(handlers: &Mutex<HandlerMap>, payload: &[u8]) {
    let message = match PeerFrame::from_bytes(payload).and_then(PeerFrame::into_message) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "dropping malformed peer payload");
            return;
        }
    };

    let snapshot: Vec<Arc<dyn Fn(&Message) + Send + Sync>> = {
        let guard = handlers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.values().cloned().collect()
    };

    debug!(message = %message.id, handlers = snapshot.len(), "inbound peer message");
    for handler in snapshot {
        handler(&message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use courrier_shared::{ConversationId, MessageDraft, MessageId, Transport, UserSummary};
    use std::sync::atomic::AtomicUsize;

    // -- Mock radio stack --------------------------------------------------

    struct MockChannel {
        written: Arc<Mutex<Vec<Vec<u8>>>>,
        fail_writes: Arc<AtomicBool>,
        inbound: Arc<Mutex<Option<crate::radio::InboundHandler>>>,
    }

    #[async_trait]
    impl RadioChannel for MockChannel {
        async fn write(&self, frame: &[u8]) -> Result<(), ConnectionError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(ConnectionError::Channel("write refused".into()));
            }
            self.written.lock().unwrap().push(frame.to_vec());
            Ok(())
        }

        async fn subscribe(
            &self,
            handler: crate::radio::InboundHandler,
        ) -> Result<(), ConnectionError> {
            *self.inbound.lock().unwrap() = Some(handler);
            Ok(())
        }

        async fn close(&self) -> Result<(), ConnectionError> {
            Ok(())
        }
    }

    #[derive(Clone)]
    struct MockDevice {
        id: String,
        fail_connect: bool,
        written: Arc<Mutex<Vec<Vec<u8>>>>,
        fail_writes: Arc<AtomicBool>,
        inbound: Arc<Mutex<Option<crate::radio::InboundHandler>>>,
    }

    impl MockDevice {
        fn new(id: &str) -> Self {
            Self {
                id: id.to_string(),
                fail_connect: false,
                written: Arc::new(Mutex::new(Vec::new())),
                fail_writes: Arc::new(AtomicBool::new(false)),
                inbound: Arc::new(Mutex::new(None)),
            }
        }

        fn push_inbound(&self, payload: &[u8]) {
            let guard = self.inbound.lock().unwrap();
            let handler = guard.as_ref().expect("subscribed");
            handler(payload);
        }
    }

    #[async_trait]
    impl RadioDevice for MockDevice {
        fn id(&self) -> String {
            self.id.clone()
        }

        fn name(&self) -> Option<String> {
            Some(format!("device-{}", self.id))
        }

        async fn open_channel(&self) -> Result<Box<dyn RadioChannel>, ConnectionError> {
            if self.fail_connect {
                return Err(ConnectionError::Negotiation("refused".into()));
            }
            Ok(Box::new(MockChannel {
                written: Arc::clone(&self.written),
                fail_writes: Arc::clone(&self.fail_writes),
                inbound: Arc::clone(&self.inbound),
            }))
        }
    }

    struct MockRadio {
        supported: bool,
        scan_result: Mutex<Option<Result<MockDevice, ScanError>>>,
    }

    impl MockRadio {
        fn supported() -> Self {
            Self {
                supported: true,
                scan_result: Mutex::new(None),
            }
        }

        fn with_scan_result(result: Result<MockDevice, ScanError>) -> Self {
            Self {
                supported: true,
                scan_result: Mutex::new(Some(result)),
            }
        }
    }

    #[async_trait]
    impl RadioApi for MockRadio {
        fn is_supported(&self) -> bool {
            self.supported
        }

        async fn request_device(
            &self,
            _filter: &ScanFilter,
        ) -> Result<Box<dyn RadioDevice>, ScanError> {
            match self.scan_result.lock().unwrap().take() {
                Some(Ok(device)) => Ok(Box::new(device)),
                Some(Err(e)) => Err(e),
                None => Err(ScanError::Timeout),
            }
        }
    }

    fn sample_message() -> Message {
        let sender = UserSummary {
            id: "u1".into(),
            name: "Ada".into(),
            avatar: None,
        };
        MessageDraft::text(sender, "hello").stamp(
            ConversationId::new("c1"),
            MessageId::new(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn unavailable_without_connections() {
        let transport = PeerTransport::new(Arc::new(MockRadio::supported()));
        assert!(!transport.is_available());
        assert_eq!(transport.connected_count(), 0);
    }

    #[tokio::test]
    async fn unsupported_radio_fails_scan() {
        let radio = MockRadio {
            supported: false,
            scan_result: Mutex::new(None),
        };
        let transport = PeerTransport::new(Arc::new(radio));

        match transport.start_scanning().await {
            Err(CourrierError::Scan(ScanError::Unavailable)) => {}
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_scan_is_distinguishable_and_releases_the_guard() {
        let transport = PeerTransport::new(Arc::new(MockRadio::with_scan_result(Err(
            ScanError::Cancelled,
        ))));

        match transport.start_scanning().await {
            Err(CourrierError::Scan(ScanError::Cancelled)) => {}
            other => panic!("expected Cancelled, got {other:?}"),
        }
        assert_eq!(transport.connected_count(), 0);

        // The guard was released: the next scan reaches the host API again.
        match transport.start_scanning().await {
            Err(CourrierError::Scan(ScanError::Timeout)) => {}
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_connect_adds_nothing() {
        let transport = PeerTransport::new(Arc::new(MockRadio::supported()));
        let mut device = MockDevice::new("d1");
        device.fail_connect = true;

        assert!(transport.connect(Box::new(device)).await.is_err());
        assert_eq!(transport.connected_count(), 0);
        assert!(transport.connected_devices().is_empty());
    }

    #[tokio::test]
    async fn send_fans_out_and_marks_failing_devices_disconnected() {
        let transport = PeerTransport::new(Arc::new(MockRadio::supported()));
        let healthy = MockDevice::new("d1");
        let broken = MockDevice::new("d2");
        broken.fail_writes.store(true, Ordering::SeqCst);

        transport.connect(Box::new(healthy.clone())).await.unwrap();
        transport.connect(Box::new(broken.clone())).await.unwrap();
        assert_eq!(transport.connected_count(), 2);

        assert!(transport.send(&sample_message()).await);
        assert_eq!(healthy.written.lock().unwrap().len(), 1);
        // Lazy failure detection: the broken device is now out of the set.
        assert_eq!(transport.connected_count(), 1);

        let states: Vec<DeviceState> = transport
            .connected_devices()
            .into_iter()
            .map(|d| d.state)
            .collect();
        assert!(states.contains(&DeviceState::Disconnected));
    }

    #[tokio::test]
    async fn send_with_no_accepting_peer_returns_false() {
        let transport = PeerTransport::new(Arc::new(MockRadio::supported()));
        let broken = MockDevice::new("d1");
        broken.fail_writes.store(true, Ordering::SeqCst);

        transport.connect(Box::new(broken)).await.unwrap();
        assert!(!transport.send(&sample_message()).await);
        assert_eq!(transport.connected_count(), 0);
    }

    #[tokio::test]
    async fn inbound_frames_reach_handlers_and_malformed_ones_do_not() {
        let transport = PeerTransport::new(Arc::new(MockRadio::supported()));
        let device = MockDevice::new("d1");
        transport.connect(Box::new(device.clone())).await.unwrap();

        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = Arc::clone(&received);
        let _subscription = transport.on_message(move |message| {
            received_clone.lock().unwrap().push(message.clone());
        });

        let frame = PeerFrame::pack(&sample_message()).to_bytes().unwrap();
        device.push_inbound(&frame);
        device.push_inbound(b"garbage");

        let messages = received.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].transport, Transport::Peer);
        assert!(messages[0].needs_remote_sync);
    }

    #[tokio::test]
    async fn unsubscribe_stops_fan_out() {
        let transport = PeerTransport::new(Arc::new(MockRadio::supported()));
        let device = MockDevice::new("d1");
        transport.connect(Box::new(device.clone())).await.unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let subscription = transport.on_message(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        let frame = PeerFrame::pack(&sample_message()).to_bytes().unwrap();
        device.push_inbound(&frame);
        subscription.unsubscribe();
        device.push_inbound(&frame);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disconnect_all_clears_the_set() {
        let transport = PeerTransport::new(Arc::new(MockRadio::supported()));
        transport.connect(Box::new(MockDevice::new("d1"))).await.unwrap();
        transport.connect(Box::new(MockDevice::new("d2"))).await.unwrap();

        transport.disconnect_all().await;
        assert_eq!(transport.connected_count(), 0);
        assert!(!transport.is_available());
    }
}
