/// Application name
pub const APP_NAME: &str = "Courrier";

/// Peer wire protocol version tag, carried in every frame
pub const WIRE_VERSION: u8 = 1;

/// GATT service advertised by Courrier peers
pub const RADIO_SERVICE: &str = "courrier-messaging";

/// Characteristic used for message exchange on the radio channel
pub const RADIO_CHARACTERISTIC: &str = "courrier-messages";

/// Maximum encoded peer frame size in bytes (64 KiB)
pub const MAX_PEER_FRAME_SIZE: usize = 65_536;

/// Time-to-live for cached conversation snapshots and metadata (24 h)
pub const CACHE_TTL_SECS: i64 = 24 * 60 * 60;

/// Fixed prefix for every storage key owned by the offline cache
pub const STORAGE_PREFIX: &str = "courrier:";
