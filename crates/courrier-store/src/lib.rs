//! # courrier-store
//!
//! The Local Durable Cache: key-value persistence for cached conversation
//! snapshots, cached conversation metadata, and the per-conversation
//! pending-message queue.
//!
//! The cache is pure storage. It owns the key layout and (de)serialization,
//! but never inspects message semantics and never makes transport decisions.
//! Every public operation is synchronous and infallible at the surface:
//! substrate failures and corrupt entries are logged and treated as absent.

pub mod cache;
pub mod database;
pub mod models;
pub mod pending;
pub mod storage;

mod error;

pub use cache::{CacheConfig, OfflineCache};
pub use database::SqliteStorage;
pub use error::StoreError;
pub use models::{CachedMetadata, CachedSnapshot, PendingEntry};
pub use storage::{KeyValueStorage, MemoryStorage};
