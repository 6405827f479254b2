//! Shared client cache with cross-peer synchronization.
//!
//! This module provides the storage half of the data layer:
//! - A key → envelope store with a per-key subscriber registry
//! - Synchronous local change notification
//! - Best-effort cross-peer convergence over a pluggable broadcast bridge

mod bridge;
mod store;

pub use bridge::{CacheBridge, CacheMessage, MemoryHub, MessageSink, NoopBridge};
pub use store::{CachedEntry, SharedCache, SubscriberFn, Subscription};
