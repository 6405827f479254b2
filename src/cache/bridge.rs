//! Cross-peer broadcast bridge.
//!
//! A [`SharedCache`](super::SharedCache) publishes every write over a
//! [`CacheBridge`] so that sibling caches (other "tabs" of the application)
//! converge. Environments without a usable transport plug in [`NoopBridge`]
//! and degrade silently to single-peer behavior; tests and multi-consumer
//! processes wire peers together through [`MemoryHub`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};

use crate::api::types::Envelope;

/// A cache synchronization message.
///
/// Messages are idempotent: applying the same message twice leaves the
/// receiving cache in the same state as applying it once. Delivery is
/// ordered per sender only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CacheMessage {
  /// A key was overwritten with a new envelope.
  CacheUpdate { key: String, envelope: Envelope },
  /// A key was invalidated.
  CacheInvalidate { key: String },
}

/// Receiving side of the bridge, implemented by the cache itself.
///
/// Applying a message must never re-publish it, otherwise two connected
/// peers would bounce updates back and forth forever.
pub trait MessageSink: Send + Sync {
  fn apply(&self, message: &CacheMessage);
}

/// Publishing side of the bridge.
pub trait CacheBridge: Send + Sync {
  /// Register the cache that wants to receive peer messages.
  ///
  /// Called once during cache construction. The default implementation
  /// discards the sink (no incoming traffic).
  fn connect(&self, _sink: Weak<dyn MessageSink>) {}

  /// Publish a message to all other peers. Best-effort: a bridge with no
  /// reachable peers simply drops the message.
  fn publish(&self, message: &CacheMessage);
}

/// Bridge for environments without any peer transport.
///
/// Writes stay local; nothing arrives. This is the accepted degradation
/// path, not an error.
pub struct NoopBridge;

impl CacheBridge for NoopBridge {
  fn publish(&self, _message: &CacheMessage) {}
}

// ============================================================================
// In-memory hub
// ============================================================================

struct Peer {
  id: u64,
  sink: Weak<dyn MessageSink>,
}

/// An in-process hub connecting any number of cache peers.
///
/// Each attached peer stands in for one browser tab: a publish from one
/// peer is delivered synchronously to every other peer attached at send
/// time. Peers are held weakly; a dropped cache stops receiving. Peers
/// attached after a message was sent do not see it retroactively.
pub struct MemoryHub {
  peers: Mutex<Vec<Peer>>,
  next_id: AtomicU64,
}

impl MemoryHub {
  pub fn new() -> Arc<Self> {
    Arc::new(Self {
      peers: Mutex::new(Vec::new()),
      next_id: AtomicU64::new(0),
    })
  }

  /// Create a bridge handle for one new peer.
  pub fn bridge(self: &Arc<Self>) -> Arc<HubBridge> {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    Arc::new(HubBridge {
      hub: Arc::clone(self),
      id,
    })
  }

  fn register(&self, id: u64, sink: Weak<dyn MessageSink>) {
    let mut peers = lock_peers(&self.peers);
    peers.push(Peer { id, sink });
  }

  fn deliver(&self, from: u64, message: &CacheMessage) {
    // Collect live sinks first so no lock is held while applying — a sink
    // callback may read its own cache or subscribe new interest.
    let sinks: Vec<Arc<dyn MessageSink>> = {
      let mut peers = lock_peers(&self.peers);
      peers.retain(|p| p.sink.strong_count() > 0);
      peers
        .iter()
        .filter(|p| p.id != from)
        .filter_map(|p| p.sink.upgrade())
        .collect()
    };

    for sink in sinks {
      sink.apply(message);
    }
  }
}

/// Per-peer bridge handle produced by [`MemoryHub::bridge`].
pub struct HubBridge {
  hub: Arc<MemoryHub>,
  id: u64,
}

impl CacheBridge for HubBridge {
  fn connect(&self, sink: Weak<dyn MessageSink>) {
    self.hub.register(self.id, sink);
  }

  fn publish(&self, message: &CacheMessage) {
    self.hub.deliver(self.id, message);
  }
}

// A panicked sink left the peer list itself untouched; recover the guard.
fn lock_peers(peers: &Mutex<Vec<Peer>>) -> std::sync::MutexGuard<'_, Vec<Peer>> {
  peers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::sync::Mutex;

  struct RecordingSink {
    received: Mutex<Vec<CacheMessage>>,
  }

  impl RecordingSink {
    fn new() -> Arc<Self> {
      Arc::new(Self {
        received: Mutex::new(Vec::new()),
      })
    }

    fn received(&self) -> Vec<CacheMessage> {
      self.received.lock().unwrap().clone()
    }
  }

  impl MessageSink for RecordingSink {
    fn apply(&self, message: &CacheMessage) {
      self.received.lock().unwrap().push(message.clone());
    }
  }

  fn update(key: &str) -> CacheMessage {
    CacheMessage::CacheUpdate {
      key: key.to_string(),
      envelope: Envelope::ok(json!([1, 2, 3])),
    }
  }

  #[test]
  fn test_publish_reaches_other_peers_but_not_sender() {
    let hub = MemoryHub::new();
    let bridge_a = hub.bridge();
    let bridge_b = hub.bridge();

    let sink_a = RecordingSink::new();
    let sink_b = RecordingSink::new();
    bridge_a.connect(Arc::downgrade(&sink_a) as Weak<dyn MessageSink>);
    bridge_b.connect(Arc::downgrade(&sink_b) as Weak<dyn MessageSink>);

    bridge_a.publish(&update("/api/skills"));

    assert!(sink_a.received().is_empty());
    assert_eq!(sink_b.received(), vec![update("/api/skills")]);
  }

  #[test]
  fn test_dropped_peer_stops_receiving() {
    let hub = MemoryHub::new();
    let bridge_a = hub.bridge();
    let bridge_b = hub.bridge();

    let sink_b = RecordingSink::new();
    bridge_b.connect(Arc::downgrade(&sink_b) as Weak<dyn MessageSink>);
    drop(sink_b);

    // Delivery to a dropped sink must not panic or error.
    bridge_a.publish(&update("/api/skills"));
  }

  #[test]
  fn test_late_joiner_gets_no_old_messages() {
    let hub = MemoryHub::new();
    let bridge_a = hub.bridge();

    bridge_a.publish(&update("/api/skills"));

    let bridge_b = hub.bridge();
    let sink_b = RecordingSink::new();
    bridge_b.connect(Arc::downgrade(&sink_b) as Weak<dyn MessageSink>);

    assert!(sink_b.received().is_empty());
  }

  #[test]
  fn test_message_wire_shape() {
    let message = CacheMessage::CacheInvalidate {
      key: "/api/skills".to_string(),
    };

    let wire = serde_json::to_value(&message).unwrap();
    assert_eq!(
      wire,
      json!({ "type": "cache-invalidate", "key": "/api/skills" })
    );
  }
}
