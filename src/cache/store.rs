//! Shared client cache: key → envelope store with subscriber registry.
//!
//! The single source of truth for "what does this peer currently believe
//! the server returned for endpoint X". Writes notify local subscribers
//! synchronously before the call returns, then publish over the bridge so
//! sibling peers converge asynchronously. Entries are never evicted — the
//! key universe is bounded by the resource/query combinations the
//! application requests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Instant;

use crate::api::types::Envelope;

use super::bridge::{CacheBridge, CacheMessage, MessageSink, NoopBridge};

/// Callback invoked with the new value on every change to a key.
/// `None` means the key was invalidated.
pub type SubscriberFn = Arc<dyn Fn(Option<Arc<Envelope>>) + Send + Sync>;

/// A cached value together with the instant it was last written.
#[derive(Clone)]
pub struct CachedEntry {
  pub envelope: Arc<Envelope>,
  pub stored_at: Instant,
}

struct Entry {
  value: Option<Arc<Envelope>>,
  stored_at: Instant,
}

struct StoreInner {
  entries: Mutex<HashMap<String, Entry>>,
  subscribers: Mutex<HashMap<String, HashMap<u64, SubscriberFn>>>,
  next_subscriber: AtomicU64,
  bridge: Arc<dyn CacheBridge>,
}

/// Cloneable handle to one cache peer.
#[derive(Clone)]
pub struct SharedCache {
  inner: Arc<StoreInner>,
}

impl SharedCache {
  /// Create a cache connected to the given bridge.
  pub fn new(bridge: Arc<dyn CacheBridge>) -> Self {
    let inner = Arc::new(StoreInner {
      entries: Mutex::new(HashMap::new()),
      subscribers: Mutex::new(HashMap::new()),
      next_subscriber: AtomicU64::new(0),
      bridge,
    });
    let sink = Arc::downgrade(&inner) as Weak<dyn MessageSink>;
    inner.bridge.connect(sink);

    Self { inner }
  }

  /// Create a cache with no peer transport (single-peer behavior).
  pub fn detached() -> Self {
    Self::new(Arc::new(NoopBridge))
  }

  /// Read the current value for a key. Pure, no side effects.
  pub fn get(&self, key: &str) -> Option<Arc<Envelope>> {
    let entries = lock(&self.inner.entries);
    entries.get(key).and_then(|e| e.value.clone())
  }

  /// Read the current value together with its write timestamp.
  ///
  /// Lets a freshly mounted resource judge the staleness of a value it
  /// did not fetch itself.
  pub fn entry(&self, key: &str) -> Option<CachedEntry> {
    let entries = lock(&self.inner.entries);
    entries.get(key).and_then(|e| {
      e.value.as_ref().map(|value| CachedEntry {
        envelope: Arc::clone(value),
        stored_at: e.stored_at,
      })
    })
  }

  /// All keys currently present in the store.
  pub fn keys(&self) -> Vec<String> {
    let entries = lock(&self.inner.entries);
    entries.keys().cloned().collect()
  }

  /// Overwrite a key, notify local subscribers and publish to peers.
  pub fn set(&self, key: &str, envelope: Envelope) {
    let envelope = Arc::new(envelope);
    self.inner.write(key, Some(Arc::clone(&envelope)));
    self.inner.bridge.publish(&CacheMessage::CacheUpdate {
      key: key.to_string(),
      envelope: (*envelope).clone(),
    });
  }

  /// Overwrite a key and notify local subscribers only.
  pub fn set_local(&self, key: &str, envelope: Envelope) {
    self.inner.write(key, Some(Arc::new(envelope)));
  }

  /// Invalidate a key, notify local subscribers with `None` and publish
  /// to peers.
  pub fn invalidate(&self, key: &str) {
    self.inner.write(key, None);
    self.inner.bridge.publish(&CacheMessage::CacheInvalidate {
      key: key.to_string(),
    });
  }

  /// Invalidate a key locally only.
  pub fn invalidate_local(&self, key: &str) {
    self.inner.write(key, None);
  }

  /// Invalidate every present key starting with `prefix` (broadcasting).
  ///
  /// Used for parameterized key families such as the project listings.
  pub fn invalidate_prefix(&self, prefix: &str) {
    let keys: Vec<String> = self
      .keys()
      .into_iter()
      .filter(|k| k.starts_with(prefix))
      .collect();
    for key in keys {
      self.invalidate(&key);
    }
  }

  /// Register interest in a key. The callback fires synchronously on every
  /// change, whatever its origin. Dropping the returned guard unregisters.
  pub fn subscribe(
    &self,
    key: &str,
    callback: impl Fn(Option<Arc<Envelope>>) + Send + Sync + 'static,
  ) -> Subscription {
    let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
    let mut subscribers = lock(&self.inner.subscribers);
    subscribers
      .entry(key.to_string())
      .or_default()
      .insert(id, Arc::new(callback));

    Subscription {
      store: Arc::downgrade(&self.inner),
      key: key.to_string(),
      id,
    }
  }
}

impl StoreInner {
  fn write(&self, key: &str, value: Option<Arc<Envelope>>) {
    {
      let mut entries = lock(&self.entries);
      entries.insert(
        key.to_string(),
        Entry {
          value: value.clone(),
          stored_at: Instant::now(),
        },
      );
    }
    self.notify(key, value);
  }

  fn notify(&self, key: &str, value: Option<Arc<Envelope>>) {
    // Snapshot the callbacks before invoking them so a callback that reads
    // the cache or registers new interest doesn't deadlock.
    let callbacks: Vec<SubscriberFn> = {
      let subscribers = lock(&self.subscribers);
      match subscribers.get(key) {
        Some(set) => set.values().cloned().collect(),
        None => return,
      }
    };

    for callback in callbacks {
      callback(value.clone());
    }
  }
}

impl MessageSink for StoreInner {
  fn apply(&self, message: &CacheMessage) {
    // Never re-publish: peer messages are applied locally only.
    match message {
      CacheMessage::CacheUpdate { key, envelope } => {
        self.write(key, Some(Arc::new(envelope.clone())));
      }
      CacheMessage::CacheInvalidate { key } => {
        self.write(key, None);
      }
    }
  }
}

/// RAII subscription guard returned by [`SharedCache::subscribe`].
pub struct Subscription {
  store: Weak<StoreInner>,
  key: String,
  id: u64,
}

impl Drop for Subscription {
  fn drop(&mut self) {
    let Some(store) = self.store.upgrade() else {
      return;
    };
    let mut subscribers = lock(&store.subscribers);
    if let Some(set) = subscribers.get_mut(&self.key) {
      set.remove(&self.id);
      // Memory hygiene only; an empty set is not a correctness problem.
      if set.is_empty() {
        subscribers.remove(&self.key);
      }
    }
  }
}

// A poisoned lock means a subscriber callback panicked; the maps themselves
// are still consistent, so recover the guard instead of propagating.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
