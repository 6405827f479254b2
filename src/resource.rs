//! Async resource binding with caching, revalidation and optimistic writes.
//!
//! Inspired by SWR-style data hooks, a `Resource<T>` binds one consumer to
//! one cache key and manages the full fetch lifecycle:
//!
//! - Adopts a fresh cached value on construction without touching the network
//! - Fetches on cold or stale cache, exposing `is_loading` / `is_validating`
//! - Subscribes to the shared cache so writes from any other consumer (or a
//!   peer cache on the same bridge) are adopted synchronously
//! - Self-heals after an invalidation by refetching
//! - Supports optimistic mutation with snapshot rollback on failed
//!   reconciliation
//!
//! # Example
//!
//! ```ignore
//! let resource: Resource<Vec<Skill>> = Resource::new(
//!   cache.clone(),
//!   transport.clone(),
//!   ResourceKey::Skills.render(),
//!   ResourceOptions::default(),
//! );
//!
//! let mut changes = resource.subscribe_changes();
//! changes.changed().await?;
//! let snapshot = resource.snapshot();
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use color_eyre::Result;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::client::Transport;
use crate::api::types::{Envelope, TypedEnvelope};
use crate::cache::{SharedCache, Subscription};

/// Minimum gap between a fetch and a focus-triggered revalidation.
pub const FOCUS_THROTTLE: Duration = Duration::from_secs(30);

/// Default staleness threshold for cached values.
pub const DEFAULT_CACHE_TIME: Duration = Duration::from_secs(5 * 60);

/// Tuning knobs recognized by the engine.
#[derive(Debug, Clone)]
pub struct ResourceOptions {
  /// Refetch in the background when the consumer regains focus, throttled
  /// by [`FOCUS_THROTTLE`].
  pub revalidate_on_focus: bool,
  /// Recurring background refetch while the resource is alive.
  pub revalidate_interval: Option<Duration>,
  /// How long a cached value counts as fresh.
  pub cache_time: Duration,
  /// Whether `mutate` applies a supplied value before reconciling.
  pub optimistic_update: bool,
}

impl Default for ResourceOptions {
  fn default() -> Self {
    Self {
      revalidate_on_focus: true,
      revalidate_interval: None,
      cache_time: DEFAULT_CACHE_TIME,
      optimistic_update: true,
    }
  }
}

impl ResourceOptions {
  pub fn with_cache_time(mut self, cache_time: Duration) -> Self {
    self.cache_time = cache_time;
    self
  }

  pub fn with_revalidate_interval(mut self, interval: Option<Duration>) -> Self {
    self.revalidate_interval = interval;
    self
  }

  pub fn with_revalidate_on_focus(mut self, on: bool) -> Self {
    self.revalidate_on_focus = on;
    self
  }
}

/// Point-in-time view of a resource's state.
#[derive(Debug, Clone)]
pub struct ResourceSnapshot<T> {
  /// Last known envelope, possibly stale.
  pub data: Option<TypedEnvelope<T>>,
  /// True only while there is no data yet and a fetch is in flight.
  pub is_loading: bool,
  /// True whenever any fetch is in flight, including background ones.
  pub is_validating: bool,
  /// Last fetch's error message, cleared on the next successful fetch.
  pub error: Option<String>,
}

/// The value side of a [`Resource::mutate`] call.
pub enum Mutation<T> {
  /// Replace the current envelope outright.
  Value(TypedEnvelope<T>),
  /// Derive the next envelope from the current one.
  Update(Box<dyn FnOnce(Option<&TypedEnvelope<T>>) -> TypedEnvelope<T> + Send>),
}

impl<T> Mutation<T> {
  pub fn value(next: TypedEnvelope<T>) -> Self {
    Self::Value(next)
  }

  pub fn update(
    f: impl FnOnce(Option<&TypedEnvelope<T>>) -> TypedEnvelope<T> + Send + 'static,
  ) -> Self {
    Self::Update(Box::new(f))
  }
}

struct ResourceState<T> {
  data: Option<TypedEnvelope<T>>,
  is_loading: bool,
  is_validating: bool,
  error: Option<String>,
  last_fetch: Option<Instant>,
  /// Monotonic fetch counter; a completed fetch whose number is no longer
  /// current was superseded and its response is discarded.
  generation: u64,
}

impl<T> Default for ResourceState<T> {
  fn default() -> Self {
    Self {
      data: None,
      is_loading: false,
      is_validating: false,
      error: None,
      last_fetch: None,
      generation: 0,
    }
  }
}

struct ResourceShared<T> {
  key: String,
  cache: SharedCache,
  transport: Arc<dyn Transport>,
  options: ResourceOptions,
  state: Mutex<ResourceState<T>>,
  version: watch::Sender<u64>,
  heal_tx: mpsc::UnboundedSender<()>,
  /// Set while this instance is invalidating on purpose, so its own `None`
  /// notification doesn't queue a redundant self-heal fetch.
  suppress_heal: AtomicBool,
}

/// One consumer's binding to a cache key.
///
/// Dropping the resource aborts its background tasks; an in-flight response
/// arriving afterwards is discarded rather than applied.
pub struct Resource<T> {
  shared: Arc<ResourceShared<T>>,
  _subscription: Subscription,
  tasks: Vec<JoinHandle<()>>,
}

impl<T> Resource<T>
where
  T: Clone + Send + Serialize + DeserializeOwned + 'static,
{
  /// Bind to `key` and start the lifecycle.
  ///
  /// A fresh cached value is adopted without fetching; a stale one is
  /// adopted and revalidated in the background; a cold cache triggers a
  /// fetch with `is_loading` set until the first response. Must be called
  /// from within a tokio runtime.
  pub fn new(
    cache: SharedCache,
    transport: Arc<dyn Transport>,
    key: String,
    options: ResourceOptions,
  ) -> Self {
    let (heal_tx, mut heal_rx) = mpsc::unbounded_channel();
    let (version, _) = watch::channel(0u64);

    let shared = Arc::new(ResourceShared {
      key,
      cache: cache.clone(),
      transport,
      options: options.clone(),
      state: Mutex::new(ResourceState::default()),
      version,
      heal_tx,
      suppress_heal: AtomicBool::new(false),
    });

    // Mount: adopt whatever the cache already holds. Staleness of a value
    // this instance never fetched is judged by the entry's write time.
    let mut needs_fetch = true;
    let mut show_loading = true;
    if let Some(entry) = cache.entry(&shared.key) {
      shared.adopt(Some(entry.envelope));
      show_loading = false;
      needs_fetch = entry.stored_at.elapsed() > options.cache_time;
    }
    if needs_fetch && show_loading {
      // Loading must be observable before the fetch task gets scheduled.
      shared.lock_state().is_loading = true;
    }

    let weak = Arc::downgrade(&shared);
    let subscription = cache.subscribe(&shared.key, move |value| {
      if let Some(shared) = weak.upgrade() {
        shared.adopt(value);
      }
    });

    let mut tasks = Vec::new();

    if needs_fetch {
      let shared = Arc::clone(&shared);
      tasks.push(tokio::spawn(async move {
        if let Err(error) = shared.fetch(show_loading).await {
          debug!("Initial fetch for {} failed: {}", shared.key, error);
        }
      }));
    }

    // Self-heal: an external invalidation leaves the key absent; refetch
    // unless some fetch is already reconciling.
    let weak = Arc::downgrade(&shared);
    tasks.push(tokio::spawn(async move {
      while heal_rx.recv().await.is_some() {
        let Some(shared) = weak.upgrade() else { break };
        if shared.lock_state().is_validating {
          continue;
        }
        if let Err(error) = shared.fetch(false).await {
          warn!("Self-heal fetch for {} failed: {}", shared.key, error);
        }
      }
    }));

    if let Some(every) = options.revalidate_interval {
      let weak = Arc::downgrade(&shared);
      tasks.push(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; the mount fetch covers it.
        ticker.tick().await;
        loop {
          ticker.tick().await;
          let Some(shared) = weak.upgrade() else { break };
          if let Err(error) = shared.fetch(false).await {
            warn!("Interval revalidation for {} failed: {}", shared.key, error);
          }
        }
      }));
    }

    Self {
      shared,
      _subscription: subscription,
      tasks,
    }
  }

  /// The cache key this resource is bound to.
  pub fn key(&self) -> &str {
    &self.shared.key
  }

  /// Current state, cloned.
  pub fn snapshot(&self) -> ResourceSnapshot<T> {
    let state = self.shared.lock_state();
    ResourceSnapshot {
      data: state.data.clone(),
      is_loading: state.is_loading,
      is_validating: state.is_validating,
      error: state.error.clone(),
    }
  }

  /// Receiver that changes whenever the resource's state does.
  pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
    self.shared.version.subscribe()
  }

  /// Force a fetch, propagating failure to the caller.
  pub async fn refetch(&self) -> Result<()> {
    self.shared.fetch(false).await
  }

  /// Clear the cache entry (broadcasting the clear) and refetch.
  ///
  /// Sibling consumers of the key self-heal via their own subscription;
  /// this instance fetches directly so the caller sees the outcome.
  pub async fn invalidate(&self) -> Result<()> {
    let shared = &self.shared;
    shared.suppress_heal.store(true, Ordering::Relaxed);
    shared.cache.invalidate(&shared.key);
    shared.suppress_heal.store(false, Ordering::Relaxed);
    shared.fetch(false).await
  }

  /// Optimistically apply a value and reconcile with the server.
  ///
  /// With a mutation supplied (and `optimistic_update` enabled), the next
  /// value is written to local state and the shared cache — visible to
  /// every subscriber of the key, including peers, before any network
  /// round-trip. If `revalidate` and the reconciling fetch fails, the
  /// pre-mutation cache snapshot is restored and the error is returned.
  pub async fn mutate(&self, mutation: Option<Mutation<T>>, revalidate: bool) -> Result<()> {
    let shared = &self.shared;
    let snapshot = shared.cache.get(&shared.key);
    let mut applied = false;

    if let Some(mutation) = mutation {
      if shared.options.optimistic_update {
        let current = shared.lock_state().data.clone();
        let next = match mutation {
          Mutation::Value(value) => value,
          Mutation::Update(f) => f(current.as_ref()),
        };
        let envelope = next.encode()?;

        shared.lock_state().data = Some(next);
        shared.bump();
        shared.cache.set(&shared.key, envelope);
        applied = true;
      }
    }

    if revalidate {
      if let Err(error) = shared.fetch(false).await {
        if applied {
          self.rollback(snapshot);
        }
        return Err(error);
      }
    }

    Ok(())
  }

  /// Notify the resource that its consumer regained focus.
  ///
  /// Triggers a background revalidation when enabled and the last fetch is
  /// older than [`FOCUS_THROTTLE`]. Failures land in the `error` field only.
  pub fn focus(&self) {
    if !self.shared.options.revalidate_on_focus {
      return;
    }
    let due = {
      let state = self.shared.lock_state();
      state
        .last_fetch
        .map(|at| at.elapsed() > FOCUS_THROTTLE)
        .unwrap_or(true)
    };
    if !due {
      return;
    }

    let weak = Arc::downgrade(&self.shared);
    tokio::spawn(async move {
      let Some(shared) = weak.upgrade() else { return };
      if let Err(error) = shared.fetch(false).await {
        warn!("Focus revalidation for {} failed: {}", shared.key, error);
      }
    });
  }

  fn rollback(&self, snapshot: Option<Arc<Envelope>>) {
    let shared = &self.shared;
    match snapshot {
      Some(envelope) => shared.cache.set(&shared.key, (*envelope).clone()),
      None => {
        // Nothing preceded the optimistic write; clear it without queueing
        // a self-heal fetch (the reconciling fetch just failed).
        shared.suppress_heal.store(true, Ordering::Relaxed);
        shared.cache.invalidate(&shared.key);
        shared.suppress_heal.store(false, Ordering::Relaxed);
      }
    }
  }
}

impl<T> Drop for Resource<T> {
  fn drop(&mut self) {
    for task in &self.tasks {
      task.abort();
    }
  }
}

impl<T> ResourceShared<T>
where
  T: Clone + Send + Serialize + DeserializeOwned + 'static,
{
  fn lock_state(&self) -> MutexGuard<'_, ResourceState<T>> {
    // Poisoning can only come from a panicked caller between state writes;
    // individual fields stay usable.
    self
      .state
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  fn bump(&self) {
    self.version.send_modify(|v| *v = v.wrapping_add(1));
  }

  /// Adopt an external notification from the shared cache.
  fn adopt(&self, value: Option<Arc<Envelope>>) {
    match value {
      Some(envelope) => match envelope.decode::<T>() {
        Ok(typed) => {
          self.lock_state().data = Some(typed);
        }
        Err(error) => {
          self.lock_state().error = Some(error.to_string());
          warn!("Cached value for {} failed to decode: {}", self.key, error);
        }
      },
      None => {
        self.lock_state().data = None;
        if !self.suppress_heal.load(Ordering::Relaxed) {
          let _ = self.heal_tx.send(());
        }
      }
    }
    self.bump();
  }

  async fn fetch(&self, show_loading: bool) -> Result<()> {
    let generation = {
      let mut state = self.lock_state();
      state.generation += 1;
      if show_loading && state.data.is_none() {
        state.is_loading = true;
      }
      state.is_validating = true;
      state.error = None;
      state.generation
    };
    self.bump();

    let result = self.transport.get(&self.key).await;

    let mut state = self.lock_state();
    if state.generation != generation {
      // Superseded while in flight; the newer fetch owns the flags now.
      return Ok(());
    }

    match result {
      Ok(envelope) => {
        let decoded = envelope.decode::<T>();
        state.is_loading = false;
        state.is_validating = false;
        match decoded {
          Ok(typed) => {
            state.data = Some(typed);
            state.last_fetch = Some(Instant::now());
            drop(state);
            self.bump();
            // Broadcast after local adoption; our own subscription re-adopts
            // the same value, which is idempotent.
            self.cache.set(&self.key, envelope);
            Ok(())
          }
          Err(error) => {
            state.error = Some(error.to_string());
            drop(state);
            self.bump();
            Err(error)
          }
        }
      }
      Err(error) => {
        // Stale-while-error: prior data stays in place.
        state.error = Some(error.to_string());
        state.is_loading = false;
        state.is_validating = false;
        drop(state);
        self.bump();
        Err(error)
      }
    }
  }
}
