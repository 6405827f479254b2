//! Portfolio API facade: per-resource constructors over one shared cache.

use std::sync::Arc;
use std::time::Duration;

use color_eyre::Result;
use serde::{de::DeserializeOwned, Serialize};

use crate::cache::SharedCache;
use crate::config::Config;
use crate::resource::{Resource, ResourceOptions};

use super::client::{HttpTransport, Transport};
use super::keys::ResourceKey;
use super::ops::CacheOps;
use super::types::{Profile, Project, SiteSettings, Skill};

/// Entry point for consumers: holds the shared cache, the transport and
/// the configured defaults, and hands out [`Resource`] bindings.
#[derive(Clone)]
pub struct PortfolioApi {
  cache: SharedCache,
  transport: Arc<dyn Transport>,
  cache_time: Duration,
  poll_interval: Option<Duration>,
}

impl PortfolioApi {
  /// Build from configuration with a detached (single-peer) cache.
  pub fn new(config: &Config) -> Result<Self> {
    let transport = Arc::new(HttpTransport::new(&config.api.base_url)?);
    Ok(Self::with_parts(
      SharedCache::detached(),
      transport,
      config.cache.cache_time(),
    )
    .with_poll_interval(config.cache.poll_interval()))
  }

  /// Build from explicit parts. Lets callers share a bridged cache between
  /// peers, and lets tests substitute the transport.
  pub fn with_parts(
    cache: SharedCache,
    transport: Arc<dyn Transport>,
    cache_time: Duration,
  ) -> Self {
    Self {
      cache,
      transport,
      cache_time,
      poll_interval: None,
    }
  }

  /// Default background polling interval applied to constructed resources.
  pub fn with_poll_interval(mut self, interval: Option<Duration>) -> Self {
    self.poll_interval = interval;
    self
  }

  /// Handle to the underlying cache peer.
  pub fn cache(&self) -> SharedCache {
    self.cache.clone()
  }

  /// Direct cache operations for write-path code.
  pub fn ops(&self) -> CacheOps {
    CacheOps::new(self.cache.clone())
  }

  /// Project listing, optionally filtered by category and featured flag.
  pub fn projects(
    &self,
    category: Option<&str>,
    featured: Option<bool>,
  ) -> Resource<Vec<Project>> {
    let key = ResourceKey::Projects {
      category: category.map(String::from),
      featured,
    };
    self.bind(key, self.listing_options())
  }

  /// Skills listing.
  pub fn skills(&self) -> Resource<Vec<Skill>> {
    self.bind(ResourceKey::Skills, self.listing_options())
  }

  /// Owner profile. Changes rarely: longer cache time, no focus refetch.
  pub fn profile(&self) -> Resource<Profile> {
    self.bind(ResourceKey::Profile, self.record_options())
  }

  /// Site settings. Same policy as the profile record.
  pub fn settings(&self) -> Resource<SiteSettings> {
    self.bind(ResourceKey::Settings, self.record_options())
  }

  fn listing_options(&self) -> ResourceOptions {
    ResourceOptions::default()
      .with_cache_time(self.cache_time)
      .with_revalidate_interval(self.poll_interval)
  }

  fn record_options(&self) -> ResourceOptions {
    ResourceOptions::default()
      .with_cache_time(self.cache_time * 2)
      .with_revalidate_on_focus(false)
      .with_revalidate_interval(self.poll_interval)
  }

  fn bind<T>(&self, key: ResourceKey, options: ResourceOptions) -> Resource<T>
  where
    T: Clone + Send + Serialize + DeserializeOwned + 'static,
  {
    Resource::new(
      self.cache.clone(),
      Arc::clone(&self.transport),
      key.render(),
      options,
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::Envelope;
  use color_eyre::eyre::eyre;
  use futures::future::BoxFuture;
  use serde_json::json;
  use std::sync::Mutex;

  /// Serves a fixed envelope per path and records the targets requested.
  struct RouteTransport {
    routes: Vec<(&'static str, Envelope)>,
    requested: Mutex<Vec<String>>,
  }

  impl Transport for RouteTransport {
    fn get(&self, target: &str) -> BoxFuture<'_, Result<Envelope>> {
      self.requested.lock().unwrap().push(target.to_string());
      let found = self
        .routes
        .iter()
        .find(|(path, _)| *path == target)
        .map(|(_, envelope)| envelope.clone());
      Box::pin(async move { found.ok_or_else(|| eyre!("no route for target")) })
    }
  }

  fn api(routes: Vec<(&'static str, Envelope)>) -> (PortfolioApi, Arc<RouteTransport>) {
    let transport = Arc::new(RouteTransport {
      routes,
      requested: Mutex::new(Vec::new()),
    });
    let api = PortfolioApi::with_parts(
      SharedCache::detached(),
      transport.clone(),
      Duration::from_secs(300),
    );
    (api, transport)
  }

  #[tokio::test]
  async fn test_projects_resource_targets_filtered_endpoint() {
    let (api, transport) = api(vec![(
      "/api/projects?category=web&featured=true",
      Envelope::ok(json!([])),
    )]);

    let resource = api.projects(Some("web"), Some(true));
    assert_eq!(resource.key(), "/api/projects?category=web&featured=true");

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(
      *transport.requested.lock().unwrap(),
      vec!["/api/projects?category=web&featured=true".to_string()]
    );
  }

  #[tokio::test]
  async fn test_skills_resource_decodes_listing() {
    let (api, _) = api(vec![(
      "/api/skills",
      Envelope::ok(json!([{ "id": "1", "title": "Design", "proficiency": 80 }])),
    )]);

    let resource = api.skills();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let snapshot = resource.snapshot();
    let skills = snapshot.data.unwrap().data.unwrap();
    assert_eq!(skills[0].proficiency, 80);
  }

  #[tokio::test]
  async fn test_resources_share_one_cache() {
    let (api, transport) = api(vec![(
      "/api/skills",
      Envelope::ok(json!([{ "id": "1", "title": "Design", "proficiency": 80 }])),
    )]);

    let first = api.skills();
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Warm, fresh cache: the second binding never hits the network.
    let second = api.skills();
    assert!(second.snapshot().data.is_some());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(transport.requested.lock().unwrap().len(), 1);

    drop(first);
  }
}
