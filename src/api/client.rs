//! HTTP transport for portfolio endpoints.

use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use url::Url;

use super::types::Envelope;

/// Seam between the resource engine and the network.
///
/// `target` is the canonical key string (path plus query). Tests supply
/// in-memory implementations with scripted responses.
pub trait Transport: Send + Sync {
  fn get(&self, target: &str) -> BoxFuture<'_, Result<Envelope>>;
}

/// Transport backed by `reqwest` against a configured base URL.
///
/// Requests carry cache-defeating headers: the application cache is
/// authoritative, not the HTTP layer.
#[derive(Clone)]
pub struct HttpTransport {
  http: reqwest::Client,
  base_url: Url,
}

impl HttpTransport {
  pub fn new(base_url: &str) -> Result<Self> {
    let base_url = Url::parse(base_url)
      .map_err(|e| eyre!("Invalid API base URL '{}': {}", base_url, e))?;

    Ok(Self {
      http: reqwest::Client::new(),
      base_url,
    })
  }
}

impl Transport for HttpTransport {
  fn get(&self, target: &str) -> BoxFuture<'_, Result<Envelope>> {
    let url = self.base_url.join(target);
    let http = self.http.clone();

    Box::pin(async move {
      let url = url.map_err(|e| eyre!("Invalid request target: {}", e))?;

      let response = http
        .get(url.clone())
        .header(CACHE_CONTROL, "no-cache")
        .header(PRAGMA, "no-cache")
        .send()
        .await
        .map_err(|e| eyre!("Request to {} failed: {}", url, e))?;

      // Any non-2xx status is a hard failure regardless of body content.
      let status = response.status();
      if !status.is_success() {
        return Err(eyre!("Request to {} failed with status {}", url, status));
      }

      response
        .json::<Envelope>()
        .await
        .map_err(|e| eyre!("Failed to parse response from {}: {}", url, e))
    })
  }
}
