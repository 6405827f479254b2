use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheTuning,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Origin the endpoint paths are resolved against,
  /// e.g. "https://portfolio.example.com".
  pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheTuning {
  /// How long a cached value counts as fresh, in seconds.
  #[serde(default = "default_cache_time_secs")]
  pub cache_time_secs: u64,
  /// Background polling interval in seconds; absent means off.
  #[serde(default)]
  pub poll_interval_secs: Option<u64>,
}

fn default_cache_time_secs() -> u64 {
  300
}

impl Default for CacheTuning {
  fn default() -> Self {
    Self {
      cache_time_secs: default_cache_time_secs(),
      poll_interval_secs: None,
    }
  }
}

impl CacheTuning {
  pub fn cache_time(&self) -> Duration {
    Duration::from_secs(self.cache_time_secs)
  }

  pub fn poll_interval(&self) -> Option<Duration> {
    self.poll_interval_secs.map(Duration::from_secs)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./portfolio.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/portfolio-data/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/portfolio-data/config.yaml\n\
                 with at least an api.base_url entry."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("portfolio.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("portfolio-data").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }
}
