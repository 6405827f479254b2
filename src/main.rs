use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use portfolio_data::{config, PortfolioApi, Resource};

#[derive(Parser, Debug)]
#[command(name = "portfolio-data")]
#[command(about = "Fetch and watch portfolio resources through the client cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/portfolio-data/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Fetch a resource once and print it
  Fetch {
    resource: ResourceArg,
    /// Project category filter (projects only)
    #[arg(long)]
    category: Option<String>,
    /// Featured flag filter (projects only)
    #[arg(long)]
    featured: Option<bool>,
  },
  /// Keep a resource bound and print every state change
  Watch {
    resource: ResourceArg,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    featured: Option<bool>,
    /// Background refetch interval in seconds
    #[arg(long, default_value_t = 30)]
    interval: u64,
  },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ResourceArg {
  Projects,
  Skills,
  Profile,
  Settings,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  let config = config::Config::load(args.config.as_deref())?;
  let api = PortfolioApi::new(&config)?;

  match args.command {
    Command::Fetch {
      resource,
      category,
      featured,
    } => match resource {
      ResourceArg::Projects => fetch_once(api.projects(category.as_deref(), featured)).await,
      ResourceArg::Skills => fetch_once(api.skills()).await,
      ResourceArg::Profile => fetch_once(api.profile()).await,
      ResourceArg::Settings => fetch_once(api.settings()).await,
    },
    Command::Watch {
      resource,
      category,
      featured,
      interval,
    } => {
      let api = api.with_poll_interval(Some(Duration::from_secs(interval)));
      match resource {
        ResourceArg::Projects => watch(api.projects(category.as_deref(), featured)).await,
        ResourceArg::Skills => watch(api.skills()).await,
        ResourceArg::Profile => watch(api.profile()).await,
        ResourceArg::Settings => watch(api.settings()).await,
      }
    }
  }
}

/// Wait for the mount fetch to resolve one way or the other, then print.
async fn fetch_once<T>(resource: Resource<T>) -> Result<()>
where
  T: Clone + Send + Serialize + DeserializeOwned + 'static,
{
  let mut changes = resource.subscribe_changes();
  loop {
    let snapshot = resource.snapshot();
    if let Some(data) = &snapshot.data {
      if !snapshot.is_validating {
        println!("{}", serde_json::to_string_pretty(data)?);
        return Ok(());
      }
    } else if let Some(error) = &snapshot.error {
      return Err(eyre!("Fetch failed: {}", error));
    }
    changes.changed().await?;
  }
}

/// Print every state change until interrupted.
async fn watch<T>(resource: Resource<T>) -> Result<()>
where
  T: Clone + Send + Serialize + DeserializeOwned + 'static,
{
  let mut changes = resource.subscribe_changes();
  loop {
    tokio::select! {
      _ = tokio::signal::ctrl_c() => return Ok(()),
      changed = changes.changed() => {
        changed?;
        let snapshot = resource.snapshot();
        if let Some(error) = &snapshot.error {
          eprintln!("error: {}", error);
        }
        if let Some(data) = &snapshot.data {
          println!("{}", serde_json::to_string_pretty(data)?);
        }
      }
    }
  }
}
