//! Portfolio API layer: transport, models, keys and resource constructors.

pub mod client;
pub mod keys;
pub mod ops;
pub mod portfolio;
pub mod types;

pub use client::{HttpTransport, Transport};
pub use keys::ResourceKey;
pub use ops::CacheOps;
pub use portfolio::PortfolioApi;
