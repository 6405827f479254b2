//! Client-side data cache and sync engine for the portfolio API.
//!
//! The portfolio site's UI reads everything through one shared cache so
//! that every consumer — and every peer holding the same data — agrees on
//! what the server last said. This crate provides:
//!
//! - [`cache::SharedCache`]: key → envelope store with synchronous local
//!   subscriber notification and best-effort cross-peer broadcast
//! - [`resource::Resource`]: SWR-style binding managing the full
//!   fetch / revalidate / optimistic-mutate lifecycle for one key
//! - [`api::PortfolioApi`]: per-resource constructors (projects, skills,
//!   profile, settings) plus direct cache operations for write-path code

pub mod api;
pub mod cache;
pub mod config;
pub mod resource;

pub use api::types::{Envelope, Profile, Project, SiteSettings, Skill, TypedEnvelope};
pub use api::{CacheOps, HttpTransport, PortfolioApi, ResourceKey, Transport};
pub use cache::{CacheBridge, CacheMessage, MemoryHub, NoopBridge, SharedCache};
pub use config::Config;
pub use resource::{Mutation, Resource, ResourceOptions, ResourceSnapshot};
