//! Geoproxy - Geo-Targeted Residential Proxy Finder
//!
//! Geoproxy geocodes a street address, synthesizes geo-targeted SOAX
//! proxy credentials, and probes them concurrently until it finds one
//! whose exit node sits within a configurable radius of the target and
//! is not on a mobile or flagged network.

pub mod config;
pub mod geocode;
pub mod proxy;
pub mod server;

pub use config::AppConfig;
pub use geocode::{Geocoder, TargetLocation};
pub use proxy::*;

/// Application version reported by the config-status endpoint
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application result type
pub type Result<T> = anyhow::Result<T>;
