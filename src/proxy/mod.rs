//! Proxy core: credential synthesis, probing, and selection
//!
//! This module provides functionality for:
//! - Building SOAX geo-targeted proxy credentials with random sessions
//! - Probing a credential's exit IP and network classification
//! - Selecting the first acceptable credential from a concurrent batch

pub mod builder;
pub mod distance;
pub mod models;
pub mod policy;
pub mod probe;
pub mod selector;

pub use builder::{CredentialBuilder, Targeting, DEFAULT_SESSION_LENGTH_SECS};
pub use distance::haversine_miles;
pub use models::{ExitReport, ProbeVerdict, ProxyCredential, SelectionOutcome, VerdictSnapshot};
pub use policy::{AcceptancePolicy, DEFAULT_MAX_DISTANCE_MILES};
pub use probe::{Prober, ProxyProbe};
pub use selector::{ProxySelector, SelectorConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_WAVE_SIZE};
