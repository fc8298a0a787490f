//! Credential synthesizer for SOAX geo-targeted proxy strings
//!
//! The provider parses the username as '-'-joined `key-value` fields,
//! so field order and normalization here are a fixed external
//! contract, not a style choice.

use crate::geocode::TargetLocation;
use crate::proxy::models::ProxyCredential;
use rand::{distributions::Alphanumeric, Rng};

/// Provider tag carried on every credential
const PROVIDER: &str = "SOAX";

/// SOAX gateway endpoint
const PROXY_HOST: &str = "proxy.soax.com";
const PROXY_PORT: u16 = 5000;

/// Length of the random session id embedded in the username
const SESSION_ID_LEN: usize = 16;

/// Default session lifetime in seconds
pub const DEFAULT_SESSION_LENGTH_SECS: u64 = 3600;

/// Generate a random alphanumeric session id. `Alphanumeric` samples
/// uniformly over the 62-character alphabet, so ids are unbiased;
/// collisions within a batch are possible in principle and accepted.
fn generate_session_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}

/// Lower-case a targeting field and replace spaces with the
/// provider's '+' placeholder.
fn normalize_field(field: &str) -> String {
    field.to_lowercase().replace(' ', "+")
}

/// Geographic targeting embedded in a credential's username
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Targeting {
    /// ISO country code, lower-cased into the username
    pub country: String,
    pub region: Option<String>,
    pub city: Option<String>,
    pub session_length_secs: u64,
}

impl Default for Targeting {
    fn default() -> Self {
        Self {
            country: "us".to_string(),
            region: None,
            city: None,
            session_length_secs: DEFAULT_SESSION_LENGTH_SECS,
        }
    }
}

impl Targeting {
    /// Targeting aimed at a geocoded address: region and city from the
    /// geocoder, empty components omitted from the username.
    pub fn for_location(location: &TargetLocation) -> Self {
        Self {
            region: Some(location.region.clone()).filter(|r| !r.is_empty()),
            city: Some(location.city.clone()).filter(|c| !c.is_empty()),
            ..Self::default()
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }
}

/// Builds provider credentials from the configured SOAX package
#[derive(Debug, Clone)]
pub struct CredentialBuilder {
    package_id: String,
    password: String,
}

impl CredentialBuilder {
    pub fn new(package_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            package_id: package_id.into(),
            password: password.into(),
        }
    }

    /// Synthesize one credential with a fresh session id
    pub fn build(&self, targeting: &Targeting) -> ProxyCredential {
        let session_id = generate_session_id();

        let mut parts = vec![
            format!("package-{}", self.package_id),
            format!("country-{}", targeting.country.to_lowercase()),
        ];
        if let Some(region) = &targeting.region {
            parts.push(format!("region-{}", normalize_field(region)));
        }
        if let Some(city) = &targeting.city {
            parts.push(format!("city-{}", normalize_field(city)));
        }
        parts.push(format!("sessionid-{}", session_id));
        parts.push(format!("sessionlength-{}", targeting.session_length_secs));

        let username = parts.join("-");
        let full_string = format!(
            "{}:{}@{}:{}",
            username, self.password, PROXY_HOST, PROXY_PORT
        );

        ProxyCredential {
            provider: PROVIDER.to_string(),
            username,
            password: self.password.clone(),
            server: PROXY_HOST.to_string(),
            port: PROXY_PORT,
            full_string,
            session_id,
        }
    }

    /// Synthesize the full candidate batch up front, one fresh session
    /// id per credential.
    pub fn batch(&self, count: usize, targeting: &Targeting) -> Vec<ProxyCredential> {
        (0..count).map(|_| self.build(targeting)).collect()
    }
}
