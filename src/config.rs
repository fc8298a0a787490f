//! Environment-variable configuration

use anyhow::bail;
use crate::Result;

/// Environment variable holding the ip-api.com API key
const ENV_IPAPI_KEY: &str = "IPAPI_KEY";

/// Environment variable holding the SOAX package id
const ENV_SOAX_PACKAGE_ID: &str = "SOAX_PACKAGE_ID";

/// Environment variable holding the SOAX package password
const ENV_SOAX_PASSWORD: &str = "SOAX_PASSWORD";

/// Process-wide configuration, loaded once at startup and read-only
/// afterwards. Missing variables load as empty strings so the server
/// can still start and report its readiness via the config-status
/// endpoint.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// ip-api.com API key (location and ISP lookup)
    pub ipapi_key: String,
    /// SOAX package id (proxy provider account)
    pub soax_package_id: String,
    /// SOAX package password
    pub soax_password: String,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            ipapi_key: std::env::var(ENV_IPAPI_KEY).unwrap_or_default(),
            soax_package_id: std::env::var(ENV_SOAX_PACKAGE_ID).unwrap_or_default(),
            soax_password: std::env::var(ENV_SOAX_PASSWORD).unwrap_or_default(),
        }
    }

    pub fn has_ipapi(&self) -> bool {
        !self.ipapi_key.is_empty()
    }

    pub fn has_soax(&self) -> bool {
        !self.soax_package_id.is_empty() && !self.soax_password.is_empty()
    }

    /// True when every upstream credential needed for a search is present
    pub fn ready(&self) -> bool {
        self.has_ipapi() && self.has_soax()
    }

    /// Fail fast before any network call if a required credential is
    /// missing, naming the variable the operator has to set.
    pub fn ensure_ready(&self) -> Result<()> {
        if !self.has_ipapi() {
            bail!("ip-api.com API key not configured (set {})", ENV_IPAPI_KEY);
        }
        if !self.has_soax() {
            bail!(
                "SOAX credentials not configured (set {} and {})",
                ENV_SOAX_PACKAGE_ID,
                ENV_SOAX_PASSWORD
            );
        }
        Ok(())
    }
}
