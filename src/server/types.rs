//! Front-end request and response types

use crate::proxy::models::VerdictSnapshot;
use crate::proxy::{DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DISTANCE_MILES};
use serde::{Deserialize, Serialize};

fn default_max_distance() -> f64 {
    DEFAULT_MAX_DISTANCE_MILES
}

fn default_max_attempts() -> usize {
    DEFAULT_MAX_ATTEMPTS
}

/// Body of `POST /generate`
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub target_address: String,
    #[serde(default)]
    pub mapbox_key: String,
    #[serde(default = "default_max_distance")]
    pub max_distance: f64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}

/// Response of `POST /generate`
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum GenerateResponse {
    Success(Box<GenerateSuccess>),
    Failure(GenerateFailure),
}

/// Accepted credential plus the verdict fields the operator needs
#[derive(Debug, Serialize)]
pub struct GenerateSuccess {
    pub success: bool,
    pub full_string: String,
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub session_id: String,
    pub ip: String,
    pub city: String,
    pub region: String,
    pub country: String,
    pub distance: f64,
    pub isp: String,
    pub attempts_used: usize,
    pub target_address: String,
}

/// Error message plus whatever diagnostics the batch produced
#[derive(Debug, Serialize)]
pub struct GenerateFailure {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fail_reasons: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_result: Option<VerdictSnapshot>,
}

impl GenerateFailure {
    /// Failure before any probing happened (config or geocode stage)
    pub fn message(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            attempts: None,
            last_fail_reasons: None,
            last_result: None,
        }
    }
}

/// Response of `GET /config-status`
#[derive(Debug, Serialize)]
pub struct ConfigStatus {
    pub app_version: String,
    pub has_ipapi: bool,
    pub has_soax: bool,
    pub ready: bool,
}

/// Response of `GET /test-proxy`
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum TestProxyResponse {
    Success {
        success: bool,
        ip: String,
        proxy_used: String,
    },
    Failure {
        success: bool,
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        proxy_tried: Option<String>,
    },
}
