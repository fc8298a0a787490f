//! Front-end request handlers

use super::types::*;
use crate::config::AppConfig;
use crate::geocode::Geocoder;
use crate::proxy::{
    AcceptancePolicy, CredentialBuilder, ProxyCredential, ProxyProbe, ProxySelector,
    SelectionOutcome, Targeting,
};
use crate::APP_VERSION;
use axum::{extract::State, response::Html, Json};
use reqwest::{Client, Proxy as ReqwestProxy};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Timeout for the quick connectivity check in seconds
const TEST_PROXY_TIMEOUT_SECS: u64 = 10;

static INDEX_HTML: &str = include_str!("index.html");

/// Shared application state for handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
}

/// Serve the operator page
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Report which upstream credentials are configured
pub async fn config_status(State(state): State<AppState>) -> Json<ConfigStatus> {
    Json(ConfigStatus {
        app_version: APP_VERSION.to_string(),
        has_ipapi: state.config.has_ipapi(),
        has_soax: state.config.has_soax(),
        ready: state.config.ready(),
    })
}

/// Geocode the target address and run the selection loop
pub async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Json<GenerateResponse> {
    match run_search(&state.config, &request).await {
        Ok(response) => Json(response),
        Err(message) => Json(GenerateResponse::Failure(GenerateFailure::message(message))),
    }
}

/// The search pipeline: config check, geocode, batch, select. Fatal
/// stages come back as `Err(message)` for a bare error response;
/// exhaustion is a structured failure with diagnostics.
async fn run_search(
    config: &AppConfig,
    request: &GenerateRequest,
) -> std::result::Result<GenerateResponse, String> {
    config.ensure_ready().map_err(|e| e.to_string())?;

    if request.mapbox_key.is_empty() {
        return Err("Mapbox API key required".to_string());
    }
    if request.target_address.is_empty() {
        return Err("Target address required".to_string());
    }

    let geocoder = Geocoder::new().map_err(|e| e.to_string())?;
    let location = geocoder
        .geocode(&request.target_address, &request.mapbox_key)
        .await
        .ok()
        .flatten()
        .ok_or_else(|| {
            "Could not geocode address. Please check the address format.".to_string()
        })?;

    info!(
        address = %request.target_address,
        city = %location.city,
        region = %location.region,
        "starting proxy search"
    );

    let builder = CredentialBuilder::new(&config.soax_package_id, &config.soax_password);
    let credentials = builder.batch(request.max_attempts, &Targeting::for_location(&location));

    let prober = ProxyProbe::new(
        &config.ipapi_key,
        AcceptancePolicy::new(request.max_distance),
    )
    .map_err(|e| e.to_string())?;
    let selector = ProxySelector::new(prober);

    match selector.select(&location, credentials).await {
        SelectionOutcome::Accepted {
            credential,
            report,
            attempts_used,
        } => Ok(GenerateResponse::Success(Box::new(GenerateSuccess {
            success: true,
            full_string: credential.full_string,
            server: credential.server,
            port: credential.port,
            username: credential.username,
            password: credential.password,
            session_id: credential.session_id,
            ip: report.ip,
            city: report.city,
            region: report.region,
            country: report.country,
            distance: report.distance_miles,
            isp: report.isp,
            attempts_used,
            target_address: request.target_address.clone(),
        }))),
        SelectionOutcome::Exhausted {
            attempts,
            last_fail_reasons,
            last,
        } => {
            warn!(attempts, "no acceptable proxy found");
            Ok(GenerateResponse::Failure(GenerateFailure {
                error: format!(
                    "Could not find a proxy within {} miles after {} attempts.",
                    request.max_distance, attempts
                ),
                attempts: Some(attempts),
                last_fail_reasons: Some(last_fail_reasons),
                last_result: last,
            }))
        }
    }
}

/// Quick connectivity check: one untargeted credential, one ipify call
pub async fn test_proxy(State(state): State<AppState>) -> Json<TestProxyResponse> {
    if !state.config.has_soax() {
        return Json(TestProxyResponse::Failure {
            success: false,
            error: "SOAX not configured".to_string(),
            proxy_tried: None,
        });
    }

    let builder = CredentialBuilder::new(
        &state.config.soax_package_id,
        &state.config.soax_password,
    );
    let credential = builder.build(&Targeting::default());

    match fetch_ip_through(&credential).await {
        Ok(ip) => Json(TestProxyResponse::Success {
            success: true,
            ip,
            proxy_used: credential.full_string,
        }),
        Err(error) => Json(TestProxyResponse::Failure {
            success: false,
            error,
            proxy_tried: Some(credential.full_string),
        }),
    }
}

/// Fetch the externally visible IP through a credential. Shared with
/// the CLI's connectivity check.
pub async fn fetch_ip_through(credential: &ProxyCredential) -> std::result::Result<String, String> {
    let proxy_url = format!(
        "http://{}:{}@{}:{}",
        credential.username, credential.password, credential.server, credential.port
    );
    let client = Client::builder()
        .proxy(ReqwestProxy::all(&proxy_url).map_err(|e| e.to_string())?)
        .timeout(Duration::from_secs(TEST_PROXY_TIMEOUT_SECS))
        .build()
        .map_err(|e| e.to_string())?;

    let body: Value = client
        .get("https://api.ipify.org?format=json")
        .send()
        .await
        .map_err(|e| e.to_string())?
        .json()
        .await
        .map_err(|e| e.to_string())?;

    body.get("ip")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| "No IP in response".to_string())
}
