//! Proxy probe: connect through a candidate credential, discover its
//! exit IP, and classify the network path against the target.
//!
//! A probe makes two to three outbound calls: exit-IP discovery
//! through the proxy (one fallback service), then a direct ip-api.com
//! lookup of the discovered address. Failures are absorbed into the
//! returned verdict, never bubbled as errors.

use crate::geocode::TargetLocation;
use crate::proxy::distance::haversine_miles;
use crate::proxy::models::{ExitReport, ProbeVerdict, ProxyCredential};
use crate::proxy::policy::AcceptancePolicy;
use crate::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Proxy as ReqwestProxy};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Timeout for each upstream call made by a probe, in seconds
const PROBE_TIMEOUT_SECS: u64 = 3;

/// ip-api.com endpoint for paid keys
const IPAPI_ENDPOINT: &str = "https://pro.ip-api.com/json";

/// Fields requested from ip-api.com
const IPAPI_FIELDS: &str = "status,message,country,regionName,city,lat,lon,isp,org,as,mobile";

/// Sentinel for string fields the provider left null or missing
const UNKNOWN: &str = "Unknown";

static CONNECTION_STRING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+):(.+)@(.+):(\d+)$").expect("Invalid connection string regex")
});

/// Parsed `user:pass@host:port` connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParts {
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
}

/// Parse a provider connection string. The synthesizer only emits
/// well-formed strings, so a mismatch here is a defensive failure.
pub fn parse_connection_string(raw: &str) -> Option<ConnectionParts> {
    let caps = CONNECTION_STRING_REGEX.captures(raw)?;
    Some(ConnectionParts {
        username: caps[1].to_string(),
        password: caps[2].to_string(),
        host: caps[3].to_string(),
        port: caps[4].parse().ok()?,
    })
}

/// "What is my IP" services, tried in order with the same timeout.
/// Exactly one fallback; a probe whose calls all fail is an Error.
#[derive(Debug, Clone, Copy)]
enum IpEchoService {
    Ipify,
    HttpBin,
}

const IP_ECHO_SERVICES: &[IpEchoService] = &[IpEchoService::Ipify, IpEchoService::HttpBin];

impl IpEchoService {
    fn url(&self) -> &'static str {
        match self {
            IpEchoService::Ipify => "https://api.ipify.org?format=json",
            IpEchoService::HttpBin => "https://httpbin.org/ip",
        }
    }

    /// Pull the IP out of the service's JSON body. httpbin may report
    /// a comma-separated chain; the first hop is the exit.
    fn extract_ip(&self, body: &Value) -> Option<String> {
        match self {
            IpEchoService::Ipify => body.get("ip")?.as_str().map(str::to_string),
            IpEchoService::HttpBin => body
                .get("origin")?
                .as_str()?
                .split(',')
                .next()
                .map(|ip| ip.trim().to_string()),
        }
    }
}

/// ip-api.com response. Every field is optional at the boundary;
/// defaults are applied when the report is assembled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IpIntelPayload {
    pub status: Option<String>,
    pub message: Option<String>,
    pub country: Option<String>,
    #[serde(rename = "regionName")]
    pub region_name: Option<String>,
    pub city: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub isp: Option<String>,
    pub org: Option<String>,
    #[serde(rename = "as")]
    pub as_name: Option<String>,
    pub mobile: Option<bool>,
}

/// Probes one credential against a target location
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, credential: &ProxyCredential, target: &TargetLocation) -> ProbeVerdict;
}

/// Production prober backed by reqwest
pub struct ProxyProbe {
    ipapi_key: String,
    policy: AcceptancePolicy,
    timeout: Duration,
    /// Direct (unproxied) client for ip-api lookups
    intel_client: Client,
}

impl ProxyProbe {
    pub fn new(ipapi_key: impl Into<String>, policy: AcceptancePolicy) -> Result<Self> {
        let timeout = Duration::from_secs(PROBE_TIMEOUT_SECS);
        let intel_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            ipapi_key: ipapi_key.into(),
            policy,
            timeout,
            intel_client,
        })
    }

    /// Client routing everything through the candidate proxy
    fn proxied_client(&self, parts: &ConnectionParts) -> Result<Client> {
        let proxy_url = format!(
            "http://{}:{}@{}:{}",
            parts.username, parts.password, parts.host, parts.port
        );
        let client = Client::builder()
            .proxy(ReqwestProxy::all(&proxy_url)?)
            .timeout(self.timeout)
            .build()?;
        Ok(client)
    }

    /// Discover the externally visible IP by calling the echo services
    /// in order through the proxy. `None` when every service failed.
    async fn discover_exit_ip(&self, client: &Client) -> Option<String> {
        for service in IP_ECHO_SERVICES {
            let body: Value = match client.get(service.url()).send().await {
                Ok(response) => match response.json().await {
                    Ok(body) => body,
                    Err(e) => {
                        debug!(service = service.url(), error = %e, "ip echo decode failed");
                        continue;
                    }
                },
                Err(e) => {
                    debug!(service = service.url(), error = %e, "ip echo call failed");
                    continue;
                }
            };
            if let Some(ip) = service.extract_ip(&body) {
                return Some(ip);
            }
        }
        None
    }

    /// Look up location and network metadata for an IP. Transport and
    /// decode failures come back as the error message for the verdict.
    async fn lookup_intel(&self, ip: &str) -> std::result::Result<IpIntelPayload, String> {
        let url = format!("{}/{}", IPAPI_ENDPOINT, ip);
        let response = self
            .intel_client
            .get(url)
            .query(&[("key", self.ipapi_key.as_str()), ("fields", IPAPI_FIELDS)])
            .send()
            .await
            .map_err(|e| format!("ip-api failed: {e}"))?;
        response
            .json()
            .await
            .map_err(|e| format!("ip-api failed: {e}"))
    }

    /// Reduce an intel payload into a verdict: default missing fields,
    /// compute the distance, apply the acceptance policy.
    fn assess(&self, ip: String, intel: IpIntelPayload, target: &TargetLocation) -> ProbeVerdict {
        if intel.status.as_deref() == Some("fail") {
            return ProbeVerdict::Error {
                message: format!(
                    "ip-api error: {}",
                    intel.message.as_deref().unwrap_or(UNKNOWN)
                ),
            };
        }

        let lat = intel.lat.unwrap_or(0.0);
        let lon = intel.lon.unwrap_or(0.0);
        let unknown_if_missing = |field: Option<String>| {
            field.filter(|value| !value.is_empty()).unwrap_or_else(|| UNKNOWN.to_string())
        };

        let report = ExitReport {
            ip,
            city: unknown_if_missing(intel.city),
            region: unknown_if_missing(intel.region_name),
            country: unknown_if_missing(intel.country),
            lat,
            lon,
            distance_miles: haversine_miles(target.lat, target.lon, lat, lon),
            isp: unknown_if_missing(intel.isp),
            org: unknown_if_missing(intel.org),
            as_name: unknown_if_missing(intel.as_name),
            mobile: intel.mobile.unwrap_or(false),
        };

        match self.policy.first_failure(&report) {
            Some(reason) => ProbeVerdict::Rejected {
                report,
                fail_reasons: vec![reason],
            },
            None => ProbeVerdict::Accepted { report },
        }
    }
}

#[async_trait]
impl Prober for ProxyProbe {
    async fn probe(&self, credential: &ProxyCredential, target: &TargetLocation) -> ProbeVerdict {
        let Some(parts) = parse_connection_string(&credential.full_string) else {
            return ProbeVerdict::Error {
                message: "Invalid proxy format".to_string(),
            };
        };

        let client = match self.proxied_client(&parts) {
            Ok(client) => client,
            Err(e) => {
                return ProbeVerdict::Error {
                    message: format!("Proxy client error: {e}"),
                }
            }
        };

        let Some(ip) = self.discover_exit_ip(&client).await else {
            return ProbeVerdict::Error {
                message: "Connection timeout".to_string(),
            };
        };
        debug!(session = %credential.session_id, %ip, "discovered exit IP");

        match self.lookup_intel(&ip).await {
            Ok(intel) => self.assess(ip, intel, target),
            Err(message) => ProbeVerdict::Error { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn probe() -> ProxyProbe {
        ProxyProbe::new("test-key", AcceptancePolicy::default()).unwrap()
    }

    fn miami_target() -> TargetLocation {
        TargetLocation {
            lat: 25.77,
            lon: -80.19,
            city: "Miami".to_string(),
            region: "Florida".to_string(),
            country: "United States".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_connection_string() {
        let parts =
            parse_connection_string("package-p1-country-us-sessionid-abc:secret@proxy.soax.com:5000")
                .unwrap();
        assert_eq!(parts.username, "package-p1-country-us-sessionid-abc");
        assert_eq!(parts.password, "secret");
        assert_eq!(parts.host, "proxy.soax.com");
        assert_eq!(parts.port, 5000);
    }

    #[test]
    fn test_parse_rejects_malformed_strings() {
        assert!(parse_connection_string("no-at-sign-here:5000").is_none());
        assert!(parse_connection_string("user:pass@host:notaport").is_none());
        assert!(parse_connection_string("").is_none());
    }

    #[test]
    fn test_ipify_extraction() {
        let body = json!({"ip": "203.0.113.7"});
        assert_eq!(
            IpEchoService::Ipify.extract_ip(&body).as_deref(),
            Some("203.0.113.7")
        );
        assert!(IpEchoService::Ipify.extract_ip(&json!({})).is_none());
    }

    #[test]
    fn test_httpbin_extraction_takes_first_hop() {
        let body = json!({"origin": "203.0.113.7, 198.51.100.1"});
        assert_eq!(
            IpEchoService::HttpBin.extract_ip(&body).as_deref(),
            Some("203.0.113.7")
        );
    }

    #[test]
    fn test_intel_payload_decodes_nulls() {
        let payload: IpIntelPayload = serde_json::from_str(
            r#"{"status": "success", "city": null, "lat": null, "isp": null}"#,
        )
        .unwrap();
        assert_eq!(payload.status.as_deref(), Some("success"));
        assert!(payload.city.is_none());
        assert!(payload.lat.is_none());
    }

    #[test]
    fn test_assess_fail_status_is_error() {
        let intel = IpIntelPayload {
            status: Some("fail".to_string()),
            message: Some("invalid key".to_string()),
            ..Default::default()
        };
        let verdict = probe().assess("203.0.113.7".to_string(), intel, &miami_target());
        assert_eq!(
            verdict,
            ProbeVerdict::Error {
                message: "ip-api error: invalid key".to_string()
            }
        );
    }

    #[test]
    fn test_assess_defaults_missing_fields() {
        let intel = IpIntelPayload {
            status: Some("success".to_string()),
            ..Default::default()
        };
        let verdict = probe().assess("203.0.113.7".to_string(), intel, &miami_target());

        // Coordinates default to 0,0 which is thousands of miles out
        let ProbeVerdict::Rejected { report, fail_reasons } = verdict else {
            panic!("expected rejection");
        };
        assert_eq!(report.city, "Unknown");
        assert_eq!(report.isp, "Unknown");
        assert_eq!(report.lat, 0.0);
        assert_eq!(fail_reasons.len(), 1);
        assert!(fail_reasons[0].starts_with("Distance"));
    }

    #[test]
    fn test_assess_accepts_nearby_residential() {
        let intel = IpIntelPayload {
            status: Some("success".to_string()),
            country: Some("United States".to_string()),
            region_name: Some("Florida".to_string()),
            city: Some("Miami".to_string()),
            lat: Some(25.78),
            lon: Some(-80.18),
            isp: Some("Comcast Cable".to_string()),
            org: Some("Comcast".to_string()),
            as_name: Some("AS7922 Comcast".to_string()),
            mobile: Some(false),
            message: None,
        };
        let verdict = probe().assess("203.0.113.7".to_string(), intel, &miami_target());

        let ProbeVerdict::Accepted { report } = verdict else {
            panic!("expected acceptance");
        };
        assert_eq!(report.city, "Miami");
        assert!(report.distance_miles < 2.0);
    }

    #[test]
    fn test_assess_rejects_mobile_with_single_reason() {
        let intel = IpIntelPayload {
            status: Some("success".to_string()),
            city: Some("Miami".to_string()),
            lat: Some(25.77),
            lon: Some(-80.19),
            isp: Some("Verizon Wireless".to_string()),
            as_name: Some("AS701".to_string()),
            mobile: Some(false),
            ..Default::default()
        };
        let verdict = probe().assess("203.0.113.7".to_string(), intel, &miami_target());

        let ProbeVerdict::Rejected { fail_reasons, .. } = verdict else {
            panic!("expected rejection");
        };
        assert_eq!(fail_reasons, vec!["Mobile ISP: Verizon Wireless".to_string()]);
    }
}
