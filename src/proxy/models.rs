//! Proxy data models

use serde::{Deserialize, Serialize};
use std::fmt;

/// One synthesized proxy credential, tried at most once. The username
/// encodes targeting and session parameters in the provider's
/// '-'-joined field format; the session id is fresh per credential and
/// never reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyCredential {
    /// Provider tag, e.g. "SOAX"
    pub provider: String,
    pub username: String,
    pub password: String,
    pub server: String,
    pub port: u16,
    /// `username:password@server:port`, the provider's wire format
    pub full_string: String,
    pub session_id: String,
}

impl fmt::Display for ProxyCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_string)
    }
}

/// Location and network metadata reported for a proxy's exit IP,
/// with the distance to the target already computed. Missing upstream
/// fields are defaulted at the decode boundary, never None here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitReport {
    pub ip: String,
    pub city: String,
    pub region: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub distance_miles: f64,
    pub isp: String,
    pub org: String,
    pub as_name: String,
    pub mobile: bool,
}

/// Outcome of probing one credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProbeVerdict {
    /// Upstream call failed; nothing usable was learned
    Error { message: String },
    /// Connected but failed the acceptance policy. Exactly one reason
    /// is recorded: checks short-circuit at the first failure.
    Rejected {
        report: ExitReport,
        fail_reasons: Vec<String>,
    },
    /// Connected and cleared every policy check
    Accepted { report: ExitReport },
}

impl ProbeVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ProbeVerdict::Accepted { .. })
    }

    /// Exit report, when the probe got far enough to produce one
    pub fn report(&self) -> Option<&ExitReport> {
        match self {
            ProbeVerdict::Error { .. } => None,
            ProbeVerdict::Rejected { report, .. } => Some(report),
            ProbeVerdict::Accepted { report } => Some(report),
        }
    }
}

/// Diagnostic snapshot of the last verdict observed before the batch
/// was exhausted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerdictSnapshot {
    pub ip: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub distance: Option<f64>,
}

impl From<&ProbeVerdict> for VerdictSnapshot {
    fn from(verdict: &ProbeVerdict) -> Self {
        match verdict.report() {
            Some(report) => Self {
                ip: Some(report.ip.clone()),
                city: Some(report.city.clone()),
                region: Some(report.region.clone()),
                distance: Some(report.distance_miles),
            },
            None => Self::default(),
        }
    }
}

/// Result of running the selection loop over a candidate batch
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    /// First credential observed to pass the policy, with the report
    /// that passed it and the number of probes completed by then
    Accepted {
        credential: ProxyCredential,
        report: ExitReport,
        attempts_used: usize,
    },
    /// Every wave ran without an accept
    Exhausted {
        /// Probes that actually reported back
        attempts: usize,
        /// Fail reasons from the last observed verdict
        last_fail_reasons: Vec<String>,
        /// Snapshot of the last observed verdict, if any probe reported
        last: Option<VerdictSnapshot>,
    },
}

impl SelectionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SelectionOutcome::Accepted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> ExitReport {
        ExitReport {
            ip: "203.0.113.7".to_string(),
            city: "Miami".to_string(),
            region: "Florida".to_string(),
            country: "United States".to_string(),
            lat: 25.77,
            lon: -80.19,
            distance_miles: 2.4,
            isp: "Comcast Cable".to_string(),
            org: "Comcast".to_string(),
            as_name: "AS7922 Comcast".to_string(),
            mobile: false,
        }
    }

    #[test]
    fn test_verdict_report_access() {
        let error = ProbeVerdict::Error {
            message: "Connection timeout".to_string(),
        };
        assert!(error.report().is_none());
        assert!(!error.is_accepted());

        let accepted = ProbeVerdict::Accepted {
            report: sample_report(),
        };
        assert!(accepted.is_accepted());
        assert_eq!(accepted.report().unwrap().city, "Miami");
    }

    #[test]
    fn test_snapshot_from_rejected() {
        let verdict = ProbeVerdict::Rejected {
            report: sample_report(),
            fail_reasons: vec!["Mobile ISP: Verizon Wireless".to_string()],
        };
        let snapshot = VerdictSnapshot::from(&verdict);
        assert_eq!(snapshot.ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(snapshot.city.as_deref(), Some("Miami"));
        assert_eq!(snapshot.distance, Some(2.4));
    }

    #[test]
    fn test_snapshot_from_error_is_empty() {
        let verdict = ProbeVerdict::Error {
            message: "ip-api failed".to_string(),
        };
        let snapshot = VerdictSnapshot::from(&verdict);
        assert_eq!(snapshot, VerdictSnapshot::default());
    }
}
