//! Acceptance policy: distance threshold plus ISP classification
//!
//! Checks run in a fixed order and short-circuit at the first failure,
//! so a rejection carries exactly one reason. Classification is never
//! evaluated for a probe that already failed on distance.

use crate::proxy::models::ExitReport;

/// Default acceptance radius in miles
pub const DEFAULT_MAX_DISTANCE_MILES: f64 = 5.0;

/// Substrings marking a mobile or cellular network
const MOBILE_KEYWORDS: &[&str] = &["mobile", "wireless", "cellular", "lte", "5g", "4g", "3g"];

/// Known mobile carrier names. "att " keeps its trailing space so
/// plain "att" inside unrelated words does not match.
const MOBILE_CARRIERS: &[&str] = &[
    "at&t",
    "att ",
    "verizon",
    "t-mobile",
    "tmobile",
    "sprint",
    "cricket",
    "boost",
    "metro pcs",
    "metropcs",
    "us cellular",
    "uscellular",
];

/// ISPs rejected outright
const FLAGGED_ISPS: &[&str] = &["rcn", "starlink"];

/// Ordered accept/reject rules applied to a probe's exit report
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptancePolicy {
    pub max_distance_miles: f64,
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        Self {
            max_distance_miles: DEFAULT_MAX_DISTANCE_MILES,
        }
    }
}

impl AcceptancePolicy {
    pub fn new(max_distance_miles: f64) -> Self {
        Self { max_distance_miles }
    }

    /// Apply the checks in order, returning the first failing reason,
    /// or `None` when the report clears all of them.
    pub fn first_failure(&self, report: &ExitReport) -> Option<String> {
        if report.distance_miles > self.max_distance_miles {
            return Some(format!(
                "Distance {:.1} miles > {} max",
                report.distance_miles, self.max_distance_miles
            ));
        }

        let isp = report.isp.to_lowercase();
        let as_name = report.as_name.to_lowercase();
        let name_matches =
            |set: &[&str]| set.iter().any(|kw| isp.contains(kw) || as_name.contains(kw));

        if report.mobile || name_matches(MOBILE_KEYWORDS) || name_matches(MOBILE_CARRIERS) {
            return Some(format!("Mobile ISP: {}", report.isp));
        }

        if name_matches(FLAGGED_ISPS) {
            return Some(format!("Flagged ISP: {}", report.isp));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(distance: f64, isp: &str, as_name: &str, mobile: bool) -> ExitReport {
        ExitReport {
            ip: "203.0.113.7".to_string(),
            city: "Miami".to_string(),
            region: "Florida".to_string(),
            country: "United States".to_string(),
            lat: 25.77,
            lon: -80.19,
            distance_miles: distance,
            isp: isp.to_string(),
            org: isp.to_string(),
            as_name: as_name.to_string(),
            mobile,
        }
    }

    #[test]
    fn test_distance_rejection_names_both_distances() {
        let policy = AcceptancePolicy::new(5.0);
        let reason = policy
            .first_failure(&report(6.0, "Comcast Cable", "AS7922", false))
            .unwrap();
        assert!(reason.contains("6.0"), "got {reason}");
        assert!(reason.contains("5"), "got {reason}");
    }

    #[test]
    fn test_distance_check_runs_first() {
        // A mobile ISP out of range is reported as a distance failure,
        // classification is not reached.
        let policy = AcceptancePolicy::new(5.0);
        let reason = policy
            .first_failure(&report(20.0, "Verizon Wireless", "AS701", true))
            .unwrap();
        assert!(reason.starts_with("Distance"));
    }

    #[test]
    fn test_mobile_isp_rejected_in_range() {
        let policy = AcceptancePolicy::default();
        let reason = policy
            .first_failure(&report(1.0, "Verizon Wireless", "AS701", false))
            .unwrap();
        assert_eq!(reason, "Mobile ISP: Verizon Wireless");
    }

    #[test]
    fn test_mobile_flag_alone_rejects() {
        let policy = AcceptancePolicy::default();
        let reason = policy
            .first_failure(&report(1.0, "Some Broadband", "AS1234", true))
            .unwrap();
        assert_eq!(reason, "Mobile ISP: Some Broadband");
    }

    #[test]
    fn test_carrier_match_in_as_name() {
        let policy = AcceptancePolicy::default();
        let reason = policy
            .first_failure(&report(1.0, "Generic Telecom", "AS21928 T-Mobile USA", false))
            .unwrap();
        assert!(reason.starts_with("Mobile ISP"));
    }

    #[test]
    fn test_flagged_isp_rejected() {
        let policy = AcceptancePolicy::default();
        for isp in ["RCN Corporation", "Starlink Services LLC"] {
            let reason = policy.first_failure(&report(1.0, isp, "AS0", false)).unwrap();
            assert_eq!(reason, format!("Flagged ISP: {isp}"));
        }
    }

    #[test]
    fn test_clean_residential_isp_accepted() {
        let policy = AcceptancePolicy::default();
        assert!(policy
            .first_failure(&report(1.0, "Comcast", "AS7922 Comcast", false))
            .is_none());
    }

    #[test]
    fn test_boundary_distance_accepted() {
        // Exactly at the maximum is inside the radius
        let policy = AcceptancePolicy::new(5.0);
        assert!(policy
            .first_failure(&report(5.0, "Comcast", "AS7922", false))
            .is_none());
    }
}
