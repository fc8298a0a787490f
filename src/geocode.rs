//! Forward geocoding via the Mapbox places API

use crate::Result;
use anyhow::anyhow;
use once_cell::sync::Lazy;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Timeout for geocoding requests in seconds
const GEOCODE_TIMEOUT_SECS: u64 = 10;

/// Feature types requested from Mapbox, most specific first
const GEOCODE_TYPES: &str = "address,place,locality,neighborhood,postcode";

static GEOCODE_BASE: Lazy<Url> = Lazy::new(|| {
    Url::parse("https://api.mapbox.com/geocoding/v5/mapbox.places/")
        .expect("Invalid geocoding base URL")
});

/// Geocoded target of a search: coordinates plus the place components
/// used to aim the proxy credentials. Produced once per request and
/// shared read-only by every probe in the batch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TargetLocation {
    pub lat: f64,
    pub lon: f64,
    pub place_name: String,
    pub city: String,
    pub region: String,
    pub country: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    /// [longitude, latitude]
    center: [f64; 2],
    #[serde(default)]
    text: String,
    #[serde(default)]
    place_name: String,
    #[serde(default)]
    context: Vec<ContextEntry>,
}

#[derive(Debug, Deserialize)]
struct ContextEntry {
    id: String,
    text: String,
}

impl Feature {
    /// Context entries are keyed by ids like "region.1234" - match on
    /// the prefix before the dot.
    fn context_text(&self, kind: &str) -> Option<&str> {
        self.context
            .iter()
            .find(|entry| entry.id.split('.').next() == Some(kind))
            .map(|entry| entry.text.as_str())
    }
}

fn location_from_response(response: GeocodeResponse) -> Option<TargetLocation> {
    let feature = response.features.into_iter().next()?;

    let city = if feature.text.is_empty() {
        feature.context_text("place").unwrap_or_default().to_string()
    } else {
        feature.text.clone()
    };
    let region = feature.context_text("region").unwrap_or_default().to_string();
    let country = feature
        .context_text("country")
        .unwrap_or("United States")
        .to_string();

    Some(TargetLocation {
        lat: feature.center[1],
        lon: feature.center[0],
        place_name: feature.place_name,
        city,
        region,
        country,
    })
}

/// Client for resolving a free-text address into a [`TargetLocation`]
pub struct Geocoder {
    client: Client,
}

impl Geocoder {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(GEOCODE_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }

    /// Resolve an address. Returns `Ok(None)` when the provider finds
    /// no match; transport failures surface as errors. Both abort the
    /// request before any probing starts.
    pub async fn geocode(&self, address: &str, mapbox_key: &str) -> Result<Option<TargetLocation>> {
        let mut url = GEOCODE_BASE.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Invalid geocoding base URL"))?
            .push(&format!("{}.json", address));
        url.query_pairs_mut()
            .append_pair("access_token", mapbox_key)
            .append_pair("limit", "1")
            .append_pair("types", GEOCODE_TYPES);

        let response: GeocodeResponse = self.client.get(url).send().await?.json().await?;
        let location = location_from_response(response);

        match &location {
            Some(loc) => debug!(
                lat = loc.lat,
                lon = loc.lon,
                city = %loc.city,
                "geocoded address"
            ),
            None => debug!(address, "geocoder returned no features"),
        }

        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIAMI_PAYLOAD: &str = r#"{
        "features": [{
            "text": "Ocean Drive",
            "place_name": "Ocean Drive, Miami Beach, Florida 33139, United States",
            "center": [-80.13, 25.7907],
            "context": [
                {"id": "neighborhood.301", "text": "South Beach"},
                {"id": "place.412", "text": "Miami Beach"},
                {"id": "region.507", "text": "Florida"},
                {"id": "country.609", "text": "United States"}
            ]
        }]
    }"#;

    #[test]
    fn test_location_from_payload() {
        let response: GeocodeResponse = serde_json::from_str(MIAMI_PAYLOAD).unwrap();
        let location = location_from_response(response).unwrap();

        assert_eq!(location.lat, 25.7907);
        assert_eq!(location.lon, -80.13);
        assert_eq!(location.city, "Ocean Drive");
        assert_eq!(location.region, "Florida");
        assert_eq!(location.country, "United States");
        assert!(location.place_name.contains("Miami Beach"));
    }

    #[test]
    fn test_city_falls_back_to_place_context() {
        let payload = r#"{
            "features": [{
                "text": "",
                "place_name": "33139, Miami Beach, Florida, United States",
                "center": [-80.13, 25.79],
                "context": [
                    {"id": "place.412", "text": "Miami Beach"},
                    {"id": "region.507", "text": "Florida"}
                ]
            }]
        }"#;
        let response: GeocodeResponse = serde_json::from_str(payload).unwrap();
        let location = location_from_response(response).unwrap();

        assert_eq!(location.city, "Miami Beach");
    }

    #[test]
    fn test_country_defaults_when_missing() {
        let payload = r#"{
            "features": [{
                "text": "Somewhere",
                "center": [-80.0, 25.0],
                "context": []
            }]
        }"#;
        let response: GeocodeResponse = serde_json::from_str(payload).unwrap();
        let location = location_from_response(response).unwrap();

        assert_eq!(location.country, "United States");
        assert_eq!(location.region, "");
    }

    #[test]
    fn test_no_features_is_none() {
        let response: GeocodeResponse = serde_json::from_str(r#"{"features": []}"#).unwrap();
        assert!(location_from_response(response).is_none());
    }

    #[test]
    fn test_missing_features_key_is_none() {
        let response: GeocodeResponse = serde_json::from_str("{}").unwrap();
        assert!(location_from_response(response).is_none());
    }
}
