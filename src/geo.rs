//! Visitor geolocation by IP lookup.
//!
//! The lookup is best effort: any failure is logged and reported as "no
//! location", which leaves the near-me filter and the map at their defaults.

use serde::{Deserialize, Serialize};
use std::sync::mpsc;
use std::thread;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::filter::LocationStatus;
use crate::models::Coordinates;

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub country: String,
}

impl GeoLocation {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            lat: self.latitude,
            lng: self.longitude,
        }
    }
}

/// Response shape of ipapi-style services; `country_name` is preferred
/// over the two-letter `country` code when both are present.
#[derive(Debug, Deserialize)]
struct LookupResponse {
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(default)]
    country_name: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    error: Option<bool>,
    #[serde(default)]
    reason: Option<String>,
}

/// Parse a lookup response body.
pub fn parse_lookup(body: &str) -> Result<GeoLocation> {
    let response: LookupResponse = serde_json::from_str(body)?;
    if response.error.unwrap_or(false) {
        return Err(Error::parse(format!(
            "geolocation service error: {}",
            response.reason.unwrap_or_else(|| "unknown".to_string())
        )));
    }
    let (Some(latitude), Some(longitude)) = (response.latitude, response.longitude) else {
        return Err(Error::parse("geolocation response has no coordinates"));
    };
    let country = match (response.country_name, response.country) {
        (Some(name), _) if !name.trim().is_empty() => name.trim().to_string(),
        (_, Some(code)) => country_for_code(&code)
            .ok_or_else(|| Error::parse(format!("unrecognised country code '{}'", code.trim())))?
            .to_string(),
        _ => return Err(Error::parse("geolocation response has no country")),
    };
    Ok(GeoLocation {
        latitude,
        longitude,
        country,
    })
}

/// ISO 3166-1 alpha-2 codes mapped to the country names used by the
/// directory datasets.
const COUNTRY_CODES: &[(&str, &str)] = &[
    ("AE", "United Arab Emirates"),
    ("AR", "Argentina"),
    ("AT", "Austria"),
    ("AU", "Australia"),
    ("BE", "Belgium"),
    ("BR", "Brazil"),
    ("CA", "Canada"),
    ("CH", "Switzerland"),
    ("CL", "Chile"),
    ("CN", "China"),
    ("CO", "Colombia"),
    ("CZ", "Czech Republic"),
    ("DE", "Germany"),
    ("DK", "Denmark"),
    ("EG", "Egypt"),
    ("ES", "Spain"),
    ("FI", "Finland"),
    ("FR", "France"),
    ("GB", "United Kingdom"),
    ("GH", "Ghana"),
    ("GR", "Greece"),
    ("HK", "Hong Kong"),
    ("ID", "Indonesia"),
    ("IE", "Ireland"),
    ("IL", "Israel"),
    ("IN", "India"),
    ("IT", "Italy"),
    ("JP", "Japan"),
    ("KE", "Kenya"),
    ("KR", "South Korea"),
    ("MX", "Mexico"),
    ("MY", "Malaysia"),
    ("NG", "Nigeria"),
    ("NL", "Netherlands"),
    ("NO", "Norway"),
    ("NZ", "New Zealand"),
    ("PE", "Peru"),
    ("PH", "Philippines"),
    ("PL", "Poland"),
    ("PT", "Portugal"),
    ("RO", "Romania"),
    ("SE", "Sweden"),
    ("SG", "Singapore"),
    ("TH", "Thailand"),
    ("TR", "Turkey"),
    ("TW", "Taiwan"),
    ("UA", "Ukraine"),
    ("US", "United States"),
    ("VN", "Vietnam"),
    ("ZA", "South Africa"),
];

/// Country name for a two-letter code. Longer values are taken to be
/// names already.
pub fn country_for_code(code: &str) -> Option<&str> {
    let code = code.trim();
    if code.chars().count() != 2 {
        return (!code.is_empty()).then_some(code);
    }
    COUNTRY_CODES
        .iter()
        .find(|(iso, _)| iso.eq_ignore_ascii_case(code))
        .map(|(_, name)| *name)
}

pub struct GeoLocator {
    client: reqwest::blocking::Client,
    url: String,
}

impl GeoLocator {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            url: config.geolocation_url.clone(),
        })
    }

    /// Look up the visitor's location; `None` on any failure.
    pub fn locate(&self) -> Option<GeoLocation> {
        match self.try_locate() {
            Ok(location) => {
                tracing::info!(country = %location.country, "resolved visitor location");
                Some(location)
            }
            Err(e) => {
                tracing::warn!(error = %e, url = %self.url, "geolocation lookup failed");
                None
            }
        }
    }

    fn try_locate(&self) -> Result<GeoLocation> {
        let response = self.client.get(&self.url).send()?.error_for_status()?;
        let body = response.text()?;
        parse_lookup(&body)
    }

    /// Run the lookup on a background thread; the receiver yields exactly
    /// one `Resolved` or `Failed` status.
    pub fn spawn(self) -> mpsc::Receiver<LocationStatus> {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let status = match self.locate() {
                Some(location) => LocationStatus::Resolved(location),
                None => LocationStatus::Failed,
            };
            // The receiver may already be gone if the UI exited first.
            let _ = tx.send(status);
        });
        rx
    }
}

/// Great-circle distance in kilometres.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefers_country_name() {
        let body = r#"{"ip":"1.2.3.4","latitude":40.7,"longitude":-74.0,"country":"US","country_name":"United States"}"#;
        let location = parse_lookup(body).unwrap();
        assert_eq!(location.country, "United States");
        assert_eq!(location.coordinates().lat, 40.7);
    }

    #[test]
    fn test_parse_maps_country_code_to_name() {
        let body = r#"{"latitude":52.52,"longitude":13.40,"country":"DE"}"#;
        assert_eq!(parse_lookup(body).unwrap().country, "Germany");

        let body = r#"{"latitude":37.5,"longitude":127.0,"country":"kr","country_name":""}"#;
        assert_eq!(parse_lookup(body).unwrap().country, "South Korea");
    }

    #[test]
    fn test_parse_unknown_code_fails() {
        let body = r#"{"latitude":0.0,"longitude":0.0,"country":"ZZ"}"#;
        assert!(parse_lookup(body).is_err());
    }

    #[test]
    fn test_country_code_resolves_near_me() {
        use crate::filter::{CommunityFilter, FocusSelection, apply};
        use crate::store::EntityStore;

        let store = EntityStore::bundled().unwrap();
        let body = r#"{"latitude":52.52,"longitude":13.40,"country":"DE"}"#;
        let filter = CommunityFilter {
            focus: FocusSelection::NearMe,
            location: LocationStatus::Resolved(parse_lookup(body).unwrap()),
            ..Default::default()
        };
        let hits: Vec<&str> = apply(store.communities(), &filter)
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(hits, vec!["berlin-ethereum"]);
    }

    #[test]
    fn test_every_bundled_country_has_a_code() {
        use crate::store::EntityStore;

        let store = EntityStore::bundled().unwrap();
        for c in store.communities() {
            assert!(
                COUNTRY_CODES.iter().any(|(_, name)| *name == c.country),
                "no code maps to {}",
                c.country
            );
        }
    }

    #[test]
    fn test_parse_service_error() {
        let body = r#"{"error":true,"reason":"RateLimited"}"#;
        let err = parse_lookup(body).unwrap_err();
        assert!(err.to_string().contains("RateLimited"));
    }

    #[test]
    fn test_parse_missing_coordinates() {
        assert!(parse_lookup(r#"{"country_name":"France"}"#).is_err());
        assert!(parse_lookup("not json").is_err());
    }

    #[test]
    fn test_haversine_known_distance() {
        let london = Coordinates { lat: 51.5074, lng: -0.1278 };
        let paris = Coordinates { lat: 48.8566, lng: 2.3522 };
        let d = haversine_km(london, paris);
        assert!((d - 343.5).abs() < 5.0, "distance was {}", d);
        assert_eq!(haversine_km(paris, paris), 0.0);
    }
}
