//! Data models for USGS event feed responses and the renderable event.
//!
//! The raw structures follow the GeoJSON format returned by the FDSN event
//! service. Every field is optional on the wire; a field with an unexpected
//! shape is read as absent instead of failing the whole document.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::errors::SeismomapError;

/// Top-level GeoJSON response from the event service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureCollection {
    /// "FeatureCollection" when present
    #[serde(rename = "type", default)]
    pub type_: Option<String>,

    /// Feed metadata
    #[serde(default, deserialize_with = "lenient")]
    pub metadata: Option<Metadata>,

    /// Earthquake events; absent means no events
    #[serde(default, deserialize_with = "lenient_features")]
    pub features: Option<Vec<RawFeature>>,
}

impl FeatureCollection {
    /// Validate the response structure.
    ///
    /// # Errors
    ///
    /// Returns an error if the document declares a type other than
    /// `FeatureCollection`.
    pub fn validate(&self) -> Result<(), SeismomapError> {
        match self.type_.as_deref() {
            None | Some("FeatureCollection") => Ok(()),
            Some(other) => Err(SeismomapError::InvalidResponse(format!(
                "expected type 'FeatureCollection', got '{other}'"
            ))),
        }
    }

    /// Borrow the feature list, empty when the feed omitted it.
    #[must_use]
    pub fn features(&self) -> &[RawFeature] {
        self.features.as_deref().unwrap_or_default()
    }
}

/// Metadata about the feed response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Metadata {
    /// When this response was generated (ms since epoch)
    #[serde(default)]
    pub generated: Option<i64>,

    /// Request URL echoed back
    #[serde(default)]
    pub url: Option<String>,

    /// Human-readable title
    #[serde(default)]
    pub title: Option<String>,

    /// Number of events in response
    #[serde(default)]
    pub count: Option<usize>,
}

/// A single event record as returned by the feed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFeature {
    /// Event ID
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,

    /// Geographic location
    #[serde(default, deserialize_with = "lenient")]
    pub geometry: Option<Geometry>,

    /// Event properties
    #[serde(default, deserialize_with = "lenient")]
    pub properties: Option<Properties>,
}

impl RawFeature {
    fn coordinate(&self, index: usize) -> Option<f64> {
        self.geometry
            .as_ref()
            .and_then(|g| g.coordinates.get(index).copied().flatten())
            .filter(|v| v.is_finite())
    }

    /// Longitude in degrees.
    #[must_use]
    pub fn longitude(&self) -> Option<f64> {
        self.coordinate(0)
    }

    /// Latitude in degrees.
    #[must_use]
    pub fn latitude(&self) -> Option<f64> {
        self.coordinate(1)
    }

    /// Depth in kilometers (positive down).
    #[must_use]
    pub fn depth_km(&self) -> Option<f64> {
        self.coordinate(2)
    }

    #[must_use]
    pub fn magnitude(&self) -> Option<f64> {
        self.properties.as_ref().and_then(|p| p.mag)
    }

    /// Event time as a `DateTime<Utc>`.
    #[must_use]
    pub fn time(&self) -> Option<DateTime<Utc>> {
        self.properties
            .as_ref()
            .and_then(|p| p.time)
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }
}

/// Geographic geometry for an event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Geometry {
    /// Coordinates: [longitude, latitude, depth_km]
    #[serde(default, deserialize_with = "lenient_coordinates")]
    pub coordinates: Vec<Option<f64>>,
}

/// The event properties seismomap reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Properties {
    /// Magnitude value
    #[serde(default, deserialize_with = "lenient")]
    pub mag: Option<f64>,

    /// Human-readable place description
    #[serde(default, deserialize_with = "lenient")]
    pub place: Option<String>,

    /// Event time (ms since epoch)
    #[serde(default, deserialize_with = "lenient")]
    pub time: Option<i64>,

    /// Event page URL
    #[serde(default, deserialize_with = "lenient")]
    pub url: Option<String>,
}

/// Read a field as `None` when it is null or has an unexpected shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_coordinates<'de, D>(deserializer: D) -> Result<Vec<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let coordinates = match value {
        serde_json::Value::Array(items) => items.iter().map(serde_json::Value::as_f64).collect(),
        _ => Vec::new(),
    };
    Ok(coordinates)
}

/// A non-array `features` member is a structural error; individual entries
/// that are not objects are skipped.
fn lenient_features<'de, D>(deserializer: D) -> Result<Option<Vec<RawFeature>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(items) = Option::<Vec<serde_json::Value>>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let total = items.len();
    let features: Vec<RawFeature> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if features.len() < total {
        debug!("skipped {} non-object feature entries", total - features.len());
    }
    Ok(Some(features))
}

/// A geographic point in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    /// Create a point, rejecting values outside the WGS84 range.
    ///
    /// # Errors
    ///
    /// Returns an error if either value is non-finite or out of range.
    pub fn new(lat: f64, lon: f64) -> Result<Self, SeismomapError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(SeismomapError::InvalidCoordinates(format!(
                "latitude {lat} out of range [-90, 90]"
            )));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(SeismomapError::InvalidCoordinates(format!(
                "longitude {lon} out of range [-180, 180]"
            )));
        }
        Ok(Self { lat, lon })
    }

    /// Create a point from a map click, wrapping longitude into
    /// [-180, 180) since a panned world map reports unwrapped values.
    ///
    /// # Errors
    ///
    /// Returns an error if latitude is out of range or either value is
    /// non-finite.
    pub fn wrapped(lat: f64, lon: f64) -> Result<Self, SeismomapError> {
        if !lon.is_finite() {
            return Err(SeismomapError::InvalidCoordinates(format!(
                "longitude {lon} is not finite"
            )));
        }
        let lon = if (-180.0..=180.0).contains(&lon) {
            lon
        } else {
            (lon + 180.0).rem_euclid(360.0) - 180.0
        };
        Self::new(lat, lon)
    }
}

impl std::str::FromStr for LatLon {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 2 {
            return Err(format!(
                "location requires 2 values (lat,lon), got {}",
                parts.len()
            ));
        }

        let vals: Result<Vec<f64>, _> = parts.iter().map(|p| p.trim().parse::<f64>()).collect();
        let vals = vals.map_err(|e| format!("invalid number in location: {e}"))?;

        Self::new(vals[0], vals[1]).map_err(|e| e.to_string())
    }
}

impl fmt::Display for LatLon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}°, {:.4}°", self.lat, self.lon)
    }
}

/// Minimal event record handed to the map view.
///
/// Built fresh from each response; colors and marker sizes are derived
/// from `magnitude` at render time and never stored here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderableEvent {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub depth: Option<f64>,
    pub magnitude: Option<f64>,
    pub place: String,
    pub occurred_at: Option<DateTime<Utc>>,
    pub detail_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "metadata": {"generated": 1700000000000, "count": 2, "title": "USGS Earthquakes"},
        "features": [
            {
                "type": "Feature",
                "id": "us7000abcd",
                "geometry": {"type": "Point", "coordinates": [142.37, 38.29, 29.0]},
                "properties": {"mag": 6.1, "place": "near the east coast of Honshu, Japan",
                               "time": 1700000000000, "url": "https://earthquake.usgs.gov/earthquakes/eventpage/us7000abcd"}
            },
            {
                "type": "Feature",
                "id": "ci40000001",
                "geometry": {"type": "Point", "coordinates": [-117.5, 35.7]},
                "properties": {"mag": null, "place": null, "time": "bogus"}
            }
        ]
    }"#;

    #[test]
    fn test_parse_sample_feed() {
        let feed: FeatureCollection = serde_json::from_str(SAMPLE).expect("failed to parse feed");
        feed.validate().expect("invalid feed");
        assert_eq!(feed.features().len(), 2);
        assert_eq!(feed.metadata.as_ref().and_then(|m| m.count), Some(2));

        let first = &feed.features()[0];
        assert_eq!(first.id.as_deref(), Some("us7000abcd"));
        assert_eq!(first.latitude(), Some(38.29));
        assert_eq!(first.longitude(), Some(142.37));
        assert_eq!(first.depth_km(), Some(29.0));
        assert_eq!(first.magnitude(), Some(6.1));
        assert_eq!(first.time().map(|t| t.timestamp_millis()), Some(1_700_000_000_000));

        let second = &feed.features()[1];
        assert_eq!(second.depth_km(), None);
        assert_eq!(second.magnitude(), None);
        assert_eq!(second.time(), None);
    }

    #[test]
    fn test_missing_features_is_empty() {
        let feed: FeatureCollection =
            serde_json::from_str(r#"{"type": "FeatureCollection"}"#).unwrap();
        feed.validate().unwrap();
        assert!(feed.features().is_empty());
    }

    #[test]
    fn test_wrong_type_rejected() {
        let feed: FeatureCollection = serde_json::from_str(r#"{"type": "Feature"}"#).unwrap();
        assert!(feed.validate().is_err());
    }

    #[test]
    fn test_non_array_features_is_error() {
        assert!(serde_json::from_str::<FeatureCollection>(r#"{"features": "nope"}"#).is_err());
    }

    #[test]
    fn test_malformed_entries_skipped() {
        let feed: FeatureCollection = serde_json::from_str(
            r#"{"features": [42, {"id": "a", "geometry": {"coordinates": "x"}}]}"#,
        )
        .unwrap();
        assert_eq!(feed.features().len(), 1);
        assert_eq!(feed.features()[0].latitude(), None);
    }

    #[test]
    fn test_latlon_parse() {
        let loc: LatLon = "37.77,-122.41".parse().unwrap();
        assert!((loc.lat - 37.77).abs() < 0.001);
        assert!((loc.lon - (-122.41)).abs() < 0.001);
        assert!("91,0".parse::<LatLon>().is_err());
        assert!("0,181".parse::<LatLon>().is_err());
        assert!("1,2,3".parse::<LatLon>().is_err());
    }

    #[test]
    fn test_latlon_wrapped() {
        let p = LatLon::wrapped(10.0, 380.0).unwrap();
        assert!((p.lon - 20.0).abs() < 1e-9);
        let p = LatLon::wrapped(10.0, -200.0).unwrap();
        assert!((p.lon - 160.0).abs() < 1e-9);
        assert!(LatLon::wrapped(95.0, 0.0).is_err());
        assert!(LatLon::wrapped(0.0, f64::NAN).is_err());
    }
}
