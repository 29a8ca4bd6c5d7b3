//! One-shot user position lookup.
//!
//! A [`PositionSource`] answers a single request; [`locate_once`] bounds it
//! with a timeout and folds every failure into "no location". Nothing here
//! surfaces an error to the user.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{Instrument, info, info_span, warn};

use crate::errors::GeolocationError;
use crate::models::LatLon;

/// Default bound on a position request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// IP geolocation endpoint (ip-api.com JSON API).
pub const IP_API_URL: &str = "http://ip-api.com/json";

/// Options passed with a position request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    /// Ask for the most precise fix the source can give
    pub high_accuracy: bool,
    /// Upper bound on how long the request may take
    pub timeout: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// A device or network capability that can report where the user is.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Answer one position request.
    async fn current_position(&self, options: PositionOptions) -> Result<LatLon, GeolocationError>;
}

/// Request the position once, bounded by `options.timeout`.
///
/// Returns `None` on any failure; the reason is logged at warn level.
pub async fn locate_once(source: &dyn PositionSource, options: PositionOptions) -> Option<LatLon> {
    let span = info_span!(
        "geolocation",
        source = source.name(),
        high_accuracy = options.high_accuracy
    );

    async move {
        let result = match tokio::time::timeout(options.timeout, source.current_position(options)).await {
            Ok(result) => result,
            Err(_) => Err(GeolocationError::Timeout(options.timeout.as_secs())),
        };

        match result {
            Ok(position) => {
                info!(lat = position.lat, lon = position.lon, "user location resolved");
                Some(position)
            }
            Err(e) => {
                warn!(error = %e, "user location unavailable");
                None
            }
        }
    }
    .instrument(span)
    .await
}

/// Always fails with [`GeolocationError::Unsupported`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGeolocation;

#[async_trait]
impl PositionSource for NoGeolocation {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn current_position(&self, _options: PositionOptions) -> Result<LatLon, GeolocationError> {
        Err(GeolocationError::Unsupported)
    }
}

/// A position configured up front.
#[derive(Debug, Clone, Copy)]
pub struct FixedPosition(pub LatLon);

#[async_trait]
impl PositionSource for FixedPosition {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn current_position(&self, _options: PositionOptions) -> Result<LatLon, GeolocationError> {
        Ok(self.0)
    }
}

/// Approximate position from the public IP address.
#[derive(Debug, Clone)]
pub struct IpGeolocator {
    client: Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    city: Option<String>,
}

impl IpGeolocator {
    #[must_use]
    pub fn new() -> Self {
        Self::with_url(IP_API_URL)
    }

    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

impl Default for IpGeolocator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PositionSource for IpGeolocator {
    fn name(&self) -> &'static str {
        "ip-api"
    }

    async fn current_position(&self, options: PositionOptions) -> Result<LatLon, GeolocationError> {
        // IP lookups have a single precision level; the hint is only logged.
        tracing::debug!(high_accuracy = options.high_accuracy, "requesting IP geolocation");

        let response = self
            .client
            .get(&self.url)
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| GeolocationError::Lookup(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeolocationError::Lookup(format!("HTTP {}", status.as_u16())));
        }

        let body: IpApiResponse = response
            .json()
            .await
            .map_err(|e| GeolocationError::Lookup(e.to_string()))?;

        if body.status != "success" {
            return Err(GeolocationError::Denied(
                body.message.unwrap_or_else(|| body.status.clone()),
            ));
        }

        let (Some(lat), Some(lon)) = (body.lat, body.lon) else {
            return Err(GeolocationError::Lookup("response missing lat/lon".into()));
        };
        tracing::debug!(city = body.city.as_deref().unwrap_or("?"), "IP geolocation answered");

        LatLon::new(lat, lon).map_err(|e| GeolocationError::Lookup(e.to_string()))
    }
}
