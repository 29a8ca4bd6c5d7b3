//! USGS event catalog client.
//!
//! Issues FDSN event queries over HTTP and normalizes the GeoJSON response.
//! Uses reqwest with rustls for TLS.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use tracing::{debug, instrument};

use crate::errors::SeismomapError;
use crate::filters::FilterState;
use crate::models::{FeatureCollection, RenderableEvent};
use crate::normalize::normalize;
use crate::time_window::TimeWindow;

/// Default request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// User agent string for API requests.
const USER_AGENT: &str = concat!("seismomap/", env!("CARGO_PKG_VERSION"));

/// FDSN event query endpoint.
pub const USGS_QUERY_URL: &str = "https://earthquake.usgs.gov/fdsnws/event/1/query";

/// Response format selector sent with every query.
const RESPONSE_FORMAT: &str = "geojson";

/// Anything that can turn a filter into a list of events.
///
/// The coordinator only talks to this trait, so tests can substitute
/// scripted sources for the HTTP client.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Perform exactly one lookup for `filter`. No retries.
    async fn fetch_events(&self, filter: FilterState) -> Result<Vec<RenderableEvent>, SeismomapError>;
}

/// Client for the USGS FDSN event service.
#[derive(Debug, Clone)]
pub struct UsgsClient {
    client: Client,
    base_url: Url,
}

impl UsgsClient {
    /// Create a client against the public USGS endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new() -> Result<Self, SeismomapError> {
        Self::with_base_url(USGS_QUERY_URL)
    }

    /// Create a client against a custom query endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be
    /// initialized.
    pub fn with_base_url(base_url: &str) -> Result<Self, SeismomapError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SeismomapError::InvalidResponse(format!("bad feed URL '{base_url}': {e}")))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Build the query URL for a filter and window.
    #[must_use]
    pub fn query_url(&self, filter: FilterState, window: &TimeWindow) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("format", RESPONSE_FORMAT)
            .append_pair("starttime", &window.start_param())
            .append_pair("endtime", &window.end_param())
            .append_pair("minmagnitude", filter.min_magnitude.as_query_value());
        url
    }

    /// Fetch events for `filter` with the window ending at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the status is not a success,
    /// or the body is not a GeoJSON feature collection.
    #[instrument(skip(self), fields(hours = filter.hours_back.get(), minmag = filter.min_magnitude.as_query_value()))]
    pub async fn fetch_at(
        &self,
        filter: FilterState,
        now: DateTime<Utc>,
    ) -> Result<Vec<RenderableEvent>, SeismomapError> {
        let window = TimeWindow::ending_at(filter.hours_back, now);
        let url = self.query_url(filter, &window);

        debug!("fetching events from {}", url);

        let response = self.client.get(url).send().await?;

        // Check status before parsing
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SeismomapError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.bytes().await?;
        let feed: FeatureCollection = serde_json::from_slice(&body)?;

        // Validate response structure
        feed.validate()?;

        let events = normalize(feed.features());
        debug!("fetched {} events ({} raw features)", events.len(), feed.features().len());
        Ok(events)
    }
}

#[async_trait]
impl EventSource for UsgsClient {
    async fn fetch_events(&self, filter: FilterState) -> Result<Vec<RenderableEvent>, SeismomapError> {
        self.fetch_at(filter, Utc::now()).await
    }
}
