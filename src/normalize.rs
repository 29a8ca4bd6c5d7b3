//! Raw feed records to renderable events.

use tracing::debug;

use crate::models::{RawFeature, RenderableEvent};

/// Place label used when the feed has none.
pub const UNKNOWN_PLACE: &str = "Unknown location";

impl RenderableEvent {
    /// Build a renderable event, or `None` when the record has no usable
    /// latitude or longitude.
    ///
    /// `index` is the record's position in the response and only feeds the
    /// fallback id for records the feed left unidentified.
    #[must_use]
    pub fn from_raw(raw: &RawFeature, index: usize) -> Option<Self> {
        let lat = raw.latitude()?;
        let lon = raw.longitude()?;
        let properties = raw.properties.as_ref();

        Some(Self {
            id: raw
                .id
                .clone()
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("unidentified-{index}")),
            lat,
            lon,
            depth: raw.depth_km(),
            magnitude: raw.magnitude(),
            place: properties
                .and_then(|p| p.place.clone())
                .unwrap_or_else(|| UNKNOWN_PLACE.to_string()),
            occurred_at: raw.time(),
            detail_url: properties.and_then(|p| p.url.clone()),
        })
    }
}

/// Normalize a response's features, dropping records without a position.
#[must_use]
pub fn normalize(features: &[RawFeature]) -> Vec<RenderableEvent> {
    let events: Vec<RenderableEvent> = features
        .iter()
        .enumerate()
        .filter_map(|(i, raw)| RenderableEvent::from_raw(raw, i))
        .collect();

    let dropped = features.len() - events.len();
    if dropped > 0 {
        debug!("dropped {dropped} features without latitude/longitude");
    }
    events
}
