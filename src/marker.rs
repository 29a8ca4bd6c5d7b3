//! Map marker styling derived from magnitude.
//!
//! These are pure functions of an event's magnitude and are evaluated each
//! time markers are rendered.

use serde::Serialize;

use crate::models::RenderableEvent;

/// Smallest marker radius in pixels.
pub const MIN_RADIUS: f64 = 4.0;

/// Magnitude band used to pick a marker color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MagnitudeClass {
    /// Below M4.0
    Low,
    /// M4.0 up to M6.0
    Moderate,
    /// M6.0 and above
    High,
    /// No usable magnitude
    Unknown,
}

impl MagnitudeClass {
    #[must_use]
    pub fn from_magnitude(mag: Option<f64>) -> Self {
        match mag {
            Some(m) if !m.is_finite() => Self::Unknown,
            Some(m) if m >= 6.0 => Self::High,
            Some(m) if m >= 4.0 => Self::Moderate,
            Some(_) => Self::Low,
            None => Self::Unknown,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Unknown => "unknown",
        }
    }

    /// Fill color for the map marker.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Low => "green",
            Self::Moderate => "orange",
            Self::High => "red",
            Self::Unknown => "gray",
        }
    }
}

/// Marker radius: `max(4, 3 + 2 * mag)`, or the minimum when unknown.
#[must_use]
pub fn marker_radius(mag: Option<f64>) -> f64 {
    match mag {
        Some(m) if m.is_finite() => (3.0 + 2.0 * m).max(MIN_RADIUS),
        _ => MIN_RADIUS,
    }
}

/// One point as drawn by the map view.
#[derive(Debug, Clone, Serialize)]
pub struct MapMarker<'a> {
    #[serde(flatten)]
    pub event: &'a RenderableEvent,
    pub class: MagnitudeClass,
    pub color: &'static str,
    pub radius: f64,
}

impl<'a> From<&'a RenderableEvent> for MapMarker<'a> {
    fn from(event: &'a RenderableEvent) -> Self {
        let class = MagnitudeClass::from_magnitude(event.magnitude);
        Self {
            event,
            class,
            color: class.color(),
            radius: marker_radius(event.magnitude),
        }
    }
}
