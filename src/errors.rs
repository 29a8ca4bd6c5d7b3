//! Error types for seismomap.
//!
//! Uses `thiserror` for library-style error definitions.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while talking to the event feed.
#[derive(Error, Debug)]
pub enum SeismomapError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// API returned an error status
    #[error("USGS API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid response structure
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Coordinate pair outside the WGS84 range
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),
}

impl SeismomapError {
    /// Classify this error the way it is surfaced in a fetch outcome.
    #[must_use]
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::Http(e) if e.is_decode() => FailureReason::Parse,
            Self::Http(_) | Self::Api { .. } => FailureReason::Network,
            Self::Parse(_) | Self::InvalidResponse(_) | Self::InvalidCoordinates(_) => {
                FailureReason::Parse
            }
        }
    }
}

/// Why a fetch failed, as recorded in the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Transport failure or non-success status
    Network,
    /// Body was not the expected GeoJSON document
    Parse,
}

impl FailureReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network error",
            Self::Parse => "parse error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a position lookup can fail.
///
/// None of these reach the user; they are logged and the session simply
/// has no location.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeolocationError {
    /// No position source is configured
    #[error("geolocation is not supported")]
    Unsupported,

    /// The source refused to provide a position
    #[error("geolocation denied: {0}")]
    Denied(String),

    /// The lookup did not finish within its bound
    #[error("geolocation timed out after {0}s")]
    Timeout(u64),

    /// The lookup itself failed
    #[error("geolocation lookup failed: {0}")]
    Lookup(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_classification() {
        let api = SeismomapError::Api {
            status: 503,
            message: "unavailable".into(),
        };
        assert_eq!(api.reason(), FailureReason::Network);

        let bad = SeismomapError::InvalidResponse("expected FeatureCollection".into());
        assert_eq!(bad.reason(), FailureReason::Parse);

        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(SeismomapError::from(json).reason(), FailureReason::Parse);
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(FailureReason::Network.to_string(), "network error");
        assert_eq!(FailureReason::Parse.to_string(), "parse error");
    }
}
