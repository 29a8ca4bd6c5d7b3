//! Filter state for feed queries.
//!
//! Both values are validated on construction, so a `FilterState` is always
//! inside the ranges the feed query accepts.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Smallest accepted look-back window, in hours.
pub const MIN_HOURS_BACK: u32 = 1;

/// Largest accepted look-back window (30 days), in hours.
pub const MAX_HOURS_BACK: u32 = 720;

/// How many hours back from "now" a query reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct HoursBack(u32);

impl HoursBack {
    /// Create a window length, rejecting values outside 1..=720.
    ///
    /// # Errors
    ///
    /// Returns a message describing the accepted range.
    pub fn new(hours: u32) -> Result<Self, String> {
        if (MIN_HOURS_BACK..=MAX_HOURS_BACK).contains(&hours) {
            Ok(Self(hours))
        } else {
            Err(format!(
                "hours back {hours} out of range [{MIN_HOURS_BACK}, {MAX_HOURS_BACK}]"
            ))
        }
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl Default for HoursBack {
    fn default() -> Self {
        Self(24)
    }
}

impl TryFrom<u32> for HoursBack {
    type Error = String;

    fn try_from(hours: u32) -> Result<Self, Self::Error> {
        Self::new(hours)
    }
}

impl From<HoursBack> for u32 {
    fn from(hours: HoursBack) -> Self {
        hours.0
    }
}

impl std::str::FromStr for HoursBack {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hours = s
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid hours back '{s}': {e}"))?;
        Self::new(hours)
    }
}

impl fmt::Display for HoursBack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Minimum magnitude choices offered by the magnitude selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub enum MagnitudeThreshold {
    /// Every event
    All,
    /// M2.5+
    #[default]
    M2_5,
    /// M4.5+
    M4_5,
    /// M6.0+
    M6_0,
}

impl MagnitudeThreshold {
    /// All selectable thresholds, lowest first.
    pub const ALL: [Self; 4] = [Self::All, Self::M2_5, Self::M4_5, Self::M6_0];

    #[must_use]
    pub const fn as_f64(self) -> f64 {
        match self {
            Self::All => 0.0,
            Self::M2_5 => 2.5,
            Self::M4_5 => 4.5,
            Self::M6_0 => 6.0,
        }
    }

    /// Value for the `minmagnitude` query parameter.
    #[must_use]
    pub const fn as_query_value(self) -> &'static str {
        match self {
            Self::All => "0",
            Self::M2_5 => "2.5",
            Self::M4_5 => "4.5",
            Self::M6_0 => "6.0",
        }
    }
}

impl TryFrom<f64> for MagnitudeThreshold {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|t| (t.as_f64() - value).abs() < f64::EPSILON)
            .ok_or_else(|| format!("unsupported minimum magnitude {value} (expected 0, 2.5, 4.5 or 6.0)"))
    }
}

impl From<MagnitudeThreshold> for f64 {
    fn from(threshold: MagnitudeThreshold) -> Self {
        threshold.as_f64()
    }
}

impl std::str::FromStr for MagnitudeThreshold {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid magnitude '{s}': {e}"))?;
        Self::try_from(value)
    }
}

impl fmt::Display for MagnitudeThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query_value())
    }
}

/// User-chosen query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterState {
    pub hours_back: HoursBack,
    pub min_magnitude: MagnitudeThreshold,
}

impl FilterState {
    #[must_use]
    pub const fn new(hours_back: HoursBack, min_magnitude: MagnitudeThreshold) -> Self {
        Self {
            hours_back,
            min_magnitude,
        }
    }
}
