//! Output formatters for renderable events.
//!
//! Supports human-readable (with colors), JSON, and NDJSON formats.

use std::io::{self, Write};

use crate::marker::{MagnitudeClass, MapMarker};
use crate::models::RenderableEvent;
use crate::session::Snapshot;

// ANSI color codes
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

const RED: &str = "\x1b[91m";
const ORANGE: &str = "\x1b[38;5;208m";
const GREEN: &str = "\x1b[92m";
const GRAY: &str = "\x1b[90m";

const ICON_QUAKE: &str = "🌍";

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Human-readable terminal output (default)
    #[default]
    Human,
    /// JSON array
    Json,
    /// Newline-delimited JSON (one object per line)
    Ndjson,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            "ndjson" => Ok(Self::Ndjson),
            _ => Err(format!("unknown format: {s} (expected: human, json, ndjson)")),
        }
    }
}

/// Terminal color for a magnitude class.
const fn class_color(class: MagnitudeClass) -> &'static str {
    match class {
        MagnitudeClass::High => RED,
        MagnitudeClass::Moderate => ORANGE,
        MagnitudeClass::Low => GREEN,
        MagnitudeClass::Unknown => GRAY,
    }
}

/// Write events in human-readable format, color-coded by magnitude class.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_human<W: Write>(writer: &mut W, events: &[RenderableEvent]) -> io::Result<()> {
    for event in events {
        let time = event
            .occurred_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown".into());

        let mag_str = event
            .magnitude
            .map(|m| format!("{m:.1}"))
            .unwrap_or_else(|| "?".into());

        let depth = event
            .depth
            .map(|d| format!("{d:>5.0}km"))
            .unwrap_or_else(|| "    ?km".into());

        let class = MagnitudeClass::from_magnitude(event.magnitude);
        let color = class_color(class);
        let label = class.as_str().to_uppercase();

        writeln!(
            writer,
            "{ICON_QUAKE} {color}{BOLD}M{mag_str:<4}{RESET} │ \
             {color}{label:8}{RESET} │ \
             {DIM}{depth}{RESET} │ \
             {time} UTC │ \
             {place} {DIM}({lat:.2}, {lon:.2}){RESET}",
            place = event.place,
            lat = event.lat,
            lon = event.lon,
        )?;
    }
    Ok(())
}

/// Write events as a JSON array of map markers.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write>(writer: &mut W, events: &[RenderableEvent]) -> io::Result<()> {
    let output: Vec<MapMarker<'_>> = events.iter().map(MapMarker::from).collect();
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{json}")
}

/// Write events as newline-delimited JSON.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_ndjson<W: Write>(writer: &mut W, events: &[RenderableEvent]) -> io::Result<()> {
    for event in events {
        let json = serde_json::to_string(&MapMarker::from(event))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(writer, "{json}")?;
    }
    Ok(())
}

/// Write events in the specified format.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_events<W: Write>(writer: &mut W, events: &[RenderableEvent], format: Format) -> io::Result<()> {
    match format {
        Format::Human => write_human(writer, events),
        Format::Json => write_json(writer, events),
        Format::Ndjson => write_ndjson(writer, events),
    }
}

/// One-line summary of a session snapshot for the terminal.
#[must_use]
pub fn status_line(snapshot: &Snapshot) -> String {
    let filter = snapshot.filter;
    let status = if let Some(reason) = snapshot.error {
        format!("{RED}Failed to fetch earthquake data{RESET} {DIM}({reason}){RESET}")
    } else if snapshot.loading {
        "loading…".to_string()
    } else {
        format!("{} events", snapshot.events.len())
    };
    let updated = snapshot
        .updated_at
        .map(|t| t.format("%H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".into());

    format!(
        "{DIM}last {}h · M{}+ · updated {updated}{RESET} │ {status}",
        filter.hours_back, filter.min_magnitude
    )
}
