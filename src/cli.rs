//! Command-line interface definitions.
//!
//! Uses clap derive API for argument parsing.

use clap::{Args, Parser, Subcommand};

use crate::client::USGS_QUERY_URL;
use crate::filters::{HoursBack, MagnitudeThreshold};
use crate::models::LatLon;
use crate::output::Format;

/// Recent earthquakes on an interactive world map.
#[derive(Parser, Debug)]
#[command(name = "seismomap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    pub quiet: bool,

    /// FDSN event query endpoint
    #[arg(long, global = true, env = "SEISMOMAP_FEED_URL", default_value = USGS_QUERY_URL)]
    pub feed_url: String,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the interactive map
    Ui(UiArgs),

    /// Fetch events once and print them
    Query(QueryArgs),

    /// Refresh periodically and print each update
    Watch(WatchArgs),
}

/// Filter flags shared by every command.
#[derive(Args, Debug, Clone, Copy)]
pub struct FilterArgs {
    /// Hours to look back (1-720)
    #[arg(long = "hours", default_value = "24", value_parser = parse_hours)]
    pub hours_back: HoursBack,

    /// Minimum magnitude: 0, 2.5, 4.5 or 6.0
    #[arg(long, default_value = "2.5", value_parser = parse_magnitude)]
    pub min_magnitude: MagnitudeThreshold,
}

/// Where the user's position comes from.
#[derive(Args, Debug, Clone, Copy)]
pub struct LocationArgs {
    /// Use a fixed location instead of looking it up: lat,lon
    #[arg(long, value_parser = parse_location, conflicts_with = "no_geolocate")]
    pub location: Option<LatLon>,

    /// Do not look up the user's location
    #[arg(long)]
    pub no_geolocate: bool,
}

/// Arguments for the `ui` command.
#[derive(Parser, Debug)]
pub struct UiArgs {
    /// Port to listen on
    #[arg(long, short = 'p', default_value = "8080")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Refresh interval in seconds (minimum 30)
    #[arg(long, default_value = "300")]
    pub refresh_secs: u64,

    #[command(flatten)]
    pub filter: FilterArgs,

    #[command(flatten)]
    pub location: LocationArgs,

    /// Open browser automatically
    #[arg(long)]
    pub open: bool,
}

/// Arguments for the `query` command.
#[derive(Parser, Debug)]
pub struct QueryArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Maximum number of events to show
    #[arg(long, short = 'n', default_value = "50")]
    pub limit: usize,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Arguments for the `watch` command.
#[derive(Parser, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Refresh interval in seconds (minimum 30)
    #[arg(long, default_value = "300")]
    pub refresh_secs: u64,

    /// Maximum number of events to print per update
    #[arg(long, short = 'n', default_value = "20")]
    pub limit: usize,
}

/// Parse an hours-back value from string.
fn parse_hours(s: &str) -> Result<HoursBack, String> {
    s.parse()
}

/// Parse a magnitude threshold from string.
fn parse_magnitude(s: &str) -> Result<MagnitudeThreshold, String> {
    s.parse()
}

/// Parse an output format from string.
fn parse_format(s: &str) -> Result<Format, String> {
    s.parse()
}

/// Parse a fixed location from string.
fn parse_location(s: &str) -> Result<LatLon, String> {
    s.parse()
}
