//! seismomap - recent earthquakes on an interactive world map.
//!
//! The crate is the data side of the map: it turns the user's filters into
//! USGS event queries, normalizes the results, refreshes them on a timer,
//! and keeps the map camera and user location in one session state that the
//! map view renders from.

pub mod cli;
pub mod client;
pub mod coordinator;
pub mod errors;
pub mod filters;
pub mod geolocation;
pub mod marker;
pub mod models;
pub mod normalize;
pub mod output;
pub mod scheduler;
pub mod server;
pub mod session;
pub mod time_window;
