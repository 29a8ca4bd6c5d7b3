//! seismomap - recent earthquakes on an interactive world map.
//!
//! Serves a local map page backed by the USGS event catalog, or prints
//! the same data to the terminal.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

use seismomap::cli::{self, Cli, Command};
use seismomap::client::{EventSource, UsgsClient};
use seismomap::coordinator::{self, CoordinatorHandle, EngineConfig};
use seismomap::filters::FilterState;
use seismomap::geolocation::{FixedPosition, IpGeolocator, NoGeolocation, PositionSource};
use seismomap::output;
use seismomap::scheduler::RefreshScheduler;
use seismomap::server;
use seismomap::session::ViewState;

/// Shortest refresh period accepted on the command line.
const MIN_REFRESH_SECS: u64 = 30;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    let client = UsgsClient::with_base_url(&cli.feed_url).context("failed to create USGS client")?;

    match cli.command {
        Command::Ui(args) => cmd_ui(args, client),
        Command::Query(args) => cmd_query(args, client),
        Command::Watch(args) => cmd_watch(args, client),
    }
}

/// Initialize tracing subscriber.
///
/// `RUST_LOG` wins over the verbosity flags when set.
fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to create tokio runtime")
}

fn refresh_interval(requested_secs: u64) -> Duration {
    let secs = requested_secs.max(MIN_REFRESH_SECS);
    if secs != requested_secs {
        tracing::warn!("refresh interval clamped to minimum of {MIN_REFRESH_SECS} seconds");
    }
    Duration::from_secs(secs)
}

fn position_source(args: cli::LocationArgs) -> Arc<dyn PositionSource> {
    match (args.location, args.no_geolocate) {
        (Some(fixed), _) => Arc::new(FixedPosition(fixed)),
        (None, true) => Arc::new(NoGeolocation),
        (None, false) => Arc::new(IpGeolocator::new()),
    }
}

/// Start the coordinator and its refresh timer, run `body`, then tear both
/// down.
async fn with_engine<F, Fut>(
    config: EngineConfig,
    events: Arc<dyn EventSource>,
    position: Arc<dyn PositionSource>,
    body: F,
) -> Result<()>
where
    F: FnOnce(CoordinatorHandle) -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    let mut scheduler = RefreshScheduler::new(config.refresh_interval);
    let (handle, task) = coordinator::spawn(config, events, position);

    handle.request_location().await;
    scheduler.start(handle.clone());

    let result = body(handle.clone()).await;

    scheduler.stop();
    handle.shutdown().await;
    task.await.context("coordinator task failed")?;
    result
}

/// Execute the `ui` command - serve the map page.
fn cmd_ui(args: cli::UiArgs, client: UsgsClient) -> Result<()> {
    let config = EngineConfig {
        initial_filter: FilterState::new(args.filter.hours_back, args.filter.min_magnitude),
        initial_view: ViewState::default(),
        refresh_interval: refresh_interval(args.refresh_secs),
        ..EngineConfig::default()
    };
    let server_config = server::ServerConfig {
        port: args.port,
        host: args.host.clone(),
    };

    // Print startup message
    let url = format!("http://{}:{}", args.host, args.port);
    println!("\x1b[1m🌍 seismomap\x1b[0m");
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("  Local:   \x1b[96m{url}\x1b[0m");
    println!("  Window:  last {}h, M{}+", args.filter.hours_back, args.filter.min_magnitude);
    println!("  Refresh: {}s", config.refresh_interval.as_secs());
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("\x1b[2mPress Ctrl+C to stop\x1b[0m\n");

    // Open browser if requested (using xdg-open/open command)
    if args.open {
        #[cfg(target_os = "linux")]
        let _ = std::process::Command::new("xdg-open").arg(&url).spawn();
        #[cfg(target_os = "macos")]
        let _ = std::process::Command::new("open").arg(&url).spawn();
        #[cfg(target_os = "windows")]
        let _ = std::process::Command::new("cmd").args(["/c", "start", &url]).spawn();
    }

    let position = position_source(args.location);
    runtime()?.block_on(with_engine(config, Arc::new(client), position, |handle| {
        server::run_server(server_config, handle)
    }))
}

/// Execute the `query` command - one-shot fetch.
fn cmd_query(args: cli::QueryArgs, client: UsgsClient) -> Result<()> {
    let filter = FilterState::new(args.filter.hours_back, args.filter.min_magnitude);

    let mut events = runtime()?
        .block_on(client.fetch_events(filter))
        .context("failed to fetch earthquake data")?;

    // Sort by time descending (most recent first)
    events.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
    events.truncate(args.limit);

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    output::write_events(&mut handle, &events, args.format)?;

    Ok(())
}

/// Execute the `watch` command - print every committed refresh.
fn cmd_watch(args: cli::WatchArgs, client: UsgsClient) -> Result<()> {
    let config = EngineConfig {
        initial_filter: FilterState::new(args.filter.hours_back, args.filter.min_magnitude),
        refresh_interval: refresh_interval(args.refresh_secs),
        ..EngineConfig::default()
    };
    let limit = args.limit;

    {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "\x1b[1m🌍 seismomap watch\x1b[0m")?;
        writeln!(
            handle,
            "\x1b[2mRefresh: {}s | Press Ctrl+C to stop\x1b[0m",
            config.refresh_interval.as_secs()
        )?;
    }

    runtime()?.block_on(with_engine(
        config,
        Arc::new(client),
        Arc::new(NoGeolocation),
        move |handle| async move {
            let mut updates = handle.subscribe();
            let mut last_printed = None;

            loop {
                tokio::select! {
                    changed = updates.changed() => {
                        if changed.is_err() {
                            return Ok(());
                        }
                    }
                    _ = tokio::signal::ctrl_c() => return Ok(()),
                }

                let snapshot = updates.borrow_and_update().clone();
                if snapshot.loading {
                    continue;
                }
                let key = (snapshot.updated_at, snapshot.error);
                if last_printed == Some(key) {
                    continue;
                }
                last_printed = Some(key);

                let mut events = Vec::clone(&snapshot.events);
                events.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
                events.truncate(limit);

                let stdout = io::stdout();
                let mut out = stdout.lock();
                writeln!(out, "{}", output::status_line(&snapshot))?;
                if snapshot.error.is_none() {
                    output::write_human(&mut out, &events)?;
                }
                out.flush()?;
            }
        },
    ))
}
