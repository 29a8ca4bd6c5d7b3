//! The coordinator task that owns a [`Session`].
//!
//! All state changes run on one task that drains a command channel. Fetches
//! and the position lookup run in their own tasks and report back through
//! the same channel, so results are applied one at a time in arrival order
//! and the session's sequence check decides which of them stick.
//!
//! Readers get immutable [`Snapshot`]s through a `watch` channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::client::EventSource;
use crate::filters::FilterState;
use crate::geolocation::{PositionOptions, PositionSource, locate_once};
use crate::models::LatLon;
use crate::scheduler::RefreshTarget;
use crate::session::{Action, Effect, FetchOrigin, Session, Snapshot, ViewState};

/// Queue depth between handles and the coordinator task.
const COMMAND_BUFFER: usize = 64;

/// Default auto-refresh period (5 minutes).
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Engine settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Filter in effect before the user changes anything
    pub initial_filter: FilterState,
    /// Map camera before the first click or locate
    pub initial_view: ViewState,
    /// Auto-refresh period
    pub refresh_interval: Duration,
    /// Options for the one-shot position request
    pub position: PositionOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_filter: FilterState::default(),
            initial_view: ViewState::default(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            position: PositionOptions::default(),
        }
    }
}

enum Command {
    Dispatch(Action),
    Shutdown,
}

/// Cloneable entry point into a running coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Snapshot>,
}

impl CoordinatorHandle {
    /// Send an action; returns `false` once the coordinator has shut down.
    pub async fn dispatch(&self, action: Action) -> bool {
        self.tx.send(Command::Dispatch(action)).await.is_ok()
    }

    pub async fn set_filters(&self, filter: FilterState) -> bool {
        self.dispatch(Action::SetFilters(filter)).await
    }

    /// Fetch now with the current filters.
    pub async fn apply(&self) -> bool {
        self.dispatch(Action::RequestFetch(FetchOrigin::Apply)).await
    }

    pub async fn map_clicked(&self, point: LatLon) -> bool {
        self.dispatch(Action::MapClicked(point)).await
    }

    pub async fn locate_me(&self) -> bool {
        self.dispatch(Action::LocateMe).await
    }

    pub async fn dismiss_notice(&self) -> bool {
        self.dispatch(Action::DismissNotice).await
    }

    /// Start the one-per-session position request. Repeat calls are no-ops.
    pub async fn request_location(&self) -> bool {
        self.dispatch(Action::RequestLocation).await
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver that is notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Stop the coordinator task. In-flight fetches finish on their own and
    /// their results are dropped.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown).await;
    }
}

#[async_trait]
impl RefreshTarget for CoordinatorHandle {
    async fn request_fetch(&self, origin: FetchOrigin) -> bool {
        self.dispatch(Action::RequestFetch(origin)).await
    }
}

/// Spawn the coordinator task.
///
/// Returns a handle for sending actions and reading snapshots, plus the
/// task's join handle, which completes after [`CoordinatorHandle::shutdown`]
/// or once every handle has been dropped.
pub fn spawn(
    config: EngineConfig,
    events: Arc<dyn EventSource>,
    position: Arc<dyn PositionSource>,
) -> (CoordinatorHandle, JoinHandle<()>) {
    let session = Session::new(config.initial_filter, config.initial_view);
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());

    let worker = Worker {
        session,
        rx,
        tx: tx.downgrade(),
        snapshot_tx,
        events,
        position,
        position_options: config.position,
    };
    let task = tokio::spawn(worker.run());

    let handle = CoordinatorHandle {
        tx,
        snapshots: snapshot_rx,
    };
    (handle, task)
}

struct Worker {
    session: Session,
    rx: mpsc::Receiver<Command>,
    // Handed to spawned fetch/locate tasks so they can report back. Weak so
    // the queue closes when the last handle goes away.
    tx: mpsc::WeakSender<Command>,
    snapshot_tx: watch::Sender<Snapshot>,
    events: Arc<dyn EventSource>,
    position: Arc<dyn PositionSource>,
    position_options: PositionOptions,
}

impl Worker {
    async fn run(mut self) {
        info!("coordinator started");

        while let Some(command) = self.rx.recv().await {
            let action = match command {
                Command::Dispatch(action) => action,
                Command::Shutdown => break,
            };

            for effect in self.session.apply(action) {
                self.run_effect(effect);
            }
            self.snapshot_tx.send_replace(self.session.snapshot());
        }

        info!("coordinator stopped");
    }

    fn run_effect(&self, effect: Effect) {
        match effect {
            Effect::Fetch { seq, filter } => {
                let source = Arc::clone(&self.events);
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = source.fetch_events(filter).await.map_err(|e| {
                        tracing::warn!(seq, error = %e, "Failed to fetch earthquake data");
                        e.reason()
                    });
                    let action = Action::FetchCompleted {
                        seq,
                        result,
                        completed_at: Utc::now(),
                    };
                    if !report(&tx, action).await {
                        debug!(seq, "coordinator gone; dropping fetch result");
                    }
                });
            }
            Effect::LocateUser => {
                let source = Arc::clone(&self.position);
                let options = self.position_options;
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let found = locate_once(source.as_ref(), options).await;
                    if !report(&tx, Action::LocationResolved(found)).await {
                        debug!(found = found.is_some(), "coordinator gone; dropping location result");
                    }
                });
            }
        }
    }
}

/// Send a task's result back to the coordinator if it is still running.
async fn report(tx: &mpsc::WeakSender<Command>, action: Action) -> bool {
    match tx.upgrade() {
        Some(tx) => tx.send(Command::Dispatch(action)).await.is_ok(),
        None => false,
    }
}
