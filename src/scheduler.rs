//! Periodic refresh.
//!
//! The scheduler fires one fetch as soon as it starts and another every
//! period after that. Manual "Apply" goes straight to the coordinator and
//! does not touch the timer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::session::FetchOrigin;

/// Receiver of scheduled fetch requests.
#[async_trait]
pub trait RefreshTarget: Send + Sync + 'static {
    /// Ask for a fetch. Returns `false` once the target is gone, which
    /// stops the scheduler.
    async fn request_fetch(&self, origin: FetchOrigin) -> bool;
}

/// Owns the refresh timer task. Dropping it stops the timer.
#[derive(Debug)]
pub struct RefreshScheduler {
    period: Duration,
    running: Option<Running>,
}

#[derive(Debug)]
struct Running {
    task: JoinHandle<()>,
    active: Arc<AtomicBool>,
}

impl RefreshScheduler {
    #[must_use]
    pub const fn new(period: Duration) -> Self {
        Self {
            period,
            running: None,
        }
    }

    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.as_ref().is_some_and(|r| !r.task.is_finished())
    }

    /// Start ticking into `target`. Calling it while running does nothing.
    pub fn start<T: RefreshTarget>(&mut self, target: T) {
        if self.is_running() {
            debug!("refresh scheduler already running");
            return;
        }

        let active = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(tick_loop(target, self.period, Arc::clone(&active)));
        info!(period_secs = self.period.as_secs(), "refresh scheduler started");
        self.running = Some(Running { task, active });
    }

    /// Cancel the timer. No fetch is requested after this returns.
    /// Calling it while stopped does nothing.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.active.store(false, Ordering::SeqCst);
            running.task.abort();
            info!("refresh scheduler stopped");
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn tick_loop<T: RefreshTarget>(target: T, period: Duration, active: Arc<AtomicBool>) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut origin = FetchOrigin::Startup;
    loop {
        ticker.tick().await;
        if !active.load(Ordering::SeqCst) {
            return;
        }
        if !target.request_fetch(origin).await {
            debug!("refresh target closed; scheduler exiting");
            return;
        }
        origin = FetchOrigin::Tick;
    }
}
