// MIT License - Copyright (c) 2026 Peter Wright

//! Periodic status polling.
//!
//! A single task fetches a snapshot through the executor every few seconds
//! and hands it to registered observers. A failed poll is logged and
//! skipped; observers simply keep their last published state. Observers are
//! expected to be idempotent: they compare the incoming value with whatever
//! they published last and only act on change.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::executor::CommandExecutor;
use crate::status::Status;

/// Default tick period.
pub const POLL_PERIOD: Duration = Duration::from_secs(3);

/// Callback driven with every fresh snapshot.
pub type Observer = Box<dyn Fn(Arc<Status>) -> BoxFuture<'static, ()> + Send + Sync>;

pub struct StatusPoller {
    executor: Arc<CommandExecutor>,
    period: Duration,
    observers: Vec<Observer>,
}

impl StatusPoller {
    pub fn new(executor: Arc<CommandExecutor>) -> Self {
        Self::with_period(executor, POLL_PERIOD)
    }

    pub fn with_period(executor: Arc<CommandExecutor>, period: Duration) -> Self {
        Self {
            executor,
            period,
            observers: Vec::new(),
        }
    }

    /// Register an observer for future snapshots.
    pub fn observe<F>(&mut self, observer: F)
    where
        F: Fn(Arc<Status>) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Poll until the shutdown channel flips to `true` (or closes).
    ///
    /// The loop only observes cancellation at tick boundaries; an in-flight
    /// command finishes before the task returns.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.executor.status().await {
                        Ok(status) => {
                            let status = Arc::new(status);
                            for observer in &self.observers {
                                observer(status.clone()).await;
                            }
                        }
                        Err(err) => warn!("could not get status: {err}"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("status poller stopping");
                        return;
                    }
                }
            }
        }
    }
}
