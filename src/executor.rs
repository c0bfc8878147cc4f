// MIT License - Copyright (c) 2026 Peter Wright

//! Serialized, retried execution of panel commands.
//!
//! The central corrupts its session state when two dialogues interleave, so
//! a process-wide mutex guarantees at most one outstanding command. Every
//! attempt runs on a fresh TCP session; transient faults are retried with
//! exponential backoff until the elapsed-time limit is hit.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::error::Result;
use crate::metrics;
use crate::session::{Command, ConnectOptions, Session};
use crate::status::Status;

/// Exponential backoff schedule for transient command failures.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    pub max_elapsed: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            multiplier: 1.5,
            max_interval: Duration::from_secs(5),
            max_elapsed: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (0-based), capped at the
    /// maximum interval.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(64) as i32);
        self.initial.mul_f64(factor).min(self.max_interval)
    }
}

/// The single gateway every panel command goes through.
pub struct CommandExecutor {
    options: ConnectOptions,
    policy: BackoffPolicy,
    lock: Mutex<()>,
}

impl CommandExecutor {
    pub fn new(options: ConnectOptions) -> Self {
        Self::with_policy(options, BackoffPolicy::default())
    }

    pub fn with_policy(options: ConnectOptions, policy: BackoffPolicy) -> Self {
        Self {
            options,
            policy,
            lock: Mutex::new(()),
        }
    }

    /// Run a command to completion, retrying transient faults.
    pub async fn execute(&self, command: Command) -> Result<()> {
        let _guard = self.acquire().await;
        let name = command.name();
        self.retry(name, || async {
            let mut session = Session::open(&self.options).await?;
            let outcome = session.run(&command).await;
            session.close().await;
            outcome
        })
        .await
    }

    /// Fetch a status snapshot, retrying transient faults.
    pub async fn status(&self) -> Result<Status> {
        let _guard = self.acquire().await;
        self.retry("status", || async {
            let mut session = Session::open(&self.options).await?;
            let outcome = session.status().await;
            session.close().await;
            outcome
        })
        .await
    }

    async fn acquire(&self) -> tokio::sync::MutexGuard<'_, ()> {
        let waited = Instant::now();
        let guard = self.lock.lock().await;
        debug!("panel lock acquired after {:?}", waited.elapsed());
        guard
    }

    async fn retry<T, Op, Fut>(&self, name: &str, op: Op) -> Result<T>
    where
        Op: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let mut attempt: u32 = 0;
        loop {
            metrics::REQUESTS.inc();
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    metrics::REQUEST_ERRORS.inc();
                    if !err.is_transient() {
                        warn!("{name} failed permanently: {err}");
                        return Err(err);
                    }
                    let delay = self.policy.delay(attempt);
                    if started.elapsed() + delay >= self.policy.max_elapsed {
                        warn!("{name} failed after {attempt} retries: {err}");
                        return Err(err);
                    }
                    debug!("{name} attempt {attempt} failed ({err}), retrying in {delay:?}");
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_millis(500));
        assert_eq!(policy.delay(1), Duration::from_millis(750));
        assert_eq!(policy.delay(2), Duration::from_millis(1125));
        // Capped at the maximum interval from attempt 6 on.
        assert_eq!(policy.delay(6), Duration::from_secs(5));
        assert_eq!(policy.delay(40), Duration::from_secs(5));
    }
}
