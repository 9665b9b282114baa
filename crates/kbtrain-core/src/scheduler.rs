//! Cancellable scheduled tasks.
//!
//! Debounced refreshes and training progress ticks run as [`ScheduledTask`]s
//! owned by the component that started them. Cancelling (or dropping) the
//! handle stops the task before its next step; nothing keeps running after
//! its owner is gone.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to a spawned task that stops when cancelled or dropped.
#[derive(Debug)]
pub struct ScheduledTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Runs `f` once after `delay`, unless cancelled first.
    pub fn after<F, Fut>(delay: Duration, parent: &CancellationToken, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = parent.child_token();
        let guard = token.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = guard.cancelled() => {}
                _ = async {
                    tokio::time::sleep(delay).await;
                    f().await;
                } => {}
            }
        });
        Self { token, handle }
    }

    /// Runs `f` every `period` (first run after one period) until cancelled
    /// or until `f` returns false.
    pub fn every<F, Fut>(period: Duration, parent: &CancellationToken, mut f: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let token = parent.child_token();
        let guard = token.clone();
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                tokio::select! {
                    _ = guard.cancelled() => break,
                    _ = interval.tick() => {
                        if !f().await {
                            break;
                        }
                    }
                }
            }
        });
        Self { token, handle }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Collapses bursts of triggers into one delayed run.
///
/// Each [`Debouncer::trigger`] cancels the pending run and schedules a new
/// one `delay` from now, so only the last trigger in a quiet window fires.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    parent: CancellationToken,
    pending: Mutex<Option<ScheduledTask>>,
}

impl Debouncer {
    pub fn new(delay: Duration, parent: CancellationToken) -> Self {
        Self {
            delay,
            parent,
            pending: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Restarts the timer with `f` as the action to run when it expires.
    pub fn trigger<F, Fut>(&self, f: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.parent.is_cancelled() {
            tracing::debug!("Debouncer torn down, ignoring trigger");
            return;
        }
        let task = ScheduledTask::after(self.delay, &self.parent, f);
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        // Dropping the previous task cancels it.
        *pending = Some(task);
    }

    /// True while a scheduled run has neither fired nor been cancelled.
    pub fn is_pending(&self) -> bool {
        let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending
            .as_ref()
            .is_some_and(|t| !t.is_cancelled() && !t.is_finished())
    }

    /// Cancels the pending run, if any.
    pub fn cancel(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.take();
    }
}
