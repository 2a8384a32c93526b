// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fire-and-forget side effects decoupled from the reply path.
//!
//! Every task runs behind its own error boundary: failures are logged at
//! `warn` and never reach the customer-facing flow. Shutdown closes the
//! tracker and waits for in-flight tasks up to a deadline.

use std::future::Future;
use std::time::Duration;

use switchboard_core::SwitchboardError;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

#[derive(Clone, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `task`, logging its error under `name`.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), SwitchboardError>> + Send + 'static,
    {
        if self.tracker.is_closed() {
            debug!(task = name, "shutting down, background task dropped");
            return;
        }
        self.tracker.spawn(async move {
            if let Err(e) = task.await {
                warn!(task = name, error = %e, "background task failed");
            }
        });
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Waits for everything spawned so far, then accepts work again.
    /// Meant for one-shot commands and tests; spawns racing with it are dropped.
    pub async fn settle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Stops accepting tasks and waits up to `timeout` for running ones.
    /// Returns whether everything finished.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending == 0 {
            info!("no background tasks to drain");
            return true;
        }
        info!(count = pending, "waiting for background tasks");
        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => {
                info!("background tasks drained");
                true
            }
            Err(_) => {
                warn!(remaining = self.tracker.len(), "drain timed out, abandoning background tasks");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn failures_are_contained() {
        let tasks = BackgroundTasks::new();
        let done = Arc::new(AtomicUsize::new(0));
        let d = done.clone();
        tasks.spawn("fails", async { Err(SwitchboardError::Internal("boom".into())) });
        tasks.spawn("succeeds", async move {
            d.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        tasks.settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(tasks.in_flight(), 0);
    }

    #[tokio::test]
    async fn drain_times_out_and_rejects_new_work() {
        let tasks = BackgroundTasks::new();
        tasks.spawn("slow", async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        });
        assert!(!tasks.drain(Duration::from_millis(20)).await);

        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        tasks.spawn("late", async move {
            r.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        tokio::task::yield_now().await;
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
