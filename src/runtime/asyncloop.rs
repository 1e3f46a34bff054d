// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    future::Future,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use anyhow::Result;
use tokio::{
    task::JoinHandle,
    time::{Instant, timeout},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Grace window granted to tracked tasks after cancellation before they are
/// aborted outright.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Owner of the orchestrator's tracked task set.
///
/// One instance is created in `main` and passed by reference to everything
/// that spawns work. Tracked tasks are expected to watch [`Self::cancelled`]
/// between awaits and exit cooperatively; detached tasks are short-lived
/// fire-and-forget operations whose handles nobody joins.
#[derive(Debug, Default)]
pub struct AsyncLoop {
    tasks: Mutex<Vec<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl AsyncLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token flipped once shutdown starts. Cloning is cheap.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawns a task and keeps its handle so that `gather` can drain it on
    /// shutdown.
    pub fn spawn<F>(&self, fut: F)
    where F: Future<Output = ()> + Send + 'static {
        let handle = tokio::spawn(fut);
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }

    /// Spawns a task nobody joins. Used for per-tick channel and session
    /// operations that are re-derived from reconciled state on the next tick.
    pub fn spawn_detached<F>(&self, fut: F)
    where F: Future<Output = ()> + Send + 'static {
        drop(tokio::spawn(fut));
    }

    /// Drives `process` to completion, waits for SIGINT/SIGTERM, cancels every
    /// tracked task and finally invokes `stop`. A startup failure still runs
    /// the shutdown sequence, then propagates.
    pub async fn run<Fut>(&self, process: Fut, stop: impl FnOnce()) -> Result<()>
    where Fut: Future<Output = Result<()>> {
        let result = match process.await {
            Ok(()) => {
                shutdown_signal().await;
                info!("shutdown signal received");
                Ok(())
            },
            Err(err) => {
                warn!(error = %err, "startup did not complete");
                Err(err)
            },
        };

        self.cancel.cancel();
        stop();
        self.gather().await;

        result
    }

    /// Awaits every tracked task, aborting stragglers after a grace window.
    pub async fn gather(&self) {
        let handles = std::mem::take(
            &mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner),
        );

        let deadline = Instant::now() + DRAIN_TIMEOUT;
        for mut handle in handles {
            let left = deadline.saturating_duration_since(Instant::now());
            if timeout(left, &mut handle).await.is_err() {
                warn!("task did not stop within the drain window, aborting");
                handle.abort();
            }
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            },
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
