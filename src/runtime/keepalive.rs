// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use serde::Deserialize;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Raw per-task flag from configuration: a number of seconds between
/// iterations, `true` to run once, `false` to disable.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Toggle(bool),
    Seconds(f64),
}

/// Resolved scheduling for a keepalive task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Schedule {
    Disabled,
    Once,
    Every(Duration),
}

impl From<Option<FlagValue>> for Schedule {
    fn from(flag: Option<FlagValue>) -> Self {
        match flag {
            None | Some(FlagValue::Toggle(false)) => Schedule::Disabled,
            Some(FlagValue::Toggle(true)) => Schedule::Once,
            Some(FlagValue::Seconds(secs)) => {
                Schedule::Every(Duration::from_secs_f64(secs.max(0.0)))
            },
        }
    }
}

/// Runs `task` on the given schedule until the component stops or the process
/// shuts down.
///
/// When a `connected` gate is supplied, iterations are skipped (but still
/// paced) while the node is not healthy. A failed iteration is logged and
/// retried at the next tick; no retry state is kept.
pub async fn run_keepalive<F, Fut>(
    name: &'static str,
    schedule: Schedule,
    cancel: CancellationToken,
    running: Arc<AtomicBool>,
    connected: Option<Arc<AtomicBool>>,
    task: F,
) where
    F: Fn() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let delay = match schedule {
        Schedule::Disabled => {
            debug!(task = name, "feature not enabled, skipping");
            return;
        },
        Schedule::Once => None,
        Schedule::Every(delay) => Some(delay),
    };

    debug!(task = name, ?delay, "running method continuously");

    while running.load(Ordering::Relaxed) && !cancel.is_cancelled() {
        let gated = connected
            .as_ref()
            .is_some_and(|flag| !flag.load(Ordering::Relaxed));

        if gated {
            warn!(task = name, "node not connected, skipping");
        } else if let Err(err) = task().await {
            warn!(task = name, error = %err, "iteration failed");
        }

        match delay {
            None => break,
            Some(delay) => {
                // Skipped iterations pace at one second minimum so that a
                // zero-delay loop cannot spin while the node is down.
                let pause = if gated {
                    delay.max(Duration::from_secs(1))
                } else {
                    delay
                };
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(pause) => {},
                }
            },
        }
    }
}
