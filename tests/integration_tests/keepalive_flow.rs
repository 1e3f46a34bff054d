// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::Result;
use ct_orchestrator::runtime::keepalive::{Schedule, run_keepalive};
use tokio_util::sync::CancellationToken;

fn counting(
    counter: &Arc<AtomicUsize>,
) -> impl Fn() -> std::pin::Pin<Box<dyn Future<Output = Result<()>> + Send>> + use<> {
    let counter = Arc::clone(counter);
    move || {
        let counter = Arc::clone(&counter);
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

#[tokio::test]
async fn test_disabled_schedule_never_runs() {
    let counter = Arc::new(AtomicUsize::new(0));

    run_keepalive(
        "disabled",
        Schedule::Disabled,
        CancellationToken::new(),
        Arc::new(AtomicBool::new(true)),
        None,
        counting(&counter),
    )
    .await;

    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_once_schedule_runs_exactly_once() {
    let counter = Arc::new(AtomicUsize::new(0));

    run_keepalive(
        "once",
        Schedule::Once,
        CancellationToken::new(),
        Arc::new(AtomicBool::new(true)),
        None,
        counting(&counter),
    )
    .await;

    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_periodic_schedule_stops_on_cancel() -> Result<()> {
    let counter = Arc::new(AtomicUsize::new(0));
    let cancel = CancellationToken::new();

    let handle = tokio::spawn(run_keepalive(
        "periodic",
        Schedule::Every(Duration::from_millis(5)),
        cancel.clone(),
        Arc::new(AtomicBool::new(true)),
        None,
        counting(&counter),
    ));

    tokio::time::sleep(Duration::from_millis(60)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle).await??;

    let runs = counter.load(Ordering::SeqCst);
    assert!(runs >= 2, "expected repeated runs, got {runs}");

    // No further iterations after cancellation.
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(counter.load(Ordering::SeqCst), runs);
    Ok(())
}

#[tokio::test]
async fn test_running_flag_stops_loop() {
    let counter = Arc::new(AtomicUsize::new(0));

    // A stopped component never enters the loop body.
    run_keepalive(
        "stopped",
        Schedule::Every(Duration::from_millis(1)),
        CancellationToken::new(),
        Arc::new(AtomicBool::new(false)),
        None,
        counting(&counter),
    )
    .await;

    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_connect_guard_skips_iterations() {
    let counter = Arc::new(AtomicUsize::new(0));

    // Gated: the body is skipped but the schedule still paces.
    run_keepalive(
        "guarded",
        Schedule::Once,
        CancellationToken::new(),
        Arc::new(AtomicBool::new(true)),
        Some(Arc::new(AtomicBool::new(false))),
        counting(&counter),
    )
    .await;

    assert_eq!(counter.load(Ordering::SeqCst), 0);
}
