// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use ct_orchestrator::{
    models::{
        address::Address,
        peer::{EmissionSettings, Peer, SECONDS_IN_A_NON_LEAP_YEAR},
    },
    runtime::{asyncloop::AsyncLoop, keepalive::Schedule, message_queue::MessageQueue},
};

fn settings() -> EmissionSettings {
    EmissionSettings {
        schedule: Schedule::Every(Duration::ZERO),
        sleep_mean_time: 0.01,
        sleep_std_time: 0.0,
    }
}

/// An eligible peer emits descriptors naming itself as relayer, paced by its
/// message delay.
#[tokio::test]
async fn test_eligible_peer_emits_messages() -> Result<()> {
    let tasks = AsyncLoop::new();
    let queue = Arc::new(MessageQueue::new(1));
    let peer = Arc::new(Peer::new(Address::new("0xaa"), None));

    // 20ms between messages.
    peer.set_yearly_message_count(Some(SECONDS_IN_A_NON_LEAP_YEAR / 0.02));
    peer.start_emission(&tasks, Arc::clone(&queue), settings());
    assert!(peer.is_running());

    for _ in 0..3 {
        let message = tokio::time::timeout(Duration::from_secs(2), queue.get(0))
            .await?
            .expect("queue open");
        assert_eq!(message.relayer, Address::new("0xaa"));
    }

    peer.stop_emission();
    Ok(())
}

/// An ineligible peer sleeps instead of emitting.
#[tokio::test]
async fn test_ineligible_peer_stays_silent() -> Result<()> {
    let tasks = AsyncLoop::new();
    let queue = Arc::new(MessageQueue::new(1));
    let peer = Arc::new(Peer::new(Address::new("0xbb"), None));

    peer.set_yearly_message_count(None);
    peer.start_emission(&tasks, Arc::clone(&queue), settings());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(queue.size(0), 0);

    peer.stop_emission();
    Ok(())
}

/// Starting twice keeps a single task; stopping flips the running flag and
/// the loop exits at its next iteration boundary.
#[tokio::test]
async fn test_start_is_idempotent_and_stop_works() -> Result<()> {
    let tasks = AsyncLoop::new();
    let queue = Arc::new(MessageQueue::new(1));
    let peer = Arc::new(Peer::new(Address::new("0xcc"), None));

    peer.set_yearly_message_count(Some(SECONDS_IN_A_NON_LEAP_YEAR / 0.01));
    peer.start_emission(&tasks, Arc::clone(&queue), settings());
    peer.start_emission(&tasks, Arc::clone(&queue), settings());
    assert!(peer.is_running());

    peer.stop_emission();
    assert!(!peer.is_running());

    // Drain whatever was emitted before the stop, then confirm silence.
    tokio::time::sleep(Duration::from_millis(50)).await;
    while queue.size(0) > 0 {
        let _ = queue.get(0).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(queue.size(0), 0);
    Ok(())
}

/// A disabled emission flag never starts the task at all.
#[tokio::test]
async fn test_disabled_flag_prevents_emission() -> Result<()> {
    let tasks = AsyncLoop::new();
    let queue = Arc::new(MessageQueue::new(1));
    let peer = Arc::new(Peer::new(Address::new("0xdd"), None));

    peer.set_yearly_message_count(Some(SECONDS_IN_A_NON_LEAP_YEAR));
    peer.start_emission(
        &tasks,
        Arc::clone(&queue),
        EmissionSettings {
            schedule: Schedule::Disabled,
            sleep_mean_time: 0.01,
            sleep_std_time: 0.0,
        },
    );

    assert!(!peer.is_running());
    Ok(())
}
