// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use metrics::gauge;
use rand_distr::{Distribution, Normal};
use semver::Version;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    models::{address::Address, balance::Balance, message::MessageFormat},
    runtime::{asyncloop::AsyncLoop, keepalive::Schedule, message_queue::MessageQueue},
    subgraph::entries::Safe,
};

pub const SECONDS_IN_A_NON_LEAP_YEAR: f64 = 365.0 * 24.0 * 60.0 * 60.0;

/// Economic attributes attached to a peer by the periodic pulls. Written by
/// the peers sweep and the economic engine, read by the emission task.
#[derive(Debug, Default)]
struct PeerEconomics {
    safe: Option<Safe>,
    safe_address_count: usize,
    channel_balance: Option<Balance>,
    yearly_message_count: Option<f64>,
}

/// Pacing parameters handed to a peer when its emission task starts.
#[derive(Debug, Clone)]
pub struct EmissionSettings {
    pub schedule: Schedule,
    pub sleep_mean_time: f64,
    pub sleep_std_time: f64,
}

/// A remote peer of the overlay, shared between the node's peer set and its
/// own message-emission task.
///
/// While `yearly_message_count` is unset the peer is ineligible and the
/// emission task idles on the Normal-distributed sleep instead of producing
/// messages.
#[derive(Debug)]
pub struct Peer {
    pub address: Address,
    pub version: Version,
    economics: Mutex<PeerEconomics>,
    running: AtomicBool,
}

impl Peer {
    pub fn new(address: Address, version: Option<&str>) -> Self {
        let version = version
            .and_then(|raw| Version::parse(raw.trim_start_matches('v')).ok())
            .unwrap_or_else(|| Version::new(0, 0, 0));

        Self {
            address,
            version,
            economics: Mutex::new(PeerEconomics::default()),
            running: AtomicBool::new(false),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, PeerEconomics> {
        self.economics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn yearly_message_count(&self) -> Option<f64> {
        self.state().yearly_message_count
    }

    pub fn set_yearly_message_count(&self, count: Option<f64>) {
        self.state().yearly_message_count = count;
        gauge!("ct_peer_delay", "peer" => self.address.to_string())
            .set(self.message_delay().unwrap_or(0.0));
    }

    pub fn safe(&self) -> Option<Safe> {
        self.state().safe.clone()
    }

    pub fn attach_safe(&self, safe: Safe) {
        self.state().safe = Some(safe);
    }

    pub fn safe_address_count(&self) -> usize {
        self.state().safe_address_count.max(1)
    }

    pub fn set_safe_address_count(&self, count: usize) {
        self.state().safe_address_count = count;
    }

    pub fn channel_balance(&self) -> Option<Balance> {
        self.state().channel_balance.clone()
    }

    pub fn set_channel_balance(&self, balance: Option<Balance>) {
        self.state().channel_balance = balance;
    }

    /// Seconds between two messages relayed through this peer, or `None`
    /// while the peer is ineligible.
    pub fn message_delay(&self) -> Option<f64> {
        match self.state().yearly_message_count {
            Some(count) if count > 0.0 => Some(SECONDS_IN_A_NON_LEAP_YEAR / count),
            _ => None,
        }
    }

    /// Stake share backing this peer: the safe's total balance split across
    /// all nodes linked to the safe, plus the peer's own channel balance.
    pub fn split_stake(&self) -> Option<f64> {
        let state = self.state();
        let safe = state.safe.as_ref()?;
        let channel_balance = state.channel_balance.as_ref()?;
        let count = state.safe_address_count.max(1);

        Some(safe.total_balance().as_f64() / count as f64 + channel_balance.as_f64())
    }

    /// Economic eligibility filter, applied before any model evaluation.
    pub fn is_eligible(
        &self,
        min_allowance: f64,
        min_stake: f64,
        nft_holders: &HashSet<Address>,
        nft_threshold: Option<f64>,
        fleet_addresses: &HashSet<Address>,
    ) -> bool {
        let Some(safe) = self.safe() else {
            return false;
        };
        let Some(split_stake) = self.split_stake() else {
            return false;
        };

        if safe.allowance.as_f64() < min_allowance {
            return false;
        }
        if fleet_addresses.contains(&self.address) {
            return false;
        }
        if let Some(threshold) = nft_threshold
            && !nft_holders.contains(&safe.address)
            && split_stake < threshold
        {
            return false;
        }
        if split_stake < min_stake {
            return false;
        }

        true
    }

    /// Starts the message-relay-request task. Idempotent: a second call while
    /// the task is alive is a no-op.
    pub fn start_emission(
        self: &Arc<Self>,
        tasks: &AsyncLoop,
        queue: Arc<MessageQueue>,
        settings: EmissionSettings,
    ) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        if settings.schedule == Schedule::Disabled {
            debug!(peer = %self.address, "emission disabled by flag");
            self.running.store(false, Ordering::SeqCst);
            return;
        }

        let peer = Arc::clone(self);
        let cancel = tasks.cancel_token();
        tasks.spawn(async move {
            peer.message_relay_request(queue, settings, cancel).await;
        });
    }

    /// Stops the emission task at its next iteration boundary.
    pub fn stop_emission(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    async fn message_relay_request(
        self: Arc<Self>,
        queue: Arc<MessageQueue>,
        settings: EmissionSettings,
        cancel: CancellationToken,
    ) {
        debug!(peer = %self.address, "starting message emission");

        while self.is_running() && !cancel.is_cancelled() {
            let pause = match self.message_delay() {
                Some(delay) => {
                    let message = MessageFormat::new(self.address.clone());
                    if let Err(err) = queue.put(message, None).await {
                        warn!(peer = %self.address, error = %err, "failed to enqueue message");
                        break;
                    }
                    delay
                },
                None => idle_sleep(settings.sleep_mean_time, settings.sleep_std_time),
            };

            if matches!(settings.schedule, Schedule::Once) {
                break;
            }

            // A vanishingly small budget would produce a sleep beyond what
            // Duration can represent; one year is already "never".
            let pause = Duration::from_secs_f64(pause.min(SECONDS_IN_A_NON_LEAP_YEAR));
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(pause) => {},
            }
        }

        debug!(peer = %self.address, "message emission stopped");
    }
}

/// Normal-distributed idle sleep, clamped at zero.
fn idle_sleep(mean: f64, std: f64) -> f64 {
    Normal::new(mean, std)
        .map(|normal| normal.sample(&mut rand::rng()).max(0.0))
        .unwrap_or(mean.max(0.0))
}

impl PartialEq for Peer {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Peer {}
