// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::HashSet,
    sync::{Arc, PoisonError},
};

use anyhow::Result;
use metrics::gauge;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    models::{
        address::Address,
        balance::Balance,
        channel::{Channel, ChannelGraph},
    },
    node::{Node, helper},
};

/// Peer addresses that are not yet the destination of a not-closed outgoing
/// channel. These are the channels the next tick will request.
pub fn addresses_without_channels(
    graph: &ChannelGraph,
    peers: &HashSet<Address>,
) -> Vec<Address> {
    let with_channel: HashSet<&Address> = graph
        .outgoing_not_closed()
        .iter()
        .map(|c| &c.destination)
        .collect();

    peers
        .iter()
        .filter(|address| !with_channel.contains(*address))
        .cloned()
        .collect()
}

impl Node {
    pub(crate) fn channel_graph(&self) -> Option<Arc<ChannelGraph>> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Pulls the full channel topology and swaps in a fresh snapshot.
    ///
    /// Replacing the snapshot is what invalidates every derived channel
    /// view; it happens in one synchronous assignment, before this task can
    /// suspend again.
    pub(crate) async fn retrieve_channels(&self) -> Result<()> {
        let Some(own) = self.address().cloned() else {
            warn!("no address known yet, skipping channel retrieval");
            return Ok(());
        };

        let response = self.api.channels().await?;
        let graph = Arc::new(ChannelGraph::new(response.all, &own));
        let topology = graph.balance_by_source();

        let (incoming, outgoing) = {
            let mut slot = self.channels.write().unwrap_or_else(PoisonError::into_inner);
            *slot = Some(Arc::clone(&graph));
            (graph.incoming().len(), graph.outgoing().len())
        };

        gauge!("ct_channels", "direction" => "incoming").set(incoming as f64);
        gauge!("ct_channels", "direction" => "outgoing").set(outgoing as f64);
        info!(incoming, outgoing, "scanned channels linked to the node");

        gauge!("ct_topology_size").set(topology.len() as f64);
        debug!(count = topology.len(), "fetched all topology links");
        self.topology.set(topology).await;

        Ok(())
    }

    /// Requests a channel towards every reachable peer that has none.
    pub(crate) async fn open_channels(&self) -> Result<()> {
        let Some(graph) = self.channel_graph() else {
            return Ok(());
        };

        let view = self.peer_view();
        let missing = addresses_without_channels(&graph, view.addresses());

        debug!(count = missing.len(), "starting opening of channels");

        for address in missing {
            self.tasks.spawn_detached(helper::open_channel(
                self.api.clone(),
                address,
                self.params.channel.funding_amount.clone(),
            ));
        }

        Ok(())
    }

    /// Tops up open outgoing channels that ran at or below the minimum.
    pub(crate) async fn fund_channels(&self) -> Result<()> {
        let Some(graph) = self.channel_graph() else {
            return Ok(());
        };

        let low_balances: Vec<Channel> = graph
            .outgoing_open()
            .iter()
            .filter(|c| c.balance <= self.params.channel.min_balance)
            .cloned()
            .collect();

        debug!(
            count = low_balances.len(),
            threshold = %self.params.channel.min_balance,
            "starting funding of channels where balance is too low"
        );

        let view = self.peer_view();
        for channel in low_balances {
            if view.addresses().contains(&channel.destination) {
                self.tasks.spawn_detached(helper::fund_channel(
                    self.api.clone(),
                    channel,
                    self.params.channel.funding_amount.clone(),
                ));
            }
        }

        Ok(())
    }

    /// Issues close on every outgoing channel stuck in `PendingToClose`.
    pub(crate) async fn close_pending_channels(&self) -> Result<()> {
        let Some(graph) = self.channel_graph() else {
            return Ok(());
        };

        let pending = graph.outgoing_pending();
        if !pending.is_empty() {
            debug!(count = pending.len(), "starting closure of pending channels");
        }

        for channel in pending {
            self.tasks.spawn_detached(helper::close_channel(
                self.api.clone(),
                channel.clone(),
                "pending_closed",
            ));
        }

        Ok(())
    }

    /// Cover traffic is outbound only; open incoming channels get closed.
    pub(crate) async fn close_incoming_channels(&self) -> Result<()> {
        let Some(graph) = self.channel_graph() else {
            return Ok(());
        };

        let incoming = graph.incoming_open();
        debug!(count = incoming.len(), "starting closure of incoming channels");

        for channel in incoming {
            self.tasks.spawn_detached(helper::close_channel(
                self.api.clone(),
                channel.clone(),
                "incoming_closed",
            ));
        }

        Ok(())
    }

    /// Closes open channels whose destination has been in the peer history
    /// longer than the configured age.
    pub(crate) async fn close_old_channels(&self) -> Result<()> {
        let Some(graph) = self.channel_graph() else {
            return Ok(());
        };

        let now = Instant::now();
        let max_age = self.params.channel.max_age_seconds;
        let mut to_close = Vec::new();

        for (address, channel) in graph.open_by_destination() {
            let first_seen = *self.peer_history.entry(address.clone()).or_insert(now);
            if now.duration_since(first_seen).as_secs() > max_age {
                to_close.push(channel.clone());
            }
        }

        debug!(
            count = to_close.len(),
            "starting closure of dangling channels open with peer visible for too long"
        );

        for channel in to_close {
            self.tasks.spawn_detached(helper::close_channel(
                self.api.clone(),
                channel,
                "old_closed",
            ));
        }

        Ok(())
    }

    /// Sums the funds locked in open outgoing channels.
    pub(crate) async fn get_total_channel_funds(&self) -> Result<()> {
        let Some(graph) = self.channel_graph() else {
            return Ok(());
        };

        let mut total = Balance::zero("wxHOPR");
        for channel in graph.outgoing_open() {
            if let Ok(sum) = total.add(&channel.balance) {
                total = sum;
            }
        }

        info!(amount = %total, "retrieved total amount stored in outgoing channels");
        gauge!("ct_channel_funds").set(total.as_f64());

        Ok(())
    }
}
