// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::HashMap,
    sync::Arc,
};

use anyhow::Result;
use metrics::gauge;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::{
    models::{
        address::Address,
        peer::{EmissionSettings, Peer},
    },
    node::Node,
};

impl Node {
    /// Reconciles the peer set against the node's connected-peer list.
    ///
    /// Newly seen peers get a zero message budget and a running emission
    /// task; vanished peers lose their budget and their task stops at its
    /// next iteration. The cached peer view is rebuilt in the same
    /// synchronous region as the set mutations.
    pub(crate) async fn retrieve_peers(&self) -> Result<()> {
        let connected = self.api.peers(self.params.peer.quality).await?;
        if connected.is_empty() {
            warn!("no results while retrieving peers");
            return Ok(());
        }

        let visible: HashMap<Address, Option<String>> = connected
            .into_iter()
            .map(|peer| (peer.address, peer.version))
            .collect();

        let now = Instant::now();
        for address in visible.keys() {
            // first-seen timestamps only; later sightings do not refresh
            self.peer_history.entry(address.clone()).or_insert(now);
        }

        let settings = EmissionSettings {
            schedule: self.params.flags.peer.message_relay_request.into(),
            sleep_mean_time: self.params.peer.sleep_mean_time,
            sleep_std_time: self.params.peer.sleep_std_time,
        };

        let (mut new, mut known, mut unreachable) = (0usize, 0usize, 0usize);

        for entry in self.peers.iter() {
            let peer = entry.value();
            if visible.contains_key(&peer.address) {
                if peer.yearly_message_count().is_none() {
                    peer.set_yearly_message_count(Some(0.0));
                    peer.start_emission(&self.tasks, Arc::clone(&self.queue), settings.clone());
                }
                known += 1;
            } else {
                peer.set_yearly_message_count(None);
                peer.stop_emission();
                unreachable += 1;
            }
        }

        for (address, version) in &visible {
            if !self.peers.contains_key(address) {
                let peer = Arc::new(Peer::new(address.clone(), version.as_deref()));
                peer.set_yearly_message_count(Some(0.0));
                peer.start_emission(&self.tasks, Arc::clone(&self.queue), settings.clone());
                self.peers.insert(address.clone(), peer);
                new += 1;
            }
        }

        self.store_peer_view(visible.into_keys().collect());

        info!(new, known, unreachable, "retrieved visible peers");

        if let Some(own) = self.address() {
            gauge!("ct_peers_count", "address" => own.to_string()).set(self.peers.len() as f64);
        }
        gauge!("ct_unique_peers", "type" => "new").set(new as f64);
        gauge!("ct_unique_peers", "type" => "known").set(known as f64);
        gauge!("ct_unique_peers", "type" => "unreachable").set(unreachable as f64);

        Ok(())
    }
}
