// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::HashSet,
    sync::{Arc, PoisonError},
};

use anyhow::Result;
use metrics::gauge;
use tracing::{info, warn};

use crate::{
    economics::{
        self,
        sigmoid::SigmoidInputs,
    },
    models::{address::Address, peer::Peer},
    node::Node,
};

impl Node {
    /// Fuses topology, registry, allocation and reward data into a yearly
    /// message budget per peer.
    ///
    /// Peers failing the eligibility filter lose their budget entirely; the
    /// rest get the sum of every configured model's count, each split across
    /// the fleet destinations.
    pub(crate) async fn apply_economic_model(&self) -> Result<()> {
        let topology = self.topology.get().await;
        let registered = self.registered_nodes.get().await;
        let peers: Vec<Arc<Peer>> = self
            .peers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        if topology.is_empty() || registered.is_empty() || peers.is_empty() {
            warn!("not enough data to apply economic model");
            return Ok(());
        }

        let ticket_price = self
            .ticket_price
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|price| price.as_f64());
        let Some(ticket_price) = ticket_price.filter(|price| *price > 0.0) else {
            warn!("no ticket price known, cannot apply economic model");
            return Ok(());
        };

        let mut allocations = self.allocations.get().await;
        let mut eoa_balances = self.eoa_balances.get().await;

        economics::associate_entities_to_safes(&mut allocations, &registered);
        economics::associate_entities_to_safes(&mut eoa_balances, &registered);
        let additional =
            economics::additional_safe_balances(&allocations, &eoa_balances, &registered);
        economics::merge_into_peers(&peers, &registered, &additional, &topology);
        economics::allow_many_nodes_per_safe(&peers);

        let nft_holders = self
            .nft_holders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let fleet: HashSet<Address> = self.session_destinations.iter().cloned().collect();
        let model_params = &self.params.economic_model;
        let min_stake = model_params
            .legacy
            .as_ref()
            .map(|legacy| legacy.coefficients.l)
            .unwrap_or(0.0);

        for peer in &peers {
            if peer.yearly_message_count().is_some()
                && !peer.is_eligible(
                    model_params.min_safe_allowance,
                    min_stake,
                    &nft_holders,
                    model_params.nft_threshold,
                    &fleet,
                )
            {
                peer.set_yearly_message_count(None);
            }
        }

        let eligible: Vec<&Arc<Peer>> = peers
            .iter()
            .filter(|peer| peer.yearly_message_count().is_some())
            .collect();

        let sigmoid_inputs = model_params.sigmoid.as_ref().map(|sigmoid| SigmoidInputs {
            economic_security: eligible
                .iter()
                .filter_map(|peer| peer.split_stake())
                .sum::<f64>()
                / sigmoid.total_token_supply,
            network_capacity: eligible.len() as f64 / sigmoid.network_capacity as f64,
        });

        let rewards = self.peers_rewards.get().await;
        let share = (self.session_destinations.len() + 1) as f64;

        for peer in &eligible {
            let Some(stake) = peer.split_stake() else {
                peer.set_yearly_message_count(None);
                continue;
            };

            let mut total = 0.0;

            if let Some(legacy) = &model_params.legacy {
                let redeemed = rewards
                    .get(&peer.address)
                    .map(|balance| balance.as_f64())
                    .unwrap_or(0.0);
                let count = legacy.yearly_message_count(stake, ticket_price, redeemed) / share;
                gauge!("ct_message_count", "address" => peer.address.to_string(), "model" => "legacy")
                    .set(count);
                total += count;
            }

            if let (Some(sigmoid), Some(inputs)) = (&model_params.sigmoid, sigmoid_inputs) {
                let count = sigmoid.yearly_message_count(stake, ticket_price, inputs) / share;
                gauge!("ct_message_count", "address" => peer.address.to_string(), "model" => "sigmoid")
                    .set(count);
                total += count;
            }

            peer.set_yearly_message_count(Some(total));
        }

        let eligible_count = peers
            .iter()
            .filter(|peer| peer.yearly_message_count().is_some())
            .count();
        let expected_rate: f64 = peers
            .iter()
            .filter_map(|peer| peer.message_delay())
            .map(|delay| 1.0 / delay)
            .sum();

        info!(
            count = eligible_count,
            expected_rate, "generated the eligible nodes set"
        );
        gauge!("ct_eligible_peers").set(eligible_count as f64);

        Ok(())
    }
}
