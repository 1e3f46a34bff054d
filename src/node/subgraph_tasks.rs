// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use metrics::gauge;
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    models::{address::Address, balance::Balance},
    node::{Node, SubgraphProviders},
    subgraph::{
        entries::{Account, RegisteredNode},
        provider::GraphProvider,
    },
};

impl Node {
    /// One provider per subgraph type, built once at startup.
    pub(crate) fn build_providers(&self) -> Result<()> {
        let sg = &self.params.subgraph;

        let providers = SubgraphProviders {
            safes: GraphProvider::safes(sg.user_id, &sg.api_key, &sg.safes_balance)?,
            rewards: GraphProvider::rewards(sg.user_id, &sg.api_key, &sg.rewards)?,
        };

        self.providers
            .set(providers)
            .map_err(|_| anyhow!("subgraph providers already built"))
    }

    fn subgraph_providers(&self) -> Result<&SubgraphProviders> {
        self.providers
            .get()
            .context("subgraph providers not built")
    }

    /// Probes the endpoints and re-selects the working mode for each
    /// provider.
    pub(crate) async fn rotate_subgraphs(&self) -> Result<()> {
        info!("rotating subgraphs");
        let providers = self.subgraph_providers()?;
        providers.safes.rotate(&self.params.subgraph.mode).await;
        providers.rewards.rotate(&self.params.subgraph.mode).await;
        Ok(())
    }

    /// Redeemed reward value per account, feeding the legacy model's
    /// coefficient shift.
    pub(crate) async fn peers_rewards(&self) -> Result<()> {
        let provider = &self.subgraph_providers()?.rewards;

        let mut results: HashMap<Address, Balance> = HashMap::new();
        for value in provider.fetch().await {
            let Some(account) = Account::from_value(&value) else {
                continue;
            };
            gauge!("ct_redeemed_rewards", "address" => account.address.to_string())
                .set(account.redeemed_value.as_f64());
            results.insert(account.address, account.redeemed_value);
        }

        debug!(count = results.len(), "fetched peers rewards amounts");
        self.peers_rewards.set(results).await;
        Ok(())
    }

    /// All nodes registered in the safe registry, with their safes.
    pub(crate) async fn registered_nodes(&self) -> Result<()> {
        let provider = &self.subgraph_providers()?.safes;

        let mut results: Vec<RegisteredNode> = Vec::new();
        for safe_value in provider.fetch().await {
            if let Some(nodes) = safe_value
                .get("registeredNodesInSafeRegistry")
                .and_then(Value::as_array)
            {
                results.extend(nodes.iter().filter_map(RegisteredNode::from_value));
            }
        }

        for node in &results {
            let safe = node.safe.address.to_string();
            gauge!("ct_peer_stake", "safe" => safe.clone(), "type" => "balance")
                .set(node.safe.balance.as_f64());
            gauge!("ct_peer_stake", "safe" => safe, "type" => "allowance")
                .set(node.safe.allowance.as_f64());
        }

        debug!(count = results.len(), "fetched registered nodes in the safe registry");
        gauge!("ct_subgraph_size").set(results.len() as f64);
        self.registered_nodes.set(results).await;
        Ok(())
    }
}
