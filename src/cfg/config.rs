// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::{
    economics::{legacy::LegacyParams, sigmoid::SigmoidParams},
    models::{address::Address, balance::Balance},
    runtime::keepalive::FlagValue,
};

/// Runtime parameters of the orchestrator, loaded from a single YAML file.
#[derive(Deserialize, Debug, Clone)]
pub struct Parameters {
    /// Deployment label, used for logging only.
    pub environment: String,
    /// Per-task scheduling flags.
    pub flags: FlagParams,
    /// Economic model knobs (eligibility thresholds and model coefficients).
    pub economic_model: EconomicModelParams,
    /// Emission pacing for ineligible peers plus the peer quality threshold.
    pub peer: PeerParams,
    /// Channel funding and lifecycle thresholds.
    pub channel: ChannelParams,
    /// Fleet destination addresses for session traffic.
    #[serde(default)]
    pub sessions: SessionsParams,
    /// Investor addresses and vesting schedule queried over RPC.
    pub investors: InvestorsParams,
    /// Path to the newline-delimited NFT holder list.
    pub nft_holders: NftHoldersParams,
    /// JSON-RPC endpoints.
    pub rpc: RpcParams,
    /// Subgraph endpoints and credentials.
    pub subgraph: SubgraphParams,
}

#[derive(Deserialize, Debug, Clone)]
pub struct FlagParams {
    pub node: NodeFlagParams,
    pub peer: PeerFlagParams,
}

/// One optional flag per keepalive task: seconds between runs, `true` for a
/// single run, `false` or absent to disable.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct NodeFlagParams {
    pub healthcheck: Option<FlagValue>,
    pub retrieve_peers: Option<FlagValue>,
    pub retrieve_channels: Option<FlagValue>,
    pub retrieve_balances: Option<FlagValue>,
    pub ticket_parameters: Option<FlagValue>,

    pub open_channels: Option<FlagValue>,
    pub fund_channels: Option<FlagValue>,
    pub close_old_channels: Option<FlagValue>,
    pub close_pending_channels: Option<FlagValue>,
    pub close_incoming_channels: Option<FlagValue>,
    pub get_total_channel_funds: Option<FlagValue>,

    pub observe_message_queue: Option<FlagValue>,
    pub maintain_sessions: Option<FlagValue>,

    pub rotate_subgraphs: Option<FlagValue>,
    pub peers_rewards: Option<FlagValue>,
    pub registered_nodes: Option<FlagValue>,
    pub allocations: Option<FlagValue>,
    pub eoa_balances: Option<FlagValue>,

    pub apply_economic_model: Option<FlagValue>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct PeerFlagParams {
    pub message_relay_request: Option<FlagValue>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct EconomicModelParams {
    pub min_safe_allowance: f64,
    #[serde(default)]
    pub nft_threshold: Option<f64>,
    #[serde(default)]
    pub legacy: Option<LegacyParams>,
    #[serde(default)]
    pub sigmoid: Option<SigmoidParams>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PeerParams {
    /// Mean idle sleep (seconds) for peers without a message budget.
    pub sleep_mean_time: f64,
    /// Standard deviation of the idle sleep.
    pub sleep_std_time: f64,
    /// Minimum connection quality for a peer to count as reachable.
    #[serde(default = "default_quality")]
    pub quality: f64,
}

fn default_quality() -> f64 {
    0.5
}

#[derive(Deserialize, Debug, Clone)]
pub struct ChannelParams {
    /// Channels at or below this balance get topped up.
    pub min_balance: Balance,
    /// Amount used for both opening and funding channels.
    pub funding_amount: Balance,
    /// Open channels to peers seen for longer than this get closed.
    pub max_age_seconds: u64,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SessionsParams {
    pub blue_destinations: Vec<Address>,
    pub green_destinations: Vec<Address>,
}

impl SessionsParams {
    /// Union of both destination pools; also serves as the own-fleet
    /// exclusion list for eligibility.
    pub fn destinations(&self) -> Vec<Address> {
        let mut all = self.blue_destinations.clone();
        all.extend(self.green_destinations.iter().cloned());
        all.sort();
        all.dedup();
        all
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct InvestorsParams {
    pub addresses: Vec<Address>,
    pub schedule: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NftHoldersParams {
    pub filepath: PathBuf,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RpcParams {
    pub gnosis: String,
    pub mainnet: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SubgraphParams {
    /// Endpoint selection: `default`, `backup` or `auto`.
    #[serde(rename = "type")]
    pub mode: String,
    pub user_id: u64,
    /// Gateway deployer key; overridable via `SUBGRAPH_API_KEY`.
    #[serde(default)]
    pub api_key: String,
    pub safes_balance: SubgraphEndpointParams,
    pub rewards: SubgraphEndpointParams,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SubgraphEndpointParams {
    pub query_id: String,
    pub slug: String,
    #[serde(default)]
    pub version: Option<String>,
    /// Extra GraphQL variables merged into every query.
    #[serde(default)]
    pub inputs: serde_json::Map<String, serde_json::Value>,
}

impl Parameters {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value. A failure here is fatal by design.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {:?}", path.as_ref()))?;
        Self::load_from_str(&s)
    }

    pub fn load_from_str(s: &str) -> Result<Self> {
        let mut params: Parameters =
            serde_yaml::from_str(s).context("failed to parse config YAML")?;
        params.validate_and_normalize()?;
        Ok(params)
    }

    /// Validates invariants and applies environment overrides.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        if let Ok(key) = std::env::var("SUBGRAPH_API_KEY")
            && !key.is_empty()
        {
            self.subgraph.api_key = key;
        }

        ensure!(!self.rpc.gnosis.is_empty(), "rpc.gnosis must not be empty");
        ensure!(
            !self.rpc.mainnet.is_empty(),
            "rpc.mainnet must not be empty"
        );
        ensure!(
            self.channel.funding_amount.value() > rust_decimal::Decimal::ZERO,
            "channel.funding_amount must be positive"
        );
        ensure!(
            self.peer.sleep_std_time >= 0.0,
            "peer.sleep_std_time must not be negative"
        );
        ensure!(
            (0.0..=1.0).contains(&self.peer.quality),
            "peer.quality must be within [0, 1]"
        );
        ensure!(
            self.economic_model.legacy.is_some() || self.economic_model.sigmoid.is_some(),
            "at least one economic model must be configured"
        );

        Ok(())
    }
}
