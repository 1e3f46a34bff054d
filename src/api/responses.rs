// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::Deserialize;

use crate::models::{address::Address, balance::Balance, channel::Channel, session::Session};

#[derive(Debug, Deserialize)]
pub struct Addresses {
    pub native: Address,
}

#[derive(Debug, Deserialize)]
pub struct Balances {
    pub hopr: Balance,
    pub native: Balance,
    #[serde(rename = "safeHopr")]
    pub safe_hopr: Balance,
    #[serde(rename = "safeNative")]
    pub safe_native: Balance,
}

impl Balances {
    pub fn by_token(&self) -> [(&'static str, &Balance); 4] {
        [
            ("hopr", &self.hopr),
            ("native", &self.native),
            ("safe_hopr", &self.safe_hopr),
            ("safe_native", &self.safe_native),
        ]
    }
}

#[derive(Debug, Deserialize)]
pub struct OpenedChannel {
    #[serde(rename = "channelId")]
    pub channel_id: String,
    #[serde(rename = "transactionReceipt", default)]
    pub receipt: String,
}

/// Only the full topology matters here; the per-direction lists are derived
/// locally against the node's own address.
#[derive(Debug, Deserialize)]
pub struct ChannelsResponse {
    pub all: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
pub struct PeersResponse {
    #[serde(default)]
    pub connected: Vec<ConnectedPeer>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectedPeer {
    pub address: Address,
    #[serde(default)]
    pub multiaddr: Option<String>,
    #[serde(rename = "reportedVersion", default)]
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SessionFailure {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// Result of an open-session request: the node either hands back a listener
/// or a structured failure that feeds the rate limiter.
#[derive(Debug)]
pub enum SessionOutcome {
    Opened(Session),
    Failed(SessionFailure),
}

#[derive(Debug, Deserialize)]
pub struct TicketPriceResponse {
    pub price: Balance,
}
