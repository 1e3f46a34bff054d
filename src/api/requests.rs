// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::Serialize;

use crate::models::address::Address;

#[derive(Debug, Serialize)]
pub struct OpenChannelBody {
    pub amount: String,
    pub destination: Address,
}

#[derive(Debug, Serialize)]
pub struct FundChannelBody {
    pub amount: String,
}

/// Body of the open-UDP-session call. The session is routed through exactly
/// one relayer on both the forward and the return path.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionBody {
    pub capabilities: Vec<&'static str>,
    pub destination: Address,
    pub listen_host: String,
    pub forward_path: SessionPath,
    pub return_path: SessionPath,
    pub response_buffer: String,
    pub target: SessionTarget,
}

impl CreateSessionBody {
    pub fn new(destination: Address, relayer: Address, listen_host: &str) -> Self {
        Self {
            capabilities: vec!["NoDelay", "NoRateControl"],
            destination,
            listen_host: listen_host.to_string(),
            forward_path: SessionPath {
                intermediate_path: vec![relayer.clone()],
            },
            return_path: SessionPath {
                intermediate_path: vec![relayer],
            },
            response_buffer: "0 KB".to_string(),
            target: SessionTarget { service: 0 },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionPath {
    #[serde(rename = "IntermediatePath")]
    pub intermediate_path: Vec<Address>,
}

#[derive(Debug, Serialize)]
pub struct SessionTarget {
    #[serde(rename = "Service")]
    pub service: u32,
}
