// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Context, Result, bail, ensure};
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    models::{address::Address, balance::Balance},
    rpc::entries::{Allocation, ExternalBalance},
};

/// Width of one ABI word in hex characters.
const BLOCK_SIZE: usize = 64;

const BALANCE_OF_SELECTOR: &str = "0x70a08231";
const CLAIM_STATUS_SELECTOR: &str = "0xc31cd7d7";

// Known token and distributor contracts.
const HOPR_TOKEN_MAINNET: &str = "0xf5581dfefd8fb0e4aec526be659cfab1f8c781da";
const XHOPR_TOKEN_GNOSIS: &str = "0xd057604a14982fe8d88c5fc25aac3267ea142a08";
const WXHOPR_TOKEN_GNOSIS: &str = "0xd4fdec44db9d44b8f2b6d529620f9c0c7066a2c1";
const DISTRIBUTOR_GNOSIS: &str = "0x987cb736fbfbc4a397acd06045bf0cd9b9defe66";
const DISTRIBUTOR_MAINNET: &str = "0xb413a589ec21cc1fec27d1175105a47628676552";

/// Thin `eth_call` client over one JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
}

impl RpcClient {
    pub fn new(url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("failed to build RPC HTTP client")?;

        Ok(Self {
            http,
            url: url.to_string(),
        })
    }

    /// Executes `eth_call` against `to` with the given calldata and returns
    /// the raw hex result string.
    async fn eth_call(&self, to: &str, data: &str) -> Result<String> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": "eth_call",
            "params": [{ "to": to, "data": data }, "latest"],
            "id": 1,
        });

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .context("eth_call request failed")?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .context("eth_call returned non-JSON body")?;

        if !status.is_success() {
            bail!(
                "eth_call returned {status}: {}",
                payload.get("error").cloned().unwrap_or(Value::Null)
            );
        }

        match payload.get("result").and_then(Value::as_str) {
            Some(result) => Ok(result.to_string()),
            None => bail!("eth_call response has no 'result' hex string"),
        }
    }
}

/// One ABI word, right-aligned over zeroes.
fn abi_word(hex_digits: &str) -> String {
    format!("{hex_digits:0>BLOCK_SIZE$}")
}

/// `balanceOf(address)` calldata.
pub fn balance_of_calldata(address: &Address) -> String {
    format!(
        "{BALANCE_OF_SELECTOR}{}",
        abi_word(address.as_str().trim_start_matches("0x"))
    )
}

/// Claim-status calldata: selector, address word, offset word (0x40), string
/// length word, schedule bytes right-padded to a word.
pub fn claim_status_calldata(address: &Address, schedule: &str) -> String {
    let encoded_schedule = hex::encode(schedule.as_bytes());
    let schedule_len = encoded_schedule.len() / 2;

    format!(
        "{CLAIM_STATUS_SELECTOR}{}{}{}{:0<BLOCK_SIZE$}",
        abi_word(address.as_str().trim_start_matches("0x")),
        abi_word(&format!("{BLOCK_SIZE:x}")),
        abi_word(&format!("{schedule_len:x}")),
        encoded_schedule,
    )
}

fn parse_wei_word(word: &str) -> Result<Balance> {
    let raw = u128::from_str_radix(word, 16).context("invalid hex word in RPC response")?;
    format!("{raw} wei wxHOPR")
        .parse()
        .context("failed to build balance from RPC word")
}

/// `balanceOf(address)` reader for one token contract.
#[derive(Debug)]
pub struct BalanceProvider {
    rpc: RpcClient,
    contract: &'static str,
}

impl BalanceProvider {
    pub fn hopr_mainnet(url: &str) -> Result<Self> {
        Ok(Self {
            rpc: RpcClient::new(url)?,
            contract: HOPR_TOKEN_MAINNET,
        })
    }

    pub fn xhopr_gnosis(url: &str) -> Result<Self> {
        Ok(Self {
            rpc: RpcClient::new(url)?,
            contract: XHOPR_TOKEN_GNOSIS,
        })
    }

    pub fn wxhopr_gnosis(url: &str) -> Result<Self> {
        Ok(Self {
            rpc: RpcClient::new(url)?,
            contract: WXHOPR_TOKEN_GNOSIS,
        })
    }

    pub async fn balance_of(&self, address: &Address) -> Result<ExternalBalance> {
        let data = balance_of_calldata(address);
        let result = self.rpc.eth_call(self.contract, &data).await?;
        let balance = parse_wei_word(result.trim_start_matches("0x"))?;

        debug!(address = %address, balance = %balance, "fetched EOA balance");
        Ok(ExternalBalance::new(address.clone(), balance))
    }
}

/// Claim-status reader for one allocation distributor contract.
#[derive(Debug)]
pub struct DistributorProvider {
    rpc: RpcClient,
    contract: &'static str,
}

impl DistributorProvider {
    pub fn gnosis(url: &str) -> Result<Self> {
        Ok(Self {
            rpc: RpcClient::new(url)?,
            contract: DISTRIBUTOR_GNOSIS,
        })
    }

    pub fn mainnet(url: &str) -> Result<Self> {
        Ok(Self {
            rpc: RpcClient::new(url)?,
            contract: DISTRIBUTOR_MAINNET,
        })
    }

    /// Fetches `(allocated, claimed)` for an address and vesting schedule.
    /// The response is four words; the first two carry the amounts in wei.
    pub async fn allocations(&self, address: &Address, schedule: &str) -> Result<Allocation> {
        let data = claim_status_calldata(address, schedule);
        let result = self.rpc.eth_call(self.contract, &data).await?;
        let words = result.trim_start_matches("0x");
        ensure!(
            words.len() >= 4 * BLOCK_SIZE,
            "claim-status response shorter than four words"
        );

        let amount = parse_wei_word(&words[..BLOCK_SIZE])?;
        let claimed = parse_wei_word(&words[BLOCK_SIZE..2 * BLOCK_SIZE])?;

        debug!(address = %address, amount = %amount, claimed = %claimed, "fetched allocation");
        Ok(Allocation::new(
            address.clone(),
            schedule.to_string(),
            amount,
            claimed,
        ))
    }
}
