// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{
    api::{
        requests::{CreateSessionBody, FundChannelBody, OpenChannelBody},
        responses::{
            Addresses, Balances, ChannelsResponse, ConnectedPeer, OpenedChannel, PeersResponse,
            SessionFailure, SessionOutcome, TicketPriceResponse,
        },
    },
    models::{address::Address, balance::Balance, session::Session},
};

const API_PREFIX: &str = "/api/v4";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const SESSION_OPEN_TIMEOUT: Duration = Duration::from_secs(4);
const SESSION_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(20);

/// REST client for one relay node.
///
/// Every call carries the node's bearer token and an explicit total timeout.
/// Cloning shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct NodeApi {
    http: reqwest::Client,
    base: String,
    token: String,
}

impl NodeApi {
    pub fn new(url: &str, token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            base: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn host(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{API_PREFIX}{path}", self.base)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| format!("GET {path} failed"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("GET {path} returned {status}");
        }

        response
            .json()
            .await
            .with_context(|| format!("GET {path}: malformed response body"))
    }

    // -- account --

    pub async fn address(&self) -> Result<Addresses> {
        self.get_json("/account/addresses").await
    }

    pub async fn balances(&self) -> Result<Balances> {
        self.get_json("/account/balances").await
    }

    // -- channels --

    pub async fn open_channel(
        &self,
        destination: &Address,
        amount: &Balance,
    ) -> Result<OpenedChannel> {
        let body = OpenChannelBody {
            amount: amount.to_string(),
            destination: destination.clone(),
        };

        let response = self
            .http
            .post(self.url("/channels"))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .context("POST /channels failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("POST /channels returned {status}");
        }

        response
            .json()
            .await
            .context("POST /channels: malformed response body")
    }

    pub async fn fund_channel(&self, channel_id: &str, amount: &Balance) -> Result<bool> {
        let body = FundChannelBody {
            amount: amount.to_string(),
        };

        let response = self
            .http
            .post(self.url(&format!("/channels/{channel_id}/fund")))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .context("fund channel request failed")?;

        Ok(response.status().is_success())
    }

    pub async fn close_channel(&self, channel_id: &str) -> Result<bool> {
        let response = self
            .http
            .delete(self.url(&format!("/channels/{channel_id}")))
            .bearer_auth(&self.token)
            .send()
            .await
            .context("close channel request failed")?;

        Ok(response.status().is_success())
    }

    pub async fn channels(&self) -> Result<ChannelsResponse> {
        self.get_json("/channels?fullTopology=true&includingClosed=false")
            .await
    }

    // -- peers --

    pub async fn peers(&self, quality: f64) -> Result<Vec<ConnectedPeer>> {
        let response: PeersResponse =
            self.get_json(&format!("/node/peers?quality={quality}")).await?;
        Ok(response.connected)
    }

    // -- sessions --

    pub async fn list_udp_sessions(&self) -> Result<Vec<Session>> {
        self.get_json("/session/udp").await
    }

    /// Opens a UDP session listener routed through `relayer`. Uses a short
    /// timeout so a stalled node degrades into a rate-limited retry rather
    /// than blocking the dispatch loop.
    pub async fn open_udp_session(
        &self,
        destination: &Address,
        relayer: &Address,
        listen_host: &str,
    ) -> Result<SessionOutcome> {
        let body = CreateSessionBody::new(destination.clone(), relayer.clone(), listen_host);
        debug!(destination = %destination, relayer = %relayer, "attempting to open session");

        let response = self
            .http
            .post(self.url("/session/udp"))
            .bearer_auth(&self.token)
            .timeout(SESSION_OPEN_TIMEOUT)
            .json(&body)
            .send()
            .await
            .context("POST /session/udp failed")?;

        if response.status().is_success() {
            let session: Session = response
                .json()
                .await
                .context("POST /session/udp: malformed session body")?;
            return Ok(SessionOutcome::Opened(session));
        }

        let status = response.status();
        let failure = response.json().await.unwrap_or_else(|_| SessionFailure {
            status: format!("HTTP {status}"),
            error: None,
        });
        Ok(SessionOutcome::Failed(failure))
    }

    pub async fn close_session(&self, session: &Session) -> Result<bool> {
        let response = self
            .http
            .delete(self.url(&session.as_path()))
            .bearer_auth(&self.token)
            .timeout(SESSION_CLOSE_TIMEOUT)
            .send()
            .await
            .context("close session request failed")?;

        Ok(response.status().is_success())
    }

    // -- node state --

    /// Ticket price from the node configuration, falling back to the network
    /// price endpoint when the configuration does not carry one.
    pub async fn ticket_price(&self) -> Result<Option<Balance>> {
        if let Ok(config) = self.get_json::<serde_json::Value>("/node/configuration").await
            && let Some(raw) = config
                .get("hopr/protocol/outgoing_ticket_price")
                .and_then(|v| v.as_str())
            && let Ok(price) = raw.parse::<Balance>()
        {
            return Ok(Some(price));
        }

        match self.get_json::<TicketPriceResponse>("/network/price").await {
            Ok(response) => Ok(Some(response.price)),
            Err(err) => {
                warn!(error = %err, "no ticket price available");
                Ok(None)
            },
        }
    }

    /// True when the health endpoint answers 200 within its timeout. The
    /// health probe lives outside the API prefix.
    pub async fn healthyz(&self) -> bool {
        let url = format!("{}/healthyz", self.base);

        match self
            .http
            .get(url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status() == StatusCode::OK,
            Err(err) => {
                debug!(error = %err, "health probe failed");
                false
            },
        }
    }
}
