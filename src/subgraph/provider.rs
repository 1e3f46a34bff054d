// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result, bail};
use metrics::{counter, gauge};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::cfg::config::SubgraphEndpointParams;

const PAGE_SIZE: usize = 1000;

/// Which of the two endpoint families a provider currently talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Default,
    Backup,
    None,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Default => "default",
            Mode::Backup => "backup",
            Mode::None => "none",
        }
    }

    pub fn to_int(self) -> i64 {
        match self {
            Mode::Default => 0,
            Mode::Backup => 1,
            Mode::None => -1,
        }
    }

    pub fn from_config(raw: &str) -> Self {
        match raw {
            "default" => Mode::Default,
            "backup" => Mode::Backup,
            _ => Mode::None,
        }
    }
}

/// One paginated GraphQL endpoint with a gateway URL and a studio fallback.
///
/// The active mode is probed on rotation and consulted on every fetch; a
/// provider whose endpoints all fail degrades to `Mode::None` and yields
/// empty results until the next rotation.
#[derive(Debug)]
pub struct GraphProvider {
    http: reqwest::Client,
    slug: String,
    /// Key under `data` holding the result array.
    key: &'static str,
    query: String,
    default_url: String,
    backup_url: String,
    inputs: serde_json::Map<String, Value>,
    mode: Mutex<Mode>,
}

impl GraphProvider {
    fn new(
        user_id: u64,
        api_key: &str,
        params: &SubgraphEndpointParams,
        key: &'static str,
        query: &str,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("failed to build subgraph HTTP client")?;

        let version = params.version.as_deref().unwrap_or("version/latest");

        Ok(Self {
            http,
            slug: params.slug.clone(),
            key,
            query: query.to_string(),
            default_url: format!(
                "https://gateway-arbitrum.network.thegraph.com/api/{api_key}/subgraphs/id/{}",
                params.query_id
            ),
            backup_url: format!(
                "https://api.studio.thegraph.com/query/{user_id}/{}/{version}",
                params.slug
            ),
            inputs: params.inputs.clone(),
            mode: Mutex::new(Mode::Default),
        })
    }

    /// Safe registry entries with their registered nodes.
    pub fn safes(user_id: u64, api_key: &str, params: &SubgraphEndpointParams) -> Result<Self> {
        const QUERY: &str = "query ($first: Int!, $skip: Int!) {\n\
                             \x20 safes(first: $first, skip: $skip) {\n\
                             \x20   registeredNodesInSafeRegistry {\n\
                             \x20     node { id }\n\
                             \x20     safe {\n\
                             \x20       id\n\
                             \x20       balance { wxHoprBalance }\n\
                             \x20       allowance { wxHoprAllowance }\n\
                             \x20       owners { owner { id } }\n\
                             \x20     }\n\
                             \x20   }\n\
                             \x20 }\n\
                             }";
        Self::new(user_id, api_key, params, "safes", QUERY)
    }

    /// Reward accounts with their redeemed ticket value.
    pub fn rewards(user_id: u64, api_key: &str, params: &SubgraphEndpointParams) -> Result<Self> {
        const QUERY: &str = "query ($first: Int!, $skip: Int!) {\n\
                             \x20 accounts(first: $first, skip: $skip) { id redeemedValue }\n\
                             }";
        Self::new(user_id, api_key, params, "accounts", QUERY)
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn default_url(&self) -> &str {
        &self.default_url
    }

    pub fn backup_url(&self) -> &str {
        &self.backup_url
    }

    pub fn mode(&self) -> Mode {
        *self.mode.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_mode(&self, mode: Mode) {
        *self.mode.lock().unwrap_or_else(PoisonError::into_inner) = mode;
        gauge!("ct_subgraph_in_use", "slug" => self.slug.clone()).set(mode.to_int() as f64);
    }

    fn url_for(&self, mode: Mode) -> Option<&str> {
        match mode {
            Mode::Default => Some(&self.default_url),
            Mode::Backup => Some(&self.backup_url),
            Mode::None => None,
        }
    }

    async fn execute(&self, mode: Mode, first: usize, skip: usize) -> Result<Value> {
        let Some(url) = self.url_for(mode) else {
            bail!("no subgraph endpoint available for '{}'", self.slug);
        };

        let mut variables = json!({ "first": first, "skip": skip });
        if let Some(vars) = variables.as_object_mut() {
            vars.extend(self.inputs.clone());
        }

        counter!(
            "ct_subgraph_calls",
            "slug" => self.slug.clone(),
            "mode" => mode.as_str()
        )
        .increment(1);

        let response = self
            .http
            .post(url)
            .json(&json!({ "query": self.query, "variables": variables }))
            .send()
            .await
            .with_context(|| format!("subgraph '{}' request failed", self.slug))?;

        response
            .json()
            .await
            .with_context(|| format!("subgraph '{}' returned non-JSON body", self.slug))
    }

    async fn probe(&self, mode: Mode) -> bool {
        debug!(slug = %self.slug, mode = mode.as_str(), "testing subgraph endpoint");

        match self.execute(mode, 1, 0).await {
            Ok(response) => response
                .get("data")
                .and_then(|data| data.get(self.key))
                .is_some(),
            Err(err) => {
                debug!(slug = %self.slug, error = %err, "probe failed");
                false
            },
        }
    }

    /// Re-selects the working endpoint. With an explicit configuration the
    /// mode is pinned; with `auto` the first probe that answers wins.
    pub async fn rotate(&self, configured: &str) {
        if configured != "auto" {
            self.set_mode(Mode::from_config(configured));
            return;
        }

        for mode in [Mode::Default, Mode::Backup] {
            if self.probe(mode).await {
                self.set_mode(mode);
                debug!(slug = %self.slug, mode = mode.as_str(), "subgraph endpoint selected");
                return;
            }
        }

        warn!(slug = %self.slug, "no subgraph endpoint available");
        self.set_mode(Mode::None);
    }

    /// Fetches the full result set, accumulating pages until a short page.
    /// Errors mid-pagination yield the pages gathered so far.
    pub async fn fetch(&self) -> Vec<Value> {
        let mode = self.mode();
        if mode == Mode::None {
            warn!(slug = %self.slug, "subgraph disabled, returning no data");
            return Vec::new();
        }

        let mut results = Vec::new();
        let mut skip = 0;

        loop {
            let response = match self.execute(mode, PAGE_SIZE, skip).await {
                Ok(response) => response,
                Err(err) => {
                    warn!(slug = %self.slug, error = %err, "subgraph page fetch failed");
                    break;
                },
            };

            if let Some(errors) = response.get("errors") {
                warn!(slug = %self.slug, errors = %errors, "subgraph reported errors");
            }

            let page = response
                .get("data")
                .and_then(|data| data.get(self.key))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            let page_len = page.len();
            results.extend(page);

            if page_len < PAGE_SIZE {
                break;
            }
            skip += PAGE_SIZE;
        }

        results
    }
}
