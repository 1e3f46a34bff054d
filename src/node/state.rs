// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{PoisonError, atomic::Ordering};

use anyhow::Result;
use metrics::gauge;
use tracing::{debug, warn};

use crate::node::Node;

impl Node {
    /// Fetches the node's own address. The first successful retrieval wins;
    /// the address never changes afterwards.
    pub(crate) async fn retrieve_address(&self) -> Result<()> {
        let addresses = self.api.address().await?;
        let _ = self.address.set(addresses.native);
        debug!(address = ?self.address(), "retrieved addresses");
        Ok(())
    }

    /// Refreshes the balance gauges.
    pub(crate) async fn retrieve_balances(&self) -> Result<()> {
        let balances = match self.api.balances().await {
            Ok(balances) => balances,
            Err(err) => {
                warn!(error = %err, "no results while retrieving balances");
                return Ok(());
            },
        };

        if let Some(own) = self.address() {
            for (token, balance) in balances.by_token() {
                gauge!("ct_balance", "address" => own.to_string(), "token" => token)
                    .set(balance.as_f64());
            }
        }
        debug!(
            hopr = %balances.hopr,
            native = %balances.native,
            safe_hopr = %balances.safe_hopr,
            safe_native = %balances.safe_native,
            "retrieved balances"
        );

        Ok(())
    }

    /// The node counts as connected only when the health probe answers and
    /// its address is known.
    pub(crate) async fn healthcheck(&self) -> Result<()> {
        let healthy = self.api.healthyz().await;

        if self.address().is_none()
            && let Err(err) = self.retrieve_address().await
        {
            warn!(error = %err, "no address found");
        }

        let connected = healthy && self.address().is_some();
        self.connected.store(connected, Ordering::Relaxed);

        if !connected {
            warn!(url = %self.url, "node is not reachable");
        }
        if let Some(own) = self.address() {
            gauge!("ct_node_health", "address" => own.to_string())
                .set(if connected { 1.0 } else { 0.0 });
        }

        Ok(())
    }

    /// Refreshes the ticket price used to convert reward budgets into
    /// message counts.
    pub(crate) async fn ticket_parameters(&self) -> Result<()> {
        let Some(price) = self.api.ticket_price().await? else {
            return Ok(());
        };

        debug!(price = %price, "fetched ticket price");
        gauge!("ct_ticket_price").set(price.as_f64());

        *self
            .ticket_price
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(price);

        Ok(())
    }
}
