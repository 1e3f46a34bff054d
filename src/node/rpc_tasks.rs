// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use tracing::{debug, warn};

use crate::{
    node::Node,
    rpc::{
        entries::{Allocation, ExternalBalance},
        provider::{BalanceProvider, DistributorProvider},
    },
};

impl Node {
    /// Vesting allocations of every configured investor address, from both
    /// distributor contracts.
    pub(crate) async fn allocations(&self) -> Result<()> {
        let addresses = &self.params.investors.addresses;
        let schedule = &self.params.investors.schedule;

        let providers = [
            DistributorProvider::gnosis(&self.params.rpc.gnosis)?,
            DistributorProvider::mainnet(&self.params.rpc.mainnet)?,
        ];

        let mut results: Vec<Allocation> = Vec::new();
        for provider in &providers {
            for address in addresses {
                match provider.allocations(address, schedule).await {
                    Ok(allocation) => results.push(allocation),
                    Err(err) => {
                        warn!(address = %address, error = %err, "allocation query failed");
                    },
                }
            }
        }

        debug!(count = results.len(), "fetched investors allocations");
        self.allocations.set(results).await;
        Ok(())
    }

    /// Token balances held directly by the investor EOAs on both chains.
    pub(crate) async fn eoa_balances(&self) -> Result<()> {
        let addresses = &self.params.investors.addresses;

        let providers = [
            BalanceProvider::hopr_mainnet(&self.params.rpc.mainnet)?,
            BalanceProvider::xhopr_gnosis(&self.params.rpc.gnosis)?,
            BalanceProvider::wxhopr_gnosis(&self.params.rpc.gnosis)?,
        ];

        let mut results: Vec<ExternalBalance> = Vec::new();
        for provider in &providers {
            for address in addresses {
                match provider.balance_of(address).await {
                    Ok(balance) => results.push(balance),
                    Err(err) => {
                        warn!(address = %address, error = %err, "EOA balance query failed");
                    },
                }
            }
        }

        debug!(count = results.len(), "fetched investors EOA balances");
        self.eoa_balances.set(results).await;
        Ok(())
    }
}
