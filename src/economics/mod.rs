// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub mod legacy;
pub mod sigmoid;

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use rust_decimal::Decimal;

use crate::{
    models::{address::Address, balance::Balance, peer::Peer},
    rpc::entries::{Allocation, ExternalBalance},
    subgraph::entries::RegisteredNode,
};

/// Anything attributable to a safe through an owner address.
pub trait OwnedEntity {
    fn address(&self) -> &Address;
    fn linked_safes_mut(&mut self) -> &mut HashSet<Address>;
}

impl OwnedEntity for Allocation {
    fn address(&self) -> &Address {
        &self.address
    }

    fn linked_safes_mut(&mut self) -> &mut HashSet<Address> {
        &mut self.linked_safes
    }
}

impl OwnedEntity for ExternalBalance {
    fn address(&self) -> &Address {
        &self.address
    }

    fn linked_safes_mut(&mut self) -> &mut HashSet<Address> {
        &mut self.linked_safes
    }
}

/// Links investor entities to the safes whose owner sets contain them. The
/// linkage lives in a flat set of safe addresses, resolved against the
/// registry on use.
pub fn associate_entities_to_safes<E: OwnedEntity>(
    entities: &mut [E],
    nodes: &[RegisteredNode],
) {
    let mut owners_to_safes: HashMap<&Address, Vec<&Address>> = HashMap::new();
    for node in nodes {
        for owner in &node.safe.owners {
            owners_to_safes
                .entry(owner)
                .or_default()
                .push(&node.safe.address);
        }
    }

    for entity in entities {
        if let Some(safes) = owners_to_safes.get(entity.address()) {
            let linked = entity.linked_safes_mut();
            for safe in safes {
                linked.insert((*safe).clone());
            }
        }
    }
}

/// Balance contributed to each safe by its linked investor entities: every
/// entity's value is split evenly across the safes it is linked to.
pub fn additional_safe_balances(
    allocations: &[Allocation],
    eoa_balances: &[ExternalBalance],
    nodes: &[RegisteredNode],
) -> HashMap<Address, Balance> {
    let mut extra: HashMap<Address, Balance> = nodes
        .iter()
        .map(|n| (n.safe.address.clone(), Balance::zero("wxHOPR")))
        .collect();

    let mut credit = |safes: &HashSet<Address>, value: &Balance| {
        if safes.is_empty() {
            return;
        }
        let share = match value.split(Decimal::from(safes.len() as u64)) {
            Ok(share) => share,
            Err(_) => return,
        };
        for safe in safes {
            let updated = extra.get(safe).and_then(|total| total.add(&share).ok());
            if let Some(sum) = updated {
                extra.insert(safe.clone(), sum);
            }
        }
    };

    for allocation in allocations {
        credit(&allocation.linked_safes, &allocation.unclaimed());
    }
    for balance in eoa_balances {
        credit(&balance.linked_safes, &balance.balance);
    }

    extra
}

/// Attaches safes (with their derived additional balance) and per-source
/// channel balances to the peers they back.
pub fn merge_into_peers(
    peers: &[Arc<Peer>],
    nodes: &[RegisteredNode],
    additional: &HashMap<Address, Balance>,
    topology: &HashMap<Address, Balance>,
) {
    let by_address: HashMap<&Address, &RegisteredNode> =
        nodes.iter().map(|n| (&n.address, n)).collect();

    for peer in peers {
        if let Some(node) = by_address.get(&peer.address) {
            let mut safe = node.safe.clone();
            if let Some(extra) = additional.get(&safe.address) {
                safe.additional_balance = extra.clone();
            }
            peer.attach_safe(safe);
        }

        peer.set_channel_balance(Some(
            topology
                .get(&peer.address)
                .cloned()
                .unwrap_or_else(|| Balance::zero("wxHOPR")),
        ));
    }
}

/// Counts how many peers share each safe so that its stake is split rather
/// than counted once per node.
pub fn allow_many_nodes_per_safe(peers: &[Arc<Peer>]) {
    let mut counts: HashMap<Address, usize> = HashMap::new();
    for peer in peers {
        if let Some(safe) = peer.safe() {
            *counts.entry(safe.address).or_insert(0) += 1;
        }
    }

    for peer in peers {
        if let Some(safe) = peer.safe() {
            peer.set_safe_address_count(counts.get(&safe.address).copied().unwrap_or(1));
        }
    }
}
