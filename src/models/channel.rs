// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::HashMap;

use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::models::{address::Address, balance::Balance};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ChannelStatus {
    Open,
    PendingToClose,
    Closed,
}

impl ChannelStatus {
    pub fn is_open(self) -> bool {
        self == ChannelStatus::Open
    }

    pub fn is_pending(self) -> bool {
        self == ChannelStatus::PendingToClose
    }

    pub fn is_closed(self) -> bool {
        self == ChannelStatus::Closed
    }
}

/// A directed payment channel as reported by the node API.
#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    #[serde(rename = "channelId")]
    pub id: String,
    pub source: Address,
    pub destination: Address,
    pub status: ChannelStatus,
    pub balance: Balance,
}

/// One immutable channel snapshot plus its memoized derived views.
///
/// Replacing the node's snapshot replaces this whole structure, so a view can
/// never outlive the snapshot it was computed from: invalidation is atomic
/// with assignment by construction. Views populate lazily on first read.
#[derive(Debug, Default)]
pub struct ChannelGraph {
    all: Vec<Channel>,
    outgoing: Vec<Channel>,
    incoming: Vec<Channel>,

    outgoing_open: OnceCell<Vec<Channel>>,
    incoming_open: OnceCell<Vec<Channel>>,
    outgoing_pending: OnceCell<Vec<Channel>>,
    outgoing_not_closed: OnceCell<Vec<Channel>>,
    open_by_destination: OnceCell<HashMap<Address, Channel>>,
}

impl ChannelGraph {
    /// Partitions the full topology into incoming/outgoing relative to
    /// `own_address`. Addresses are normalized, so the comparison is
    /// case-insensitive.
    pub fn new(all: Vec<Channel>, own_address: &Address) -> Self {
        let outgoing = all
            .iter()
            .filter(|c| &c.source == own_address)
            .cloned()
            .collect();
        let incoming = all
            .iter()
            .filter(|c| &c.destination == own_address)
            .cloned()
            .collect();

        Self {
            all,
            outgoing,
            incoming,
            ..Self::default()
        }
    }

    pub fn all(&self) -> &[Channel] {
        &self.all
    }

    pub fn outgoing(&self) -> &[Channel] {
        &self.outgoing
    }

    pub fn incoming(&self) -> &[Channel] {
        &self.incoming
    }

    pub fn outgoing_open(&self) -> &[Channel] {
        self.outgoing_open.get_or_init(|| {
            self.outgoing
                .iter()
                .filter(|c| c.status.is_open())
                .cloned()
                .collect()
        })
    }

    pub fn incoming_open(&self) -> &[Channel] {
        self.incoming_open.get_or_init(|| {
            self.incoming
                .iter()
                .filter(|c| c.status.is_open())
                .cloned()
                .collect()
        })
    }

    pub fn outgoing_pending(&self) -> &[Channel] {
        self.outgoing_pending.get_or_init(|| {
            self.outgoing
                .iter()
                .filter(|c| c.status.is_pending())
                .cloned()
                .collect()
        })
    }

    pub fn outgoing_not_closed(&self) -> &[Channel] {
        self.outgoing_not_closed.get_or_init(|| {
            self.outgoing
                .iter()
                .filter(|c| !c.status.is_closed())
                .cloned()
                .collect()
        })
    }

    /// Map from destination address to its one open outgoing channel.
    pub fn open_by_destination(&self) -> &HashMap<Address, Channel> {
        self.open_by_destination.get_or_init(|| {
            self.outgoing_open()
                .iter()
                .map(|c| (c.destination.clone(), c.clone()))
                .collect()
        })
    }

    /// Aggregated balance of open channels per source address, across the
    /// whole topology.
    pub fn balance_by_source(&self) -> HashMap<Address, Balance> {
        let mut totals: HashMap<Address, Balance> = HashMap::new();

        for channel in self.all.iter().filter(|c| c.status.is_open()) {
            match totals.get(&channel.source) {
                Some(current) => {
                    if let Ok(sum) = current.add(&channel.balance) {
                        totals.insert(channel.source.clone(), sum);
                    }
                },
                None => {
                    totals.insert(channel.source.clone(), channel.balance.clone());
                },
            }
        }

        totals
    }
}
