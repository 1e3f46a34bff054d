// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::HashSet;

use anyhow::Result;
use ct_orchestrator::{
    models::{
        address::Address,
        channel::{Channel, ChannelGraph, ChannelStatus},
    },
    node::channels::addresses_without_channels,
};

fn channel(id: &str, source: &str, destination: &str, status: ChannelStatus) -> Channel {
    serde_json::from_value(serde_json::json!({
        "channelId": id,
        "source": source,
        "destination": destination,
        "status": match status {
            ChannelStatus::Open => "Open",
            ChannelStatus::PendingToClose => "PendingToClose",
            ChannelStatus::Closed => "Closed",
        },
        "balance": "0.1 wxHOPR",
    }))
    .expect("valid channel JSON")
}

fn sample_graph() -> ChannelGraph {
    let own = Address::new("0xME");
    ChannelGraph::new(
        vec![
            channel("c1", "0xme", "0xaa", ChannelStatus::Open),
            channel("c2", "0xme", "0xbb", ChannelStatus::PendingToClose),
            channel("c3", "0xme", "0xcc", ChannelStatus::Closed),
            channel("c4", "0xdd", "0xme", ChannelStatus::Open),
            channel("c5", "0xee", "0xff", ChannelStatus::Open),
        ],
        &own,
    )
}

#[test]
fn test_partitioning_is_case_insensitive() {
    let graph = sample_graph();

    assert_eq!(graph.all().len(), 5);
    assert_eq!(graph.outgoing().len(), 3);
    assert_eq!(graph.incoming().len(), 1);
}

#[test]
fn test_derived_views() {
    let graph = sample_graph();

    assert_eq!(graph.outgoing_open().len(), 1);
    assert_eq!(graph.outgoing_pending().len(), 1);
    assert_eq!(graph.outgoing_not_closed().len(), 2);
    assert_eq!(graph.incoming_open().len(), 1);

    let by_destination = graph.open_by_destination();
    assert_eq!(by_destination.len(), 1);
    assert!(by_destination.contains_key(&Address::new("0xaa")));
}

#[test]
fn test_views_recomputed_from_new_snapshot() {
    let graph = sample_graph();
    assert_eq!(graph.outgoing_open().len(), 1);

    // A fresh snapshot owns fresh caches; nothing can leak from the old one.
    let own = Address::new("0xme");
    let replacement = ChannelGraph::new(
        vec![channel("c9", "0xme", "0xzz", ChannelStatus::Open)],
        &own,
    );
    assert_eq!(replacement.outgoing_open().len(), 1);
    assert!(
        replacement
            .open_by_destination()
            .contains_key(&Address::new("0xzz"))
    );
    assert!(
        !replacement
            .open_by_destination()
            .contains_key(&Address::new("0xaa"))
    );
}

#[test]
fn test_balance_by_source_aggregates_open_channels() -> Result<()> {
    let graph = sample_graph();
    let totals = graph.balance_by_source();

    // Open channels only: c1 (0xme), c4 (0xdd), c5 (0xee). Pending and
    // closed ones do not count.
    assert_eq!(totals.len(), 3);
    assert_eq!(totals[&Address::new("0xme")], "0.1 wxHOPR".parse()?);
    assert_eq!(totals[&Address::new("0xdd")], "0.1 wxHOPR".parse()?);
    assert_eq!(totals[&Address::new("0xee")], "0.1 wxHOPR".parse()?);
    Ok(())
}

#[test]
fn test_addresses_without_channels_drives_reconciliation() {
    let graph = sample_graph();

    // Peers A, B, C: A has an open channel, B a pending one (still counts),
    // C only a closed one, so C is re-requested next tick.
    let peers: HashSet<Address> = ["0xaa", "0xbb", "0xcc"]
        .into_iter()
        .map(Address::new)
        .collect();

    let missing = addresses_without_channels(&graph, &peers);
    assert_eq!(missing, vec![Address::new("0xcc")]);
}
