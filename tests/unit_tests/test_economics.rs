// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use anyhow::Result;
use ct_orchestrator::{
    economics::{
        additional_safe_balances, allow_many_nodes_per_safe, associate_entities_to_safes,
        legacy::{LegacyCoefficients, LegacyParams},
        merge_into_peers,
        sigmoid::{Bucket, Buckets, SigmoidInputs, SigmoidParams},
    },
    models::{address::Address, balance::Balance, peer::Peer},
    rpc::entries::Allocation,
    subgraph::entries::{RegisteredNode, Safe},
};

fn legacy_model() -> LegacyParams {
    LegacyParams {
        proportion: 1.0,
        apr: 15.0,
        coefficients: LegacyCoefficients {
            a: 1.0,
            b: 2.0,
            c: 3.0,
            l: 0.0,
        },
    }
}

#[test]
fn test_legacy_model_linear_regime() {
    let model = legacy_model();

    // stake 2 wxHOPR: transformed 2, rewards 0.3, 3000 messages a year.
    assert_eq!(model.transformed_stake(2.0, 0.0), 2.0);
    let yearly = model.yearly_message_count(2.0, 0.0001, 0.0);
    assert!((yearly - 3000.0).abs() < 1e-9, "got {yearly}");
}

#[test]
fn test_legacy_model_root_tail() {
    let model = legacy_model();

    // stake 19 wxHOPR: transformed 3 + sqrt(16) = 7, rewards 1.05, 10500.
    assert_eq!(model.transformed_stake(19.0, 0.0), 7.0);
    let yearly = model.yearly_message_count(19.0, 0.0001, 0.0);
    assert!((yearly - 10500.0).abs() < 1e-9, "got {yearly}");
}

#[test]
fn test_legacy_model_below_lowerbound_is_zero() {
    let mut model = legacy_model();
    model.coefficients.l = 1.0;

    assert_eq!(model.transformed_stake(0.5, 0.0), 0.0);
    assert_eq!(model.yearly_message_count(0.5, 0.0001, 0.0), 0.0);
}

#[test]
fn test_legacy_redeemed_rewards_shift_the_cap() {
    let model = legacy_model();

    // With 16 wxHOPR redeemed the linear regime stretches to c = 19, so a
    // 19 wxHOPR stake stays linear instead of hitting the root tail.
    assert_eq!(model.transformed_stake(19.0, 16.0), 19.0);
    // And the plain model still saturates.
    assert_eq!(model.transformed_stake(19.0, 0.0), 7.0);
}

fn sigmoid_model() -> SigmoidParams {
    SigmoidParams {
        proportion: 1.0,
        max_apr: 15.0,
        offset: 0.0,
        buckets: Buckets {
            economic_security: Bucket {
                flatness: 1.0,
                skewness: 1.0,
                upperbound: 1.0,
                offset: 2.0,
            },
            network_capacity: Bucket {
                flatness: 1.0,
                skewness: 1.0,
                upperbound: 1.0,
                offset: 2.0,
            },
        },
        network_capacity: 1000,
        total_token_supply: 1e7,
    }
}

#[test]
fn test_sigmoid_bucket_clamps_at_zero() {
    let bucket = Bucket {
        flatness: 1.0,
        skewness: 1.0,
        upperbound: 1.0,
        offset: 0.0,
    };

    // At x = 0.5: ln((1/0.5)^1 - 1) = ln(1) = 0.
    assert_eq!(bucket.apr(0.5), Some(0.0));
    // Deep negative log values clamp to zero instead of going negative.
    let apr = bucket.apr(0.9).expect("inside domain");
    assert_eq!(apr, 0.0);
}

#[test]
fn test_sigmoid_outside_domain_collapses_to_zero() {
    let model = sigmoid_model();

    // x >= upperbound makes the inner term non-positive: no defined APR.
    let inputs = SigmoidInputs {
        economic_security: 1.5,
        network_capacity: 0.1,
    };
    assert_eq!(model.apr(inputs), 0.0);
    assert_eq!(model.yearly_message_count(100.0, 0.0001, inputs), 0.0);
}

#[test]
fn test_sigmoid_apr_is_capped() {
    let model = sigmoid_model();

    // Tiny x values make each bucket APR large; max_apr caps the result.
    let inputs = SigmoidInputs {
        economic_security: 1e-9,
        network_capacity: 1e-9,
    };
    assert_eq!(model.apr(inputs), 15.0);
}

#[test]
fn test_sigmoid_buckets_are_evaluated_crosswise() {
    // Asymmetric buckets and inputs so that the crossed and the natural
    // pairings give different APRs.
    let mut model = sigmoid_model();
    model.max_apr = 100.0;
    model.buckets.network_capacity = Bucket {
        flatness: 2.0,
        skewness: 1.0,
        upperbound: 8.0,
        offset: 0.0,
    };
    model.buckets.economic_security = Bucket {
        flatness: 3.0,
        skewness: 1.0,
        upperbound: 16.0,
        offset: 0.0,
    };

    let inputs = SigmoidInputs {
        economic_security: 1.0,
        network_capacity: 2.0,
    };

    // Network-capacity curve at the economic-security value, and the
    // economic-security curve at the network-capacity value.
    let capacity_apr = (8.0_f64 / 1.0 - 1.0).ln() * 2.0;
    let security_apr = (16.0_f64 / 2.0 - 1.0).ln() * 3.0;
    let expected = (capacity_apr * security_apr).sqrt();

    let apr = model.apr(inputs);
    assert!((apr - expected).abs() < 1e-9, "got {apr}, want {expected}");

    // The same-name pairing would land somewhere else entirely.
    let natural = (((16.0_f64 / 1.0 - 1.0).ln() * 3.0) * ((8.0_f64 / 2.0 - 1.0).ln() * 2.0)).sqrt();
    assert!((apr - natural).abs() > 0.1);
}

fn registered(address: &str, safe: &str, balance: &str, allowance: &str, owner: &str) -> RegisteredNode {
    RegisteredNode {
        address: Address::new(address),
        safe: Safe {
            address: Address::new(safe),
            balance: balance.parse().expect("balance"),
            allowance: allowance.parse().expect("allowance"),
            owners: vec![Address::new(owner)],
            additional_balance: Balance::zero("wxHOPR"),
        },
    }
}

#[test]
fn test_merge_pipeline_links_allocations_through_owners() -> Result<()> {
    let nodes = vec![
        registered("0xa1", "0xsafe1", "10 wxHOPR", "1 wxHOPR", "0xowner1"),
        registered("0xa2", "0xsafe2", "10 wxHOPR", "1 wxHOPR", "0xowner1"),
    ];

    // One allocation owned by an address co-owning both safes.
    let mut allocations = vec![Allocation::new(
        Address::new("0xowner1"),
        "schedule".into(),
        "100 wxHOPR".parse()?,
        Balance::zero("wxHOPR"),
    )];

    associate_entities_to_safes(&mut allocations, &nodes);
    assert_eq!(allocations[0].num_linked_safes(), 2);

    let additional = additional_safe_balances(&allocations, &[], &nodes);
    // 100 unclaimed split across two linked safes.
    assert_eq!(additional[&Address::new("0xsafe1")], "50 wxHOPR".parse()?);
    assert_eq!(additional[&Address::new("0xsafe2")], "50 wxHOPR".parse()?);

    let peers = vec![
        Arc::new(Peer::new(Address::new("0xa1"), None)),
        Arc::new(Peer::new(Address::new("0xa2"), None)),
    ];
    let topology = HashMap::from([(Address::new("0xa1"), "2 wxHOPR".parse()?)]);

    merge_into_peers(&peers, &nodes, &additional, &topology);
    allow_many_nodes_per_safe(&peers);

    let safe = peers[0].safe().expect("safe attached");
    assert_eq!(safe.total_balance(), "60 wxHOPR".parse()?);
    assert_eq!(peers[0].safe_address_count(), 1);

    // split_stake = total_balance / safe_count + channel_balance.
    assert_eq!(peers[0].split_stake(), Some(62.0));
    // Peer without topology entry falls back to a zero channel balance.
    assert_eq!(peers[1].split_stake(), Some(60.0));
    Ok(())
}

#[test]
fn test_shared_safe_splits_stake() -> Result<()> {
    let nodes = vec![
        registered("0xa1", "0xsafe1", "100 wxHOPR", "1 wxHOPR", "0xowner1"),
        registered("0xa2", "0xsafe1", "100 wxHOPR", "1 wxHOPR", "0xowner1"),
    ];
    let peers = vec![
        Arc::new(Peer::new(Address::new("0xa1"), None)),
        Arc::new(Peer::new(Address::new("0xa2"), None)),
    ];

    merge_into_peers(&peers, &nodes, &HashMap::new(), &HashMap::new());
    allow_many_nodes_per_safe(&peers);

    assert_eq!(peers[0].safe_address_count(), 2);
    assert_eq!(peers[0].split_stake(), Some(50.0));
    Ok(())
}

#[test]
fn test_eligibility_filter() -> Result<()> {
    let nodes = vec![registered(
        "0xa1", "0xsafe1", "100 wxHOPR", "1 wxHOPR", "0xowner1",
    )];
    let peers = vec![Arc::new(Peer::new(Address::new("0xa1"), None))];

    merge_into_peers(&peers, &nodes, &HashMap::new(), &HashMap::new());
    allow_many_nodes_per_safe(&peers);

    let peer = &peers[0];
    let no_holders: HashSet<Address> = HashSet::new();
    let fleet: HashSet<Address> = HashSet::new();

    assert!(peer.is_eligible(0.5, 10.0, &no_holders, None, &fleet));

    // Allowance below the minimum.
    assert!(!peer.is_eligible(2.0, 10.0, &no_holders, None, &fleet));

    // Stake below the minimum.
    assert!(!peer.is_eligible(0.5, 1000.0, &no_holders, None, &fleet));

    // Fleet members never earn.
    let fleet: HashSet<Address> = HashSet::from([Address::new("0xa1")]);
    assert!(!peer.is_eligible(0.5, 10.0, &no_holders, None, &fleet));

    // NFT threshold binds only non-holders.
    let fleet: HashSet<Address> = HashSet::new();
    assert!(!peer.is_eligible(0.5, 10.0, &no_holders, Some(500.0), &fleet));
    let holders: HashSet<Address> = HashSet::from([Address::new("0xsafe1")]);
    assert!(peer.is_eligible(0.5, 10.0, &holders, Some(500.0), &fleet));
    Ok(())
}
