// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use ct_orchestrator::{
    cfg::config::SubgraphEndpointParams,
    models::address::Address,
    subgraph::{
        entries::{Account, RegisteredNode, Safe},
        provider::{GraphProvider, Mode},
    },
};
use serde_json::json;

fn endpoint() -> SubgraphEndpointParams {
    SubgraphEndpointParams {
        query_id: "QmSafesQueryId".into(),
        slug: "hopr-nodes".into(),
        version: None,
        inputs: serde_json::Map::new(),
    }
}

#[test]
fn test_url_construction() -> Result<()> {
    let provider = GraphProvider::safes(42, "deployerkey", &endpoint())?;

    assert_eq!(
        provider.default_url(),
        "https://gateway-arbitrum.network.thegraph.com/api/deployerkey/subgraphs/id/QmSafesQueryId"
    );
    assert_eq!(
        provider.backup_url(),
        "https://api.studio.thegraph.com/query/42/hopr-nodes/version/latest"
    );
    assert_eq!(provider.mode(), Mode::Default);
    Ok(())
}

#[test]
fn test_pinned_version_in_backup_url() -> Result<()> {
    let mut params = endpoint();
    params.version = Some("v0.0.9".into());
    let provider = GraphProvider::rewards(42, "key", &params)?;

    assert_eq!(
        provider.backup_url(),
        "https://api.studio.thegraph.com/query/42/hopr-nodes/v0.0.9"
    );
    Ok(())
}

#[test]
fn test_mode_mapping() {
    assert_eq!(Mode::from_config("default"), Mode::Default);
    assert_eq!(Mode::from_config("backup"), Mode::Backup);
    assert_eq!(Mode::from_config("anything-else"), Mode::None);
    assert_eq!(Mode::Default.to_int(), 0);
    assert_eq!(Mode::Backup.to_int(), 1);
    assert_eq!(Mode::None.to_int(), -1);
}

#[test]
fn test_safe_entry_parsing() {
    let value = json!({
        "id": "0xSAFE",
        "balance": { "wxHoprBalance": "12.5" },
        "allowance": { "wxHoprAllowance": "1" },
        "owners": [
            { "owner": { "id": "0xOwner1" } },
            { "owner": { "id": "0xOwner2" } },
        ],
    });

    let safe = Safe::from_value(&value).expect("parses");
    assert_eq!(safe.address, Address::new("0xsafe"));
    assert_eq!(safe.balance.to_string(), "12.5 wxHOPR");
    assert_eq!(safe.owners.len(), 2);
    assert_eq!(safe.total_balance(), safe.balance);
}

#[test]
fn test_registered_node_parsing() {
    let value = json!({
        "node": { "id": "0xNodeAddr" },
        "safe": {
            "id": "0xsafe",
            "balance": { "wxHoprBalance": "1" },
            "allowance": { "wxHoprAllowance": "1" },
            "owners": [],
        },
    });

    let node = RegisteredNode::from_value(&value).expect("parses");
    assert_eq!(node.address, Address::new("0xnodeaddr"));
    assert_eq!(node.safe.address, Address::new("0xsafe"));
}

#[test]
fn test_account_parsing_accepts_numbers_and_strings() {
    let from_string = Account::from_value(&json!({ "id": "0xacc", "redeemedValue": "3.5" }))
        .expect("string value");
    assert_eq!(from_string.redeemed_value.to_string(), "3.5 wxHOPR");

    let from_number = Account::from_value(&json!({ "id": "0xacc", "redeemedValue": 2 }))
        .expect("numeric value");
    assert_eq!(from_number.redeemed_value.to_string(), "2 wxHOPR");
}

#[test]
fn test_malformed_entries_are_skipped() {
    assert!(Safe::from_value(&json!({ "id": "0xsafe" })).is_none());
    assert!(Account::from_value(&json!({ "redeemedValue": "1" })).is_none());
    assert!(RegisteredNode::from_value(&json!({ "node": {} })).is_none());
}
