// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde_json::Value;

use crate::models::{address::Address, balance::Balance};

/// An on-chain multi-party wallet linked to one or more relay nodes.
///
/// `additional_balance` is not indexed; it is derived every economic tick
/// from investor allocations and EOA balances linked through the owners.
#[derive(Debug, Clone)]
pub struct Safe {
    pub address: Address,
    pub balance: Balance,
    pub allowance: Balance,
    pub owners: Vec<Address>,
    pub additional_balance: Balance,
}

impl Safe {
    pub fn total_balance(&self) -> Balance {
        self.balance
            .add(&self.additional_balance)
            .unwrap_or_else(|_| self.balance.clone())
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let address = Address::new(value.get("id")?.as_str()?);
        let balance = balance_field(value.get("balance")?.get("wxHoprBalance")?)?;
        let allowance = balance_field(value.get("allowance")?.get("wxHoprAllowance")?)?;
        let owners = value
            .get("owners")?
            .as_array()?
            .iter()
            .filter_map(|o| o.get("owner")?.get("id")?.as_str())
            .map(Address::new)
            .collect();

        Some(Self {
            address,
            balance,
            allowance,
            owners,
            additional_balance: Balance::zero("wxHOPR"),
        })
    }
}

/// A relay node registered in the safe registry.
#[derive(Debug, Clone)]
pub struct RegisteredNode {
    pub address: Address,
    pub safe: Safe,
}

impl RegisteredNode {
    pub fn from_value(value: &Value) -> Option<Self> {
        let address = Address::new(value.get("node")?.get("id")?.as_str()?);
        let safe = Safe::from_value(value.get("safe")?)?;
        Some(Self { address, safe })
    }
}

/// Rewards account: an address with the value of its redeemed tickets.
#[derive(Debug, Clone)]
pub struct Account {
    pub address: Address,
    pub redeemed_value: Balance,
}

impl Account {
    pub fn from_value(value: &Value) -> Option<Self> {
        let address = Address::new(value.get("id")?.as_str()?);
        let redeemed_value = balance_field(value.get("redeemedValue")?)?;
        Some(Self {
            address,
            redeemed_value,
        })
    }
}

/// Subgraph amounts arrive either as token-unit strings or bare numbers,
/// always denominated in wxHOPR.
fn balance_field(value: &Value) -> Option<Balance> {
    match value {
        Value::String(s) => format!("{s} wxHOPR").parse().ok(),
        Value::Number(n) => Balance::from_f64(n.as_f64()?, "wxHOPR").ok(),
        _ => None,
    }
}
