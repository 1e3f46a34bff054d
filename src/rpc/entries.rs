// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::HashSet;

use crate::models::{address::Address, balance::Balance};

/// Vesting allocation of an investor address, linked to the safes the
/// address co-owns. The linkage is recomputed every economic tick from the
/// flat safe registry, keyed by address.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub address: Address,
    pub schedule: String,
    pub amount: Balance,
    pub claimed: Balance,
    pub linked_safes: HashSet<Address>,
}

impl Allocation {
    pub fn new(address: Address, schedule: String, amount: Balance, claimed: Balance) -> Self {
        Self {
            address,
            schedule,
            amount,
            claimed,
            linked_safes: HashSet::new(),
        }
    }

    pub fn unclaimed(&self) -> Balance {
        self.amount
            .sub(&self.claimed)
            .unwrap_or_else(|_| Balance::zero(self.amount.unit()))
    }

    pub fn num_linked_safes(&self) -> usize {
        self.linked_safes.len()
    }
}

/// Token balance held directly by an investor EOA.
#[derive(Debug, Clone)]
pub struct ExternalBalance {
    pub address: Address,
    pub balance: Balance,
    pub linked_safes: HashSet<Address>,
}

impl ExternalBalance {
    pub fn new(address: Address, balance: Balance) -> Self {
        Self {
            address,
            balance,
            linked_safes: HashSet::new(),
        }
    }

    pub fn num_linked_safes(&self) -> usize {
        self.linked_safes.len()
    }
}
