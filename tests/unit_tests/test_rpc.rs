// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use ct_orchestrator::{
    models::{address::Address, balance::Balance},
    rpc::{
        entries::Allocation,
        provider::{balance_of_calldata, claim_status_calldata},
    },
};

#[test]
fn test_balance_of_calldata_layout() {
    let address = Address::new("0xAbCdEf0123456789aBcDeF0123456789AbCdEf01");
    let data = balance_of_calldata(&address);

    assert!(data.starts_with("0x70a08231"));
    // Selector + one 32-byte word.
    assert_eq!(data.len(), 10 + 64);
    // Right-aligned address over zeroes, lowercased.
    assert!(data.ends_with("abcdef0123456789abcdef0123456789abcdef01"));
    assert!(data[10..34].chars().all(|c| c == '0'));
}

#[test]
fn test_claim_status_calldata_layout() {
    let address = Address::new("0xAbCdEf0123456789aBcDeF0123456789AbCdEf01");
    let data = claim_status_calldata(&address, "team");

    assert!(data.starts_with("0xc31cd7d7"));
    // Selector + address word + offset word + length word + schedule word.
    assert_eq!(data.len(), 10 + 4 * 64);

    let words: Vec<&str> = (0..4).map(|i| &data[10 + i * 64..10 + (i + 1) * 64]).collect();

    // Offset to the string block is always 0x40.
    assert_eq!(u64::from_str_radix(words[1], 16).expect("offset"), 64);
    // Length word carries the schedule byte length.
    assert_eq!(u64::from_str_radix(words[2], 16).expect("length"), 4);
    // Schedule bytes ("team") right-padded with zeroes.
    assert!(words[3].starts_with("7465616d"));
    assert!(words[3][8..].chars().all(|c| c == '0'));
}

#[test]
fn test_allocation_unclaimed_amount() -> Result<()> {
    let allocation = Allocation::new(
        Address::new("0xaa"),
        "team".into(),
        "100 wxHOPR".parse()?,
        "40 wxHOPR".parse()?,
    );

    assert_eq!(allocation.unclaimed(), "60 wxHOPR".parse::<Balance>()?);
    assert_eq!(allocation.num_linked_safes(), 0);
    Ok(())
}
