// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use ct_orchestrator::models::{
    address::Address,
    message::{INDEX_RANGE, MessageError, MessageFormat},
};
use serial_test::serial;

fn stamped(relayer: &str, sender: &str, packet_size: usize) -> MessageFormat {
    let mut message = MessageFormat::new(Address::new(relayer));
    message.sender = Some(Address::new(sender));
    message.packet_size = packet_size;
    message
}

#[test]
#[serial]
fn test_encode_pads_to_packet_size() -> Result<()> {
    let message = stamped("0xaa", "0xbb", 64);
    let payload = message.encode()?;

    assert_eq!(payload.len(), 64);

    let header_len = payload.iter().position(|b| *b == 0).unwrap_or(payload.len());
    assert!(header_len > 0);
    assert!(payload[header_len..].iter().all(|b| *b == 0));

    let text = std::str::from_utf8(&payload[..header_len])?;
    assert_eq!(text.split(' ').count(), 7);
    Ok(())
}

#[test]
#[serial]
fn test_encode_rejects_oversized_header() {
    // Tokens alone exceed a 16-byte packet.
    let message = stamped("0xaaaaaaaaaaaaaaaa", "0xbbbbbbbbbbbbbbbb", 16);

    assert!(matches!(
        message.encode(),
        Err(MessageError::TooLarge { packet_size: 16, .. })
    ));
}

#[test]
#[serial]
fn test_encode_requires_sender() {
    let message = MessageFormat::new(Address::new("0xaa"));
    assert_eq!(message.encode(), Err(MessageError::MissingSender));
}

#[test]
#[serial]
fn test_parse_inverts_encode() -> Result<()> {
    let message = stamped("0xaa", "0xbb", 128);
    let payload = message.encode()?;

    let parsed = MessageFormat::parse(std::str::from_utf8(&payload)?)?;
    assert_eq!(parsed, message);
    Ok(())
}

#[test]
#[serial]
fn test_parse_rejects_short_input() {
    assert!(MessageFormat::parse("").is_err());
    assert!(MessageFormat::parse("one two three").is_err());
}

#[test]
#[serial]
fn test_index_is_monotonic_modulo_range() {
    let first = MessageFormat::new(Address::new("0xaa")).index;
    let second = MessageFormat::new(Address::new("0xaa")).index;

    assert_eq!(second, (first + 1) % INDEX_RANGE);
    assert!(first < INDEX_RANGE);
    assert!(second < INDEX_RANGE);
}
