// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{BufMut, Bytes, BytesMut};
use chrono::Utc;
use thiserror::Error;

use crate::models::address::Address;

/// Process-wide monotonic message index, wrapped modulo [`INDEX_RANGE`].
static MESSAGE_INDEX: AtomicU64 = AtomicU64::new(0);

pub const INDEX_RANGE: u64 = 100_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("encoded message exceeds packet size ({encoded} > {packet_size})")]
    TooLarge { encoded: usize, packet_size: usize },
    #[error("message has no sender stamped")]
    MissingSender,
    #[error("malformed message: `{0}`")]
    Malformed(String),
}

/// A cover-traffic message descriptor.
///
/// The wire form is seven space-separated tokens
/// `relayer sender packet_size batch_size index inner_index timestamp`,
/// UTF-8 encoded and right-padded with NUL bytes to exactly `packet_size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFormat {
    pub relayer: Address,
    pub sender: Option<Address>,
    pub packet_size: usize,
    pub batch_size: usize,
    pub index: u64,
    pub inner_index: u64,
    pub timestamp_ms: i64,
}

impl MessageFormat {
    /// New descriptor naming `relayer`; sender and packet size are stamped by
    /// the dispatch path once the session is known.
    pub fn new(relayer: Address) -> Self {
        Self {
            relayer,
            sender: None,
            packet_size: 0,
            batch_size: 1,
            index: next_index(),
            inner_index: 1,
            timestamp_ms: Utc::now().timestamp_millis(),
        }
    }

    fn header(&self) -> Result<String, MessageError> {
        let sender = self.sender.as_ref().ok_or(MessageError::MissingSender)?;
        Ok(format!(
            "{} {} {} {} {} {} {}",
            self.relayer,
            sender,
            self.packet_size,
            self.batch_size,
            self.index,
            self.inner_index,
            self.timestamp_ms
        ))
    }

    /// Serialized datagram payload: the header right-padded with NUL bytes to
    /// `packet_size`. Headers that do not fit are rejected.
    pub fn encode(&self) -> Result<Bytes, MessageError> {
        let header = self.header()?;
        let encoded = header.as_bytes();

        if encoded.len() > self.packet_size {
            return Err(MessageError::TooLarge {
                encoded: encoded.len(),
                packet_size: self.packet_size,
            });
        }

        let mut out = BytesMut::with_capacity(self.packet_size);
        out.put_slice(encoded);
        out.put_bytes(0, self.packet_size - encoded.len());
        Ok(out.freeze())
    }

    /// Inverse of [`Self::encode`] minus the padding, for received datagrams.
    pub fn parse(input: &str) -> Result<Self, MessageError> {
        let trimmed = input.trim_end_matches('\0');
        let malformed = || MessageError::Malformed(input.to_string());

        let tokens: Vec<&str> = trimmed.split(' ').collect();
        let [relayer, sender, packet_size, batch_size, index, inner_index, timestamp] =
            tokens.as_slice()
        else {
            return Err(malformed());
        };

        Ok(Self {
            relayer: Address::new(relayer),
            sender: Some(Address::new(sender)),
            packet_size: packet_size.parse().map_err(|_| malformed())?,
            batch_size: batch_size.parse().map_err(|_| malformed())?,
            index: index.parse().map_err(|_| malformed())?,
            inner_index: inner_index.parse().map_err(|_| malformed())?,
            timestamp_ms: timestamp.parse().map_err(|_| malformed())?,
        })
    }
}

fn next_index() -> u64 {
    MESSAGE_INDEX.fetch_add(1, Ordering::Relaxed) % INDEX_RANGE
}
