// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use tokio::{
    net::UdpSocket,
    time::{Instant, timeout},
};
use tracing::debug;

use crate::models::{address::Address, message::MessageFormat};

/// A UDP session listener opened on a node, plus the local datagram socket
/// used to feed it.
///
/// The socket is bound only after the open-session API call succeeds, and is
/// released when the last handle to the session drops. The session map and
/// the in-flight send batches are the only owners.
#[derive(Debug, Deserialize)]
pub struct Session {
    pub ip: String,
    pub port: u16,
    pub protocol: String,
    pub target: Address,
    #[serde(rename = "hoprMtu")]
    pub mtu: usize,
    #[serde(rename = "surbLen")]
    pub surb_size: usize,

    #[serde(skip)]
    socket: OnceCell<UdpSocket>,
}

impl Session {
    /// Usable payload width of a single datagram.
    pub fn payload(&self) -> usize {
        self.mtu.saturating_sub(self.surb_size)
    }

    /// Path used to tear the listener down on the node.
    pub fn as_path(&self) -> String {
        format!("/session/{}/{}/{}", self.protocol, self.ip, self.port)
    }

    /// Binds the local datagram socket. At most once per session.
    pub async fn bind_socket(&self) -> Result<()> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .context("failed to bind session datagram socket")?;
        self.socket
            .set(socket)
            .map_err(|_| anyhow::anyhow!("session socket already bound"))
    }

    /// Drains response datagrams until `total_size` bytes or the timeout.
    ///
    /// Complete descriptors found in the stream are counted and their
    /// round-trip time recorded against the relayer; everything else is
    /// ignored. Returns the number of bytes read.
    pub async fn receive(
        &self,
        chunk_size: usize,
        total_size: usize,
        window: Duration,
    ) -> Result<usize> {
        let socket = self
            .socket
            .get()
            .context("session has no bound socket")?;

        let deadline = Instant::now() + window;
        let mut received: Vec<u8> = Vec::with_capacity(total_size);
        let mut chunk = vec![0u8; chunk_size.max(1)];

        while received.len() < total_size {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }

            match timeout(left, socket.recv_from(&mut chunk)).await {
                Ok(Ok((n, _))) => received.extend_from_slice(&chunk[..n]),
                Ok(Err(err)) => {
                    debug!(error = %err, "session receive failed");
                    break;
                },
                Err(_) => break,
            }
        }

        let now_ms = Utc::now().timestamp_millis();
        if let Ok(text) = std::str::from_utf8(&received) {
            for part in text.split('\0').filter(|part| !part.is_empty()) {
                let Ok(message) = MessageFormat::parse(part) else {
                    continue;
                };

                let rtt = (now_ms - message.timestamp_ms) as f64 / 1000.0;
                counter!(
                    "ct_messages_stats",
                    "type" => "received",
                    "relayer" => message.relayer.to_string()
                )
                .increment(1);
                histogram!("ct_messages_delays", "relayer" => message.relayer.to_string())
                    .record(rtt);
            }
        }

        Ok(received.len())
    }

    /// Writes one datagram towards the session listener.
    pub async fn send(&self, payload: &[u8]) -> Result<usize> {
        let socket = self
            .socket
            .get()
            .context("session has no bound socket")?;
        socket
            .send_to(payload, (self.ip.as_str(), self.port))
            .await
            .context("datagram send failed")
    }

    pub fn new(
        ip: impl Into<String>,
        port: u16,
        target: Address,
        mtu: usize,
        surb_size: usize,
    ) -> Self {
        Self {
            ip: ip.into(),
            port,
            protocol: "udp".to_string(),
            target,
            mtu,
            surb_size,
            socket: OnceCell::new(),
        }
    }
}
