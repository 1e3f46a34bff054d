// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::Deserialize;
use tracing::debug;

/// One sigmoid bucket over a network-level metric.
#[derive(Debug, Clone, Deserialize)]
pub struct Bucket {
    pub flatness: f64,
    pub skewness: f64,
    pub upperbound: f64,
    pub offset: f64,
}

impl Bucket {
    /// Bucket APR at metric value `x`, clamped to be non-negative. Outside
    /// the model's domain (`x <= 0` or `(upperbound/x)^skewness <= 1`) there
    /// is no defined value.
    pub fn apr(&self, x: f64) -> Option<f64> {
        if x <= 0.0 {
            return None;
        }

        let inner = (self.upperbound / x).powf(self.skewness) - 1.0;
        if inner <= 0.0 {
            return None;
        }

        Some((inner.ln() * self.flatness + self.offset).max(0.0))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Buckets {
    pub economic_security: Bucket,
    pub network_capacity: Bucket,
}

/// Network-level metric values the buckets are evaluated at.
#[derive(Debug, Clone, Copy)]
pub struct SigmoidInputs {
    pub economic_security: f64,
    pub network_capacity: f64,
}

/// Sigmoid reward model: the overall APR is the geometric mean of the bucket
/// APRs plus an offset, capped at `max_apr`.
#[derive(Debug, Clone, Deserialize)]
pub struct SigmoidParams {
    pub proportion: f64,
    pub max_apr: f64,
    pub offset: f64,
    pub buckets: Buckets,
    /// Peer-count denominator of the network-capacity metric.
    pub network_capacity: u64,
    /// Stake denominator of the economic-security metric.
    pub total_token_supply: f64,
}

impl SigmoidParams {
    pub fn apr(&self, inputs: SigmoidInputs) -> f64 {
        // The buckets are evaluated crosswise: the network-capacity curve at
        // the economic-security value and the economic-security curve at the
        // network-capacity value. Reward parity depends on this pairing.
        let pairs = [
            (&self.buckets.network_capacity, inputs.economic_security),
            (&self.buckets.economic_security, inputs.network_capacity),
        ];

        let mut product = 1.0;
        for (bucket, x) in pairs {
            match bucket.apr(x) {
                Some(apr) => product *= apr,
                None => {
                    debug!(x, "bucket outside model domain, APR collapses to 0");
                    return 0.0;
                },
            }
        }

        let apr = product.powf(1.0 / pairs.len() as f64) + self.offset;
        apr.min(self.max_apr)
    }

    /// Yearly message budget a peer with `stake` should receive.
    pub fn yearly_message_count(
        &self,
        stake: f64,
        ticket_price: f64,
        inputs: SigmoidInputs,
    ) -> f64 {
        if ticket_price <= 0.0 {
            return 0.0;
        }

        let rewards = self.apr(inputs) * stake / 100.0;
        (rewards / ticket_price * self.proportion).max(0.0)
    }
}
