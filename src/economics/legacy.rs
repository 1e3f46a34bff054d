// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::Deserialize;

/// Piecewise stake transform coefficients.
///
/// `l` is the lower stake bound, `c` the linear-regime cap, `a` the linear
/// slope, `b` the root degree of the saturating tail.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyCoefficients {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub l: f64,
}

/// Legacy reward model: linear up to `c`, then a `1/b`-th root tail.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyParams {
    pub proportion: f64,
    pub apr: f64,
    pub coefficients: LegacyCoefficients,
}

impl LegacyParams {
    /// The stake transform, evaluated with `c` shifted by the peer's already
    /// redeemed rewards so that paid-out value does not earn twice.
    pub fn transformed_stake(&self, stake: f64, redeemed_rewards: f64) -> f64 {
        let LegacyCoefficients { a, b, c, l } = self.coefficients;
        let c = c + redeemed_rewards;

        if stake >= l && stake <= c {
            a * stake
        } else if stake > c {
            a * c + (stake - c).powf(1.0 / b)
        } else {
            0.0
        }
    }

    /// Yearly message budget a peer with `stake` should receive.
    pub fn yearly_message_count(
        &self,
        stake: f64,
        ticket_price: f64,
        redeemed_rewards: f64,
    ) -> f64 {
        if ticket_price <= 0.0 {
            return 0.0;
        }

        let rewards = self.apr * self.transformed_stake(stake, redeemed_rewards) / 100.0;
        (rewards / ticket_price * self.proportion).max(0.0)
    }
}
