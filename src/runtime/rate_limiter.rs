// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{collections::HashMap, time::Duration};

use tokio::time::Instant;
use tracing::debug;

use crate::models::address::Address;

/// Exponential-backoff gate on session-open attempts, per relayer.
///
/// Failed opens progressively increase the wait before the next attempt:
/// `base_delay`, `base_delay * 2`, `base_delay * 4`, ... capped at
/// `max_delay`. A success clears all tracking so the next attempt is allowed
/// immediately. All timing is monotonic; wall-clock jumps never affect
/// gating.
#[derive(Debug)]
pub struct SessionRateLimiter {
    base_delay: Duration,
    max_delay: Duration,
    failures: HashMap<Address, u32>,
    last_attempt: HashMap<Address, Instant>,
}

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

impl Default for SessionRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }
}

impl SessionRateLimiter {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            failures: HashMap::new(),
            last_attempt: HashMap::new(),
        }
    }

    /// Wait required after `failures` consecutive failures: `base_delay`
    /// after the first, doubling with each additional one, capped at
    /// `max_delay`. Non-decreasing in the failure count.
    pub fn required_wait(&self, failures: u32) -> Duration {
        let exp = 2f64.powi(failures.saturating_sub(1).min(63) as i32);
        self.base_delay.mul_f64(exp).min(self.max_delay)
    }

    /// Whether an attempt towards `relayer` is currently allowed, and the
    /// remaining wait if it is not.
    pub fn can_attempt(&self, relayer: &Address) -> (bool, Option<Duration>) {
        self.can_attempt_at(relayer, Instant::now())
    }

    pub fn can_attempt_at(
        &self,
        relayer: &Address,
        now: Instant,
    ) -> (bool, Option<Duration>) {
        let Some(last) = self.last_attempt.get(relayer) else {
            return (true, None);
        };

        let failures = self.failures.get(relayer).copied().unwrap_or(0);
        let required = self.required_wait(failures);
        let elapsed = now.saturating_duration_since(*last);

        if elapsed >= required {
            (true, None)
        } else {
            (false, Some(required - elapsed))
        }
    }

    /// Stamps the attempt time. Call immediately before the session-open I/O.
    pub fn record_attempt(&mut self, relayer: &Address) {
        self.record_attempt_at(relayer, Instant::now());
    }

    pub fn record_attempt_at(&mut self, relayer: &Address, now: Instant) {
        self.last_attempt.insert(relayer.clone(), now);
    }

    pub fn record_failure(&mut self, relayer: &Address) {
        let failures = {
            let entry = self.failures.entry(relayer.clone()).or_insert(0);
            *entry += 1;
            *entry
        };

        debug!(
            relayer = %relayer,
            failures,
            next_delay = ?self.required_wait(failures),
            "session opening failed, applying backoff"
        );
    }

    /// Clears all tracking for `relayer`, allowing immediate future attempts.
    pub fn record_success(&mut self, relayer: &Address) {
        if let Some(failures) = self.failures.remove(relayer) {
            debug!(relayer = %relayer, previous_failures = failures, "session opened, clearing backoff");
        }
        self.last_attempt.remove(relayer);
    }

    /// Forgets one relayer, or everything.
    pub fn reset(&mut self, relayer: Option<&Address>) {
        match relayer {
            Some(relayer) => {
                self.failures.remove(relayer);
                self.last_attempt.remove(relayer);
            },
            None => {
                self.failures.clear();
                self.last_attempt.clear();
            },
        }
    }

    /// Failure count currently tracked for `relayer`. Zero exactly when the
    /// relayer is untracked.
    pub fn failure_count(&self, relayer: &Address) -> u32 {
        self.failures.get(relayer).copied().unwrap_or(0)
    }

    pub fn is_tracked(&self, relayer: &Address) -> bool {
        self.failures.contains_key(relayer)
    }
}
