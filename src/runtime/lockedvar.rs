// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{collections::HashMap, hash::Hash};

use tokio::sync::Mutex;
use tracing::trace;

/// A named cell for the few values that are genuinely shared between a
/// periodic puller and independent readers (registered nodes, rewards,
/// allocations, EOA balances, topology links).
///
/// Every access is serialized by the cell's own mutex and never held across
/// an await in caller code: `get` clones the value out. Type confusion the
/// dynamic original had to police at runtime is unrepresentable here; the
/// merge-only-on-maps rule is carried by the [`Merge`] bound on `update`.
#[derive(Debug)]
pub struct LockedVar<T> {
    name: &'static str,
    inner: Mutex<T>,
}

impl<T: Clone> LockedVar<T> {
    pub fn new(name: &'static str, value: T) -> Self {
        Self {
            name,
            inner: Mutex::new(value),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn get(&self) -> T {
        self.inner.lock().await.clone()
    }

    pub async fn set(&self, value: T) {
        trace!(cell = self.name, "replacing locked value");
        *self.inner.lock().await = value;
    }
}

impl<T: Clone + Merge> LockedVar<T> {
    /// Merges `value` into the current one instead of replacing it.
    pub async fn update(&self, value: T) {
        trace!(cell = self.name, "merging into locked value");
        self.inner.lock().await.merge(value);
    }
}

/// Merge-into semantics for map-typed cells.
pub trait Merge {
    fn merge(&mut self, other: Self);
}

impl<K: Eq + Hash, V> Merge for HashMap<K, V> {
    fn merge(&mut self, other: Self) {
        self.extend(other);
    }
}
