// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Result, ensure};

/// Collects `(url, token)` pairs for the fleet from `NODE_ADDRESS_*` /
/// `NODE_KEY_*` environment variables, matched by the sorted suffix order.
pub fn node_credentials() -> Result<Vec<(String, String)>> {
    let addresses = env_with_prefix("NODE_ADDRESS");
    let keys = env_with_prefix("NODE_KEY");

    ensure!(
        addresses.len() == keys.len(),
        "found {} NODE_ADDRESS_* variables but {} NODE_KEY_* variables",
        addresses.len(),
        keys.len()
    );
    ensure!(!addresses.is_empty(), "no NODE_ADDRESS_* variables set");

    Ok(addresses.into_iter().zip(keys).collect())
}

/// Values of all environment variables starting with `prefix`, sorted by
/// variable name for a stable pairing order.
fn env_with_prefix(prefix: &str) -> Vec<String> {
    let mut vars: Vec<(String, String)> = std::env::vars()
        .filter(|(key, _)| key.starts_with(prefix))
        .collect();
    vars.sort_by(|a, b| a.0.cmp(&b.0));
    vars.into_iter().map(|(_, value)| value).collect()
}
