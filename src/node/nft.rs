// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::HashSet,
    sync::PoisonError,
};

use anyhow::{Context, Result};
use metrics::gauge;
use tracing::{debug, warn};

use crate::{models::address::Address, node::Node};

impl Node {
    /// Loads the newline-delimited NFT-holder list. A missing file is a
    /// configuration error and fails startup.
    pub(crate) fn load_nft_holders(&self) -> Result<()> {
        let path = &self.params.nft_holders.filepath;
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read NFT holders file {path:?}"))?;

        let holders: HashSet<Address> = data
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(Address::new)
            .collect();

        if holders.is_empty() {
            warn!("no NFT holders data found");
        }
        debug!(count = holders.len(), "fetched NFT holders");
        gauge!("ct_nft_holders").set(holders.len() as f64);

        *self
            .nft_holders
            .write()
            .unwrap_or_else(PoisonError::into_inner) = holders;

        Ok(())
    }
}
