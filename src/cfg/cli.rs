// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Picks the orchestrator config file: first CLI argument, `CONFIG_FILE` env
/// var, or the provided default, in that order.
pub fn config_path_from_args(default: &str) -> Result<PathBuf> {
    let raw = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("CONFIG_FILE").ok())
        .unwrap_or_else(|| default.to_string());

    resolve_config_path(&raw)
}

pub fn resolve_config_path(rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);

    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(p)
    };

    abs.canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))
}
