// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Fire-and-forget channel operations.
//!
//! Each helper performs one API call, logs the outcome and bumps the
//! operation counters. Failures are not retried here: the next
//! reconciliation tick re-derives the work from fresh state.

use metrics::counter;
use tracing::{debug, info, warn};

use crate::{
    api::client::NodeApi,
    models::{address::Address, balance::Balance, channel::Channel},
};

pub(crate) async fn open_channel(api: NodeApi, address: Address, amount: Balance) {
    debug!(to = %address, amount = %amount, "opening channel");

    match api.open_channel(&address, &amount).await {
        Ok(opened) => {
            info!(to = %address, channel = %opened.channel_id, "opened channel");
            counter!("ct_channel_operation", "op" => "open", "success" => "yes").increment(1);
        },
        Err(err) => {
            warn!(to = %address, error = %err, "failed to open channel");
            counter!("ct_channel_operation", "op" => "open", "success" => "no").increment(1);
        },
    }
}

pub(crate) async fn fund_channel(api: NodeApi, channel: Channel, amount: Balance) {
    debug!(channel = %channel.id, amount = %amount, "funding channel");

    match api.fund_channel(&channel.id, &amount).await {
        Ok(true) => {
            info!(channel = %channel.id, "funded channel");
            counter!("ct_channel_operation", "op" => "fund", "success" => "yes").increment(1);
        },
        Ok(false) => {
            warn!(channel = %channel.id, "failed to fund channel");
            counter!("ct_channel_operation", "op" => "fund", "success" => "no").increment(1);
        },
        Err(err) => {
            warn!(channel = %channel.id, error = %err, "failed to fund channel");
            counter!("ct_channel_operation", "op" => "fund", "success" => "no").increment(1);
        },
    }
}

pub(crate) async fn close_channel(api: NodeApi, channel: Channel, reason: &'static str) {
    debug!(channel = %channel.id, reason, "closing channel");

    match api.close_channel(&channel.id).await {
        Ok(true) => {
            info!(channel = %channel.id, reason, "closed channel");
            counter!("ct_channel_operation", "op" => reason, "success" => "yes").increment(1);
        },
        Ok(false) => {
            warn!(channel = %channel.id, reason, "failed to close channel");
            counter!("ct_channel_operation", "op" => reason, "success" => "no").increment(1);
        },
        Err(err) => {
            warn!(channel = %channel.id, reason, error = %err, "failed to close channel");
            counter!("ct_channel_operation", "op" => reason, "success" => "no").increment(1);
        },
    }
}
