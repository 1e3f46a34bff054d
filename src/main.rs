// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::{Context, Result};
use ct_orchestrator::{
    cfg::{
        cli::config_path_from_args,
        config::Parameters,
        logger::init_logger,
    },
    node::Node,
    runtime::{
        asyncloop::AsyncLoop,
        message_queue::{DEFAULT_PARTITIONS, MessageQueue},
    },
    utils::node_credentials,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let _logger_guard = init_logger("config/logger.yaml")?;

    let config_path = config_path_from_args("config/ct.yaml")?;
    let params = Arc::new(
        Parameters::load_from_file(&config_path)
            .with_context(|| format!("failed to load configuration from {config_path:?}"))?,
    );
    info!(environment = params.environment, "parameters loaded");

    match PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], 8080))
        .install()
    {
        Ok(()) => info!("metrics exporter started on port 8080"),
        Err(err) => warn!(error = %err, "could not start the metrics exporter on port 8080"),
    }

    let queue = Arc::new(MessageQueue::new(DEFAULT_PARTITIONS));
    let tasks = Arc::new(AsyncLoop::new());

    let nodes: Vec<Arc<Node>> = node_credentials()?
        .into_iter()
        .enumerate()
        .map(|(index, (url, token))| {
            Node::new(&url, &token, index, Arc::clone(&params), Arc::clone(&queue), Arc::clone(&tasks))
        })
        .collect::<Result<_>>()?;
    info!(count = nodes.len(), "orchestrating relay nodes");

    let startup = {
        let nodes = nodes.clone();
        async move {
            for node in &nodes {
                node.start().await?;
            }
            anyhow::Ok(())
        }
    };

    tasks
        .run(startup, || {
            for node in &nodes {
                node.stop();
            }
        })
        .await
}
