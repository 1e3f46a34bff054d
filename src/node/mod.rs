// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub mod channels;
pub mod economy;
pub mod helper;
pub mod nft;
pub mod peers;
pub mod rpc_tasks;
pub mod sessions;
pub mod state;
pub mod subgraph_tasks;

use std::{
    collections::{HashMap, HashSet},
    future::Future,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::Result;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tokio::{sync::Mutex, time::Instant};
use tracing::warn;

use crate::{
    api::client::NodeApi,
    cfg::config::Parameters,
    models::{
        address::Address, balance::Balance, channel::ChannelGraph, peer::Peer, session::Session,
    },
    rpc::entries::{Allocation, ExternalBalance},
    runtime::{
        asyncloop::AsyncLoop,
        keepalive::{FlagValue, run_keepalive},
        lockedvar::LockedVar,
        message_queue::MessageQueue,
        rate_limiter::SessionRateLimiter,
    },
    subgraph::{entries::RegisteredNode, provider::GraphProvider},
};

/// Immutable view over the currently reachable peer set, rebuilt by the
/// peers sweep in the same non-suspending region that mutates the set.
#[derive(Debug, Default)]
pub struct PeerView {
    addresses: HashSet<Address>,
    reachable: OnceCell<HashSet<Address>>,
}

impl PeerView {
    pub fn new(addresses: HashSet<Address>) -> Self {
        Self {
            addresses,
            reachable: OnceCell::new(),
        }
    }

    pub fn addresses(&self) -> &HashSet<Address> {
        &self.addresses
    }

    /// Fleet destinations that are currently reachable peers.
    pub fn reachable_destinations(&self, destinations: &[Address]) -> &HashSet<Address> {
        self.reachable.get_or_init(|| {
            destinations
                .iter()
                .filter(|d| self.addresses.contains(*d))
                .cloned()
                .collect()
        })
    }
}

pub(crate) struct SubgraphProviders {
    pub safes: GraphProvider,
    pub rewards: GraphProvider,
}

/// One relay node under orchestration.
///
/// Owns every piece of state derived from that node: the peer set and its
/// history, the channel snapshot, the session and grace-period maps, the
/// rate limiter and the data cells filled by the periodic pulls. Each field
/// has exactly one writing task; everything else only reads.
pub struct Node {
    pub api: NodeApi,
    pub url: String,
    /// Queue partition this node consumes.
    index: usize,

    params: Arc<Parameters>,
    queue: Arc<MessageQueue>,
    tasks: Arc<AsyncLoop>,

    address: OnceCell<Address>,
    session_destinations: Vec<Address>,

    peers: DashMap<Address, Arc<Peer>>,
    peer_history: DashMap<Address, Instant>,
    peer_view: RwLock<Arc<PeerView>>,

    channels: RwLock<Option<Arc<ChannelGraph>>>,
    topology: LockedVar<HashMap<Address, Balance>>,

    sessions: DashMap<Address, Arc<Session>>,
    session_grace: DashMap<Address, Instant>,
    rate_limiter: Mutex<SessionRateLimiter>,

    providers: OnceCell<SubgraphProviders>,
    registered_nodes: LockedVar<Vec<RegisteredNode>>,
    peers_rewards: LockedVar<HashMap<Address, Balance>>,
    allocations: LockedVar<Vec<Allocation>>,
    eoa_balances: LockedVar<Vec<ExternalBalance>>,
    nft_holders: RwLock<HashSet<Address>>,
    ticket_price: RwLock<Option<Balance>>,

    connected: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

impl Node {
    pub fn new(
        url: &str,
        token: &str,
        index: usize,
        params: Arc<Parameters>,
        queue: Arc<MessageQueue>,
        tasks: Arc<AsyncLoop>,
    ) -> Result<Arc<Self>> {
        let api = NodeApi::new(url, token)?;
        let session_destinations = params.sessions.destinations();

        Ok(Arc::new(Self {
            api,
            url: url.to_string(),
            index,
            params,
            queue,
            tasks,
            address: OnceCell::new(),
            session_destinations,
            peers: DashMap::new(),
            peer_history: DashMap::new(),
            peer_view: RwLock::new(Arc::new(PeerView::default())),
            channels: RwLock::new(None),
            topology: LockedVar::new("topology", HashMap::new()),
            sessions: DashMap::new(),
            session_grace: DashMap::new(),
            rate_limiter: Mutex::new(SessionRateLimiter::default()),
            providers: OnceCell::new(),
            registered_nodes: LockedVar::new("registered_nodes", Vec::new()),
            peers_rewards: LockedVar::new("peers_rewards", HashMap::new()),
            allocations: LockedVar::new("allocations", Vec::new()),
            eoa_balances: LockedVar::new("eoa_balances", Vec::new()),
            nft_holders: RwLock::new(HashSet::new()),
            ticket_price: RwLock::new(None),
            connected: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(true)),
        }))
    }

    /// Bootstraps the node: own address, subgraph providers, the NFT holder
    /// list, then every keepalive task from the registration list.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if let Err(err) = self.retrieve_address().await {
            warn!(url = %self.url, error = %err, "could not retrieve address yet");
        }

        self.build_providers()?;
        self.load_nft_holders()?;
        self.spawn_keepalives();

        Ok(())
    }

    /// Flips the running flag; every keepalive wrapper and peer emission
    /// task checks it between iterations.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        for entry in self.peers.iter() {
            entry.value().stop_emission();
        }
    }

    pub fn address(&self) -> Option<&Address> {
        self.address.get()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub(crate) fn peer_view(&self) -> Arc<PeerView> {
        Arc::clone(
            &self
                .peer_view
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    pub(crate) fn store_peer_view(&self, addresses: HashSet<Address>) {
        *self
            .peer_view
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(PeerView::new(addresses));
    }

    /// Explicit registration list of every periodic task, replacing the
    /// reflection-driven scheduling of old deployments. Guarded tasks skip
    /// iterations while the node is unhealthy.
    fn spawn_keepalives(self: &Arc<Self>) {
        let flags = self.params.flags.node.clone();

        self.keepalive("healthcheck", flags.healthcheck, false, |n| async move {
            n.healthcheck().await
        });
        self.keepalive(
            "ticket_parameters",
            flags.ticket_parameters,
            false,
            |n| async move { n.ticket_parameters().await },
        );
        self.keepalive(
            "retrieve_peers",
            flags.retrieve_peers,
            true,
            |n| async move { n.retrieve_peers().await },
        );
        self.keepalive(
            "retrieve_channels",
            flags.retrieve_channels,
            true,
            |n| async move { n.retrieve_channels().await },
        );
        self.keepalive(
            "retrieve_balances",
            flags.retrieve_balances,
            true,
            |n| async move { n.retrieve_balances().await },
        );

        self.keepalive("open_channels", flags.open_channels, true, |n| async move {
            n.open_channels().await
        });
        self.keepalive("fund_channels", flags.fund_channels, true, |n| async move {
            n.fund_channels().await
        });
        self.keepalive(
            "close_old_channels",
            flags.close_old_channels,
            true,
            |n| async move { n.close_old_channels().await },
        );
        self.keepalive(
            "close_pending_channels",
            flags.close_pending_channels,
            true,
            |n| async move { n.close_pending_channels().await },
        );
        self.keepalive(
            "close_incoming_channels",
            flags.close_incoming_channels,
            true,
            |n| async move { n.close_incoming_channels().await },
        );
        self.keepalive(
            "get_total_channel_funds",
            flags.get_total_channel_funds,
            true,
            |n| async move { n.get_total_channel_funds().await },
        );

        self.keepalive(
            "observe_message_queue",
            flags.observe_message_queue,
            true,
            |n| async move { n.observe_message_queue().await },
        );
        self.keepalive(
            "maintain_sessions",
            flags.maintain_sessions,
            true,
            |n| async move { n.maintain_sessions().await },
        );

        self.keepalive(
            "rotate_subgraphs",
            flags.rotate_subgraphs,
            false,
            |n| async move { n.rotate_subgraphs().await },
        );
        self.keepalive("peers_rewards", flags.peers_rewards, false, |n| async move {
            n.peers_rewards().await
        });
        self.keepalive(
            "registered_nodes",
            flags.registered_nodes,
            false,
            |n| async move { n.registered_nodes().await },
        );
        self.keepalive("allocations", flags.allocations, false, |n| async move {
            n.allocations().await
        });
        self.keepalive("eoa_balances", flags.eoa_balances, false, |n| async move {
            n.eoa_balances().await
        });

        self.keepalive(
            "apply_economic_model",
            flags.apply_economic_model,
            false,
            |n| async move { n.apply_economic_model().await },
        );
    }

    fn keepalive<F, Fut>(
        self: &Arc<Self>,
        name: &'static str,
        flag: Option<FlagValue>,
        connect_guarded: bool,
        task: F,
    ) where
        F: Fn(Arc<Node>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let node = Arc::clone(self);
        let cancel = self.tasks.cancel_token();
        let running = Arc::clone(&self.running);
        let connected = connect_guarded.then(|| Arc::clone(&self.connected));

        self.tasks.spawn(async move {
            let body = {
                let node = Arc::clone(&node);
                move || task(Arc::clone(&node))
            };
            run_keepalive(name, flag.into(), cancel, running, connected, body).await;
        });
    }
}
