// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use anyhow::Result;
use dashmap::mapref::entry::Entry;
use metrics::counter;
use rand::prelude::IndexedRandom;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{
    api::responses::SessionOutcome,
    models::{address::Address, message::MessageFormat, session::Session},
    node::Node,
};

/// How long a session survives its relayer being unreachable.
pub const SESSION_GRACE_PERIOD: Duration = Duration::from_secs(60);

const SESSION_LISTEN_HOST: &str = "127.0.0.1:0";

impl Node {
    /// One dispatch iteration: pop a descriptor from this node's partition,
    /// bind it to a session (opening one if needed) and hand the datagrams
    /// to a detached send task.
    pub(crate) async fn observe_message_queue(&self) -> Result<()> {
        let Some(mut message) = self.queue.get(self.index).await else {
            return Ok(());
        };

        let Some(graph) = self.channel_graph() else {
            return Ok(());
        };
        if !graph
            .outgoing_not_closed()
            .iter()
            .any(|c| c.destination == message.relayer)
        {
            debug!(relayer = %message.relayer, "no channel towards relayer, dropping message");
            return Ok(());
        }

        let Some(destination) = self.pick_session_destination(&message.relayer) else {
            debug!("no valid session destination found");
            return Ok(());
        };

        let existing = self
            .sessions
            .get(&message.relayer)
            .map(|entry| Arc::clone(entry.value()));
        let session = match existing {
            Some(session) => session,
            None => match self.open_session(&message.relayer, destination).await {
                Some(session) => session,
                None => return Ok(()),
            },
        };

        let Some(own) = self.address().cloned() else {
            return Ok(());
        };
        message.sender = Some(own);
        message.packet_size = session.payload();

        self.tasks.spawn_detached(send_batch(session, message));
        Ok(())
    }

    /// A random reachable fleet destination other than the relayer itself.
    fn pick_session_destination(&self, relayer: &Address) -> Option<Address> {
        let view = self.peer_view();
        let candidates: Vec<&Address> = view
            .reachable_destinations(&self.session_destinations)
            .iter()
            .filter(|destination| *destination != relayer)
            .collect();

        candidates.choose(&mut rand::rng()).map(|d| (*d).clone())
    }

    /// Opens a session towards `relayer`, guarded by the rate limiter.
    ///
    /// The open call suspends, so by the time it returns another dispatch
    /// iteration may have inserted a session for the same relayer. The entry
    /// double-check keeps exactly one session per relayer; the losing socket
    /// is released with its session handle.
    async fn open_session(&self, relayer: &Address, destination: Address) -> Option<Arc<Session>> {
        {
            let mut limiter = self.rate_limiter.lock().await;
            let (allowed, wait) = limiter.can_attempt(relayer);
            if !allowed {
                debug!(relayer = %relayer, wait = ?wait, "session open rate-limited, dropping message");
                counter!("ct_session_operation", "op" => "open", "success" => "rate_limited")
                    .increment(1);
                return None;
            }
            limiter.record_attempt(relayer);
        }

        let outcome = self
            .api
            .open_udp_session(&destination, relayer, SESSION_LISTEN_HOST)
            .await;

        let session = match outcome {
            Ok(SessionOutcome::Opened(session)) => session,
            Ok(SessionOutcome::Failed(failure)) => {
                warn!(
                    relayer = %relayer,
                    status = %failure.status,
                    error = failure.error.as_deref().unwrap_or(""),
                    "failed to open a session"
                );
                self.rate_limiter.lock().await.record_failure(relayer);
                counter!("ct_session_operation", "op" => "open", "success" => "no").increment(1);
                return None;
            },
            Err(err) => {
                warn!(relayer = %relayer, error = %err, "session open request failed");
                self.rate_limiter.lock().await.record_failure(relayer);
                counter!("ct_session_operation", "op" => "open", "success" => "no").increment(1);
                return None;
            },
        };

        self.rate_limiter.lock().await.record_success(relayer);
        counter!("ct_session_operation", "op" => "open", "success" => "yes").increment(1);

        if let Err(err) = session.bind_socket().await {
            warn!(relayer = %relayer, error = %err, "failed to bind session socket");
            return None;
        }
        debug!(relayer = %relayer, ip = %session.ip, port = session.port, "created socket");

        Some(adopt_session(&self.sessions, relayer, Arc::new(session)))
    }

    /// The maintenance sweep: snapshot, plan, close via the API, then apply
    /// all map mutations in one non-suspending region.
    ///
    /// That ordering is what prevents lost updates against concurrent
    /// dispatch iterations; the port identity check protects sessions
    /// replaced while the close was in flight.
    pub(crate) async fn maintain_sessions(&self) -> Result<()> {
        let active_ports: HashSet<u16> = self
            .api
            .list_udp_sessions()
            .await?
            .iter()
            .map(|s| s.port)
            .collect();

        let view = self.peer_view();
        let reachable = view.addresses();

        let sessions: Vec<(Address, Arc<Session>)> = self
            .sessions
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        let grace: HashMap<Address, Instant> = self
            .session_grace
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        let now = Instant::now();

        let plan = plan_maintenance(
            &sessions,
            &grace,
            reachable,
            &active_ports,
            now,
            SESSION_GRACE_PERIOD,
        );

        let mut closed = Vec::with_capacity(plan.to_close.len());
        for (relayer, session) in plan.to_close {
            match self.api.close_session(&session).await {
                Ok(true) => {
                    counter!("ct_session_operation", "op" => "close", "success" => "yes")
                        .increment(1);
                },
                Ok(false) | Err(_) => {
                    warn!(
                        relayer = %relayer,
                        port = session.port,
                        "failed to close session at API level, session may be orphaned"
                    );
                    counter!("ct_session_operation", "op" => "close", "success" => "no")
                        .increment(1);
                },
            }
            closed.push((relayer, session));
        }

        for relayer in &plan.start_grace {
            self.session_grace.entry(relayer.clone()).or_insert(now);
        }
        for relayer in &plan.clear_grace {
            self.session_grace.remove(relayer);
        }
        for (relayer, inspected) in &closed {
            self.session_grace.remove(relayer);
            self.sessions
                .remove_if(relayer, |_, current| current.port == inspected.port);
        }

        Ok(())
    }
}

/// Publishes a freshly opened session unless another task beat this one to
/// it during the open I/O. The check and the insert happen under the same
/// map-entry lock, so exactly one session per relayer survives; a losing
/// `fresh` is dropped here, which releases its socket.
pub fn adopt_session(
    sessions: &dashmap::DashMap<Address, Arc<Session>>,
    relayer: &Address,
    fresh: Arc<Session>,
) -> Arc<Session> {
    match sessions.entry(relayer.clone()) {
        Entry::Occupied(existing) => {
            debug!(relayer = %relayer, "session created by another task, using existing");
            Arc::clone(existing.get())
        },
        Entry::Vacant(slot) => {
            slot.insert(Arc::clone(&fresh));
            fresh
        },
    }
}

/// Everything the maintenance sweep decided from one snapshot.
#[derive(Debug, Default)]
pub struct MaintenancePlan {
    pub to_close: Vec<(Address, Arc<Session>)>,
    pub start_grace: Vec<Address>,
    pub clear_grace: Vec<Address>,
}

/// Pure planning step over snapshots: no I/O, no map access.
pub fn plan_maintenance(
    sessions: &[(Address, Arc<Session>)],
    grace: &HashMap<Address, Instant>,
    reachable: &HashSet<Address>,
    active_ports: &HashSet<u16>,
    now: Instant,
    grace_period: Duration,
) -> MaintenancePlan {
    let mut plan = MaintenancePlan::default();

    for (relayer, session) in sessions {
        let mut remove = false;

        if !reachable.contains(relayer) {
            match grace.get(relayer) {
                None => {
                    debug!(
                        relayer = %relayer,
                        port = session.port,
                        grace_seconds = grace_period.as_secs(),
                        "session's relayer unreachable, will start grace period"
                    );
                    plan.start_grace.push(relayer.clone());
                },
                Some(started) if now.duration_since(*started) > grace_period => {
                    debug!(relayer = %relayer, port = session.port, "grace period expired, marking session for removal");
                    remove = true;
                },
                Some(_) => {},
            }
        } else if grace.contains_key(relayer) {
            debug!(relayer = %relayer, "peer reachable again, will cancel grace period");
            plan.clear_grace.push(relayer.clone());
        }

        if !active_ports.contains(&session.port) {
            debug!(relayer = %relayer, port = session.port, "session no longer active at API level, marking for removal");
            remove = true;
        }

        if remove {
            plan.to_close.push((relayer.clone(), Arc::clone(session)));
        }
    }

    plan
}

/// Window granted for response datagrams after a batch went out.
const RECEIVE_WINDOW: Duration = Duration::from_secs(2);

/// Writes `batch_size` copies of the serialized descriptor to the session's
/// datagram socket, then drains responses to record round-trip times.
async fn send_batch(session: Arc<Session>, message: MessageFormat) {
    let payload = match message.encode() {
        Ok(payload) => payload,
        Err(err) => {
            warn!(relayer = %message.relayer, error = %err, "cannot encode message");
            return;
        },
    };

    let batch = message.batch_size.max(1);
    for _ in 0..batch {
        if let Err(err) = session.send(&payload).await {
            warn!(relayer = %message.relayer, error = %err, "datagram send failed");
            return;
        }
        counter!("ct_messages_stats", "type" => "sent", "relayer" => message.relayer.to_string())
            .increment(1);
    }

    if let Err(err) = session
        .receive(payload.len(), payload.len() * batch, RECEIVE_WINDOW)
        .await
    {
        debug!(relayer = %message.relayer, error = %err, "response drain failed");
    }
}
