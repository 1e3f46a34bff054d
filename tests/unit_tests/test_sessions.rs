// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use ct_orchestrator::{
    models::{address::Address, session::Session},
    node::sessions::{SESSION_GRACE_PERIOD, adopt_session, plan_maintenance},
};
use dashmap::DashMap;
use tokio::time::Instant;

fn session(port: u16, target: &str) -> Arc<Session> {
    Arc::new(Session::new("127.0.0.1", port, Address::new(target), 462, 62))
}

fn addresses(raw: &[&str]) -> HashSet<Address> {
    raw.iter().map(Address::new).collect()
}

#[test]
fn test_reachable_session_with_active_port_is_kept() {
    let relayer = Address::new("0xaa");
    let sessions = vec![(relayer.clone(), session(9091, "0xaa"))];
    let now = Instant::now();

    let plan = plan_maintenance(
        &sessions,
        &HashMap::new(),
        &addresses(&["0xaa"]),
        &HashSet::from([9091]),
        now,
        SESSION_GRACE_PERIOD,
    );

    assert!(plan.to_close.is_empty());
    assert!(plan.start_grace.is_empty());
    assert!(plan.clear_grace.is_empty());
}

#[test]
fn test_unreachable_relayer_starts_grace_period() {
    let relayer = Address::new("0xaa");
    let sessions = vec![(relayer.clone(), session(9091, "0xaa"))];
    let now = Instant::now();

    let plan = plan_maintenance(
        &sessions,
        &HashMap::new(),
        &addresses(&[]),
        &HashSet::from([9091]),
        now,
        SESSION_GRACE_PERIOD,
    );

    assert_eq!(plan.start_grace, vec![relayer]);
    assert!(plan.to_close.is_empty());
}

#[test]
fn test_grace_period_expiry_closes_session() {
    let relayer = Address::new("0xaa");
    let sessions = vec![(relayer.clone(), session(9091, "0xaa"))];
    let now = Instant::now() + Duration::from_secs(3600);

    // At 59 seconds of unreachability the session survives.
    let grace = HashMap::from([(relayer.clone(), now - Duration::from_secs(59))]);
    let plan = plan_maintenance(
        &sessions,
        &grace,
        &addresses(&[]),
        &HashSet::from([9091]),
        now,
        SESSION_GRACE_PERIOD,
    );
    assert!(plan.to_close.is_empty());

    // At 61 seconds it is marked for removal.
    let grace = HashMap::from([(relayer.clone(), now - Duration::from_secs(61))]);
    let plan = plan_maintenance(
        &sessions,
        &grace,
        &addresses(&[]),
        &HashSet::from([9091]),
        now,
        SESSION_GRACE_PERIOD,
    );
    assert_eq!(plan.to_close.len(), 1);
    assert_eq!(plan.to_close[0].0, relayer);
}

#[test]
fn test_reappearing_relayer_clears_grace_period() {
    let relayer = Address::new("0xaa");
    let sessions = vec![(relayer.clone(), session(9091, "0xaa"))];
    let now = Instant::now() + Duration::from_secs(3600);

    let grace = HashMap::from([(relayer.clone(), now - Duration::from_secs(30))]);
    let plan = plan_maintenance(
        &sessions,
        &grace,
        &addresses(&["0xaa"]),
        &HashSet::from([9091]),
        now,
        SESSION_GRACE_PERIOD,
    );

    assert_eq!(plan.clear_grace, vec![relayer]);
    assert!(plan.to_close.is_empty());
}

#[test]
fn test_orphaned_port_is_removed_immediately() {
    let relayer = Address::new("0xaa");
    let sessions = vec![(relayer.clone(), session(9091, "0xaa"))];
    let now = Instant::now();

    // Relayer is reachable, but the node no longer lists the listener port.
    let plan = plan_maintenance(
        &sessions,
        &HashMap::new(),
        &addresses(&["0xaa"]),
        &HashSet::new(),
        now,
        SESSION_GRACE_PERIOD,
    );

    assert_eq!(plan.to_close.len(), 1);
    assert_eq!(plan.to_close[0].1.port, 9091);
}

#[test]
fn test_fresh_session_is_adopted_when_none_exists() {
    let sessions: DashMap<Address, Arc<Session>> = DashMap::new();
    let relayer = Address::new("0xaa");

    let fresh = session(9091, "0xaa");
    let adopted = adopt_session(&sessions, &relayer, Arc::clone(&fresh));

    assert_eq!(adopted.port, 9091);
    assert_eq!(sessions.len(), 1);
    assert!(Arc::ptr_eq(&adopted, &fresh));
}

#[test]
fn test_losing_session_reuses_existing_entry() {
    let sessions: DashMap<Address, Arc<Session>> = DashMap::new();
    let relayer = Address::new("0xaa");

    // Another dispatch iteration inserted a session during the open I/O.
    let winner = session(9091, "0xaa");
    sessions.insert(relayer.clone(), Arc::clone(&winner));

    let loser = session(9092, "0xaa");
    let adopted = adopt_session(&sessions, &relayer, loser);

    // Exactly one entry for the relayer; the late arrival uses the winner.
    assert_eq!(sessions.len(), 1);
    assert!(Arc::ptr_eq(&adopted, &winner));
    assert_eq!(adopted.port, 9091);
}

#[test]
fn test_payload_is_mtu_minus_surb() {
    let session = session(9091, "0xaa");
    assert_eq!(session.payload(), 400);
    assert_eq!(session.as_path(), "/session/udp/127.0.0.1/9091");
}
