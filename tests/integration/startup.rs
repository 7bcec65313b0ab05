//! Integration test: fleet startup.
//!
//! Startup either admits every discovered node or fails as a whole; there
//! is no partial fleet.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use sluice_cluster::{CandidateInfo, MemoryConnector, RegistryError, StaticProvider};
use sluice_integration_tests::{TestFleet, candidate, candidates, fast_settings};
use sluice_placement::{RingConfig, RingError};
use sluice_store::{Fault, Operation};
use sluice_types::NodeId;
use tokio::time::Instant;

#[tokio::test]
async fn test_only_matching_nodes_are_admitted() {
    let mut all = candidates(3);
    all.push(
        CandidateInfo::new("db0001", "postgres")
            .address("172.18.0.50")
            .env("POSTGRES_PASSWORD=pw"),
    );

    let fleet = TestFleet::start(all, Arc::new(MemoryConnector::new()))
        .await
        .unwrap();
    assert_eq!(fleet.node_ids().len(), 3);
    assert!(!fleet.node_ids().contains(&NodeId::new("db0001")));
}

#[tokio::test]
async fn test_no_matching_nodes_fails() {
    let err = TestFleet::start(Vec::new(), Arc::new(MemoryConnector::new()))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, RegistryError::NoNodes { .. }), "{err}");
}

#[tokio::test]
async fn test_one_dead_node_fails_startup() {
    let connector = Arc::new(MemoryConnector::new());
    connector
        .prepare(&NodeId::new(candidate(1).id))
        .inject(Operation::ListBuckets, Fault::Unavailable);

    let err = TestFleet::start(candidates(3), connector.clone())
        .await
        .err()
        .unwrap();
    match err {
        RegistryError::NotAlive { node, attempts, .. } => {
            assert_eq!(node, NodeId::new(candidate(1).id));
            assert_eq!(attempts, 5);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_flaky_node_is_admitted_after_retries() {
    let connector = Arc::new(MemoryConnector::new());
    let flaky = connector.prepare(&NodeId::new(candidate(0).id));
    flaky.inject_times(Operation::ListBuckets, Fault::Unavailable, 3);

    let fleet = TestFleet::start(candidates(2), connector).await.unwrap();
    assert_eq!(flaky.calls(Operation::ListBuckets), 4);
    assert_eq!(fleet.put("afterflaky", "ok").await.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_node_without_credentials_fails() {
    let mut nodes = candidates(2);
    nodes.push(
        CandidateInfo::new("c0ffee9999", "amazin-object-storage-node-9").address("172.18.0.99"),
    );

    let err = TestFleet::start(nodes, Arc::new(MemoryConnector::new()))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, RegistryError::MissingCredentials { .. }), "{err}");
}

#[tokio::test]
async fn test_node_without_address_fails() {
    let mut nodes = candidates(1);
    nodes.push(
        CandidateInfo::new("c0ffee8888", "amazin-object-storage-node-8")
            .env("MINIO_ACCESS_KEY=a")
            .env("MINIO_SECRET_KEY=b"),
    );

    let err = TestFleet::start(nodes, Arc::new(MemoryConnector::new()))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, RegistryError::NoAddresses { .. }), "{err}");
}

#[tokio::test]
async fn test_node_with_garbage_address_fails() {
    let mut nodes = candidates(1);
    nodes.push(
        CandidateInfo::new("c0ffee7777", "amazin-object-storage-node-7")
            .address("not-an-ip")
            .env("MINIO_ROOT_USER=a")
            .env("MINIO_ROOT_PASSWORD=b"),
    );

    let err = TestFleet::start(nodes, Arc::new(MemoryConnector::new()))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, RegistryError::InvalidAddress { .. }), "{err}");
}

#[tokio::test]
async fn test_ring_without_capacity_fails_before_probing() {
    let connector = Arc::new(MemoryConnector::new());
    let ring = RingConfig {
        partition_count: 71,
        replication_factor: 20,
        load: 0.5,
    };
    let err = TestFleet::start_with(
        StaticProvider::new(candidates(3)),
        connector.clone(),
        fast_settings(),
        ring,
    )
    .await
    .err()
    .unwrap();

    assert!(
        matches!(err, RegistryError::Ring(RingError::InsufficientCapacity { .. })),
        "{err}"
    );
    for c in candidates(3) {
        assert!(connector.memory(&NodeId::new(c.id)).is_none());
    }
}

/// Provider pings back off 2s then 4s; a provider that recovers in time
/// is accepted.
#[tokio::test(start_paused = true)]
async fn test_provider_ping_backoff() {
    let mut settings = fast_settings();
    settings.ping_initial_wait = Duration::from_secs(1);

    let start = Instant::now();
    let fleet = TestFleet::start_with(
        StaticProvider::new(candidates(2)).fail_pings(2),
        Arc::new(MemoryConnector::new()),
        settings.clone(),
        RingConfig::default(),
    )
    .await
    .unwrap();
    assert_eq!(start.elapsed(), Duration::from_secs(6));
    assert_eq!(fleet.node_ids().len(), 2);

    let start = Instant::now();
    let err = TestFleet::start_with(
        StaticProvider::new(candidates(2)).fail_pings(3),
        Arc::new(MemoryConnector::new()),
        settings,
        RingConfig::default(),
    )
    .await
    .err()
    .unwrap();
    assert_eq!(start.elapsed(), Duration::from_secs(6));
    assert!(
        matches!(err, RegistryError::ProviderUnavailable { attempts: 3, .. }),
        "{err}"
    );
}

/// Liveness probes wait 1s, 2s, ... before each attempt.
#[tokio::test(start_paused = true)]
async fn test_probe_delays_grow_per_attempt() {
    let mut settings = fast_settings();
    settings.probe_step = Duration::from_secs(1);

    let connector = Arc::new(MemoryConnector::new());
    connector
        .prepare(&NodeId::new(candidate(0).id))
        .inject_times(Operation::ListBuckets, Fault::Unavailable, 2);

    let start = Instant::now();
    TestFleet::start_with(
        StaticProvider::new(candidates(1)),
        connector,
        settings,
        RingConfig::default(),
    )
    .await
    .unwrap();
    // 1s + 2s + 3s before the third, successful probe.
    assert_eq!(start.elapsed(), Duration::from_secs(6));
}
