//! Integration test: key placement across the fleet.
//!
//! Keys must route deterministically, spread over every node, and land
//! only on the node the directory names.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::StatusCode;
use sluice_cluster::MemoryConnector;
use sluice_integration_tests::{TestFleet, candidates, random_keys};
use sluice_placement::{Ring, RingConfig};
use sluice_types::NodeId;

/// Two fleets over the same nodes agree on every key.
#[tokio::test]
async fn test_placement_is_deterministic_across_restarts() {
    let first = TestFleet::new(5).await;
    let second = TestFleet::new(5).await;

    for key in random_keys(500, 42) {
        assert_eq!(first.owner(&key), second.owner(&key), "key {key}");
        assert_eq!(first.owner(&key), first.owner(&key));
    }
}

/// Discovery order does not change placement.
#[tokio::test]
async fn test_placement_ignores_discovery_order() {
    let mut reversed = candidates(4);
    reversed.reverse();
    let a = TestFleet::new(4).await;
    let b = TestFleet::start(reversed, Arc::new(MemoryConnector::new()))
        .await
        .unwrap();

    assert_eq!(a.node_ids(), b.node_ids());
    for key in random_keys(300, 9) {
        assert_eq!(a.owner(&key), b.owner(&key));
    }
}

/// Every node receives a share of the key space within the load bound.
#[tokio::test]
async fn test_keys_spread_over_all_nodes() {
    let fleet = TestFleet::new(4).await;

    let mut counts: HashMap<NodeId, usize> = HashMap::new();
    for key in random_keys(2000, 1) {
        *counts.entry(fleet.owner(&key)).or_default() += 1;
    }
    assert_eq!(counts.len(), 4, "some node owns no keys: {counts:?}");

    // Partition ownership is capped at ceil(floor(71 / 4) * 1.25) = 22.
    let ring = Ring::new(fleet.node_ids(), RingConfig::default()).unwrap();
    assert_eq!(ring.average_load(), 22.0);
    for (node, partitions) in ring.load_distribution() {
        assert!(partitions <= 22, "{node} owns {partitions} partitions");
        assert!(partitions > 0, "{node} owns no partitions");
    }
}

/// Objects are stored only on the node their key routes to.
#[tokio::test]
async fn test_objects_stored_on_owner() {
    let fleet = TestFleet::new(3).await;

    let mut expected: HashMap<NodeId, usize> = HashMap::new();
    for i in 0..90 {
        let key = format!("owned{i}");
        assert_eq!(fleet.put(&key, "v").await.status(), StatusCode::CREATED);
        *expected.entry(fleet.owner(&key)).or_default() += 1;
    }

    for node in fleet.node_ids() {
        assert_eq!(
            fleet.stored_on(&node),
            expected.get(&node).copied().unwrap_or(0),
            "node {node}"
        );
    }
}

/// Only the owning node is contacted for a key.
#[tokio::test]
async fn test_requests_touch_only_the_owner() {
    let fleet = TestFleet::new(3).await;
    let key = "solo";
    let owner = fleet.owner(key);
    let before: HashMap<NodeId, u32> = fleet
        .node_ids()
        .into_iter()
        .map(|n| {
            let calls = fleet.faults(&n).total_calls();
            (n, calls)
        })
        .collect();

    fleet.put(key, "data").await;
    fleet.get(key).await;

    for node in fleet.node_ids() {
        let delta = fleet.faults(&node).total_calls() - before[&node];
        if node == owner {
            assert!(delta > 0);
        } else {
            assert_eq!(delta, 0, "node {node} was contacted");
        }
    }
}

/// A custom ring configuration routes consistently too.
#[tokio::test]
async fn test_custom_ring_config() {
    use sluice_cluster::StaticProvider;
    use sluice_integration_tests::fast_settings;

    let ring = RingConfig::new(271, 40, 1.1).unwrap();
    let fleet = TestFleet::start_with(
        StaticProvider::new(candidates(6)),
        Arc::new(MemoryConnector::new()),
        fast_settings(),
        ring,
    )
    .await
    .unwrap();

    let reference = Ring::new(fleet.node_ids(), ring).unwrap();
    for key in random_keys(200, 3) {
        let partition = reference.partition_of(key.as_bytes());
        assert_eq!(
            reference.partition_owner(partition),
            Some(&fleet.owner(&key)),
            "key {key}"
        );
    }
}
