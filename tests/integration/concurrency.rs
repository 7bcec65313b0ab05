//! Integration test: concurrent requests.
//!
//! Many tasks hit the gateway at once. The directory is shared read-only, so
//! requests on distinct keys must never interfere.

use std::sync::Arc;

use axum::http::StatusCode;
use sluice_cluster::MemoryConnector;
use sluice_integration_tests::{TestFleet, body_bytes, candidates, random_keys, test_data_seeded};
use sluice_types::NodeId;

/// 200 concurrent PUTs on distinct keys, then every object reads back intact.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30000)]
async fn test_concurrent_puts_distinct_keys() {
    let fleet = Arc::new(TestFleet::new(5).await);

    let tasks: Vec<_> = (0..200u32)
        .map(|i| {
            let fleet = fleet.clone();
            tokio::spawn(async move {
                let key = format!("par{i}");
                let data = test_data_seeded(512 + i as usize, i + 1);
                let resp = fleet.put(&key, data).await;
                assert_eq!(resp.status(), StatusCode::CREATED, "key {key}");
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(fleet.stored_total(), 200);
    for i in 0..200u32 {
        let resp = fleet.get(&format!("par{i}")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_bytes(resp).await,
            test_data_seeded(512 + i as usize, i + 1)
        );
    }
}

/// Concurrent readers of one object all see the same bytes.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30000)]
async fn test_concurrent_reads_same_key() {
    let fleet = Arc::new(TestFleet::new(3).await);
    let data = test_data_seeded(64 * 1024, 99);
    fleet.put("shared", data.clone()).await;

    let tasks: Vec<_> = (0..64)
        .map(|_| {
            let fleet = fleet.clone();
            tokio::spawn(async move { body_bytes(fleet.get("shared").await).await })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap(), data);
    }
}

/// Creates and deletes interleave on distinct keys; each key ends in the
/// state its own last request left it in.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30000)]
async fn test_mixed_creates_and_deletes() {
    let fleet = Arc::new(TestFleet::new(4).await);
    let keys = {
        let mut keys = random_keys(120, 5);
        keys.sort();
        keys.dedup();
        keys
    };

    let tasks: Vec<_> = keys
        .iter()
        .enumerate()
        .map(|(i, key)| {
            let fleet = fleet.clone();
            let key = key.clone();
            tokio::spawn(async move {
                assert_eq!(fleet.put(&key, "v1").await.status(), StatusCode::CREATED);
                if i % 2 == 0 {
                    assert_eq!(fleet.put(&key, "").await.status(), StatusCode::NO_CONTENT);
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    for (i, key) in keys.iter().enumerate() {
        let expected = if i % 2 == 0 {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::OK
        };
        assert_eq!(fleet.get(key).await.status(), expected, "key {key}");
    }
    assert_eq!(fleet.stored_total(), keys.len() / 2);
}

/// Write-then-read pairs from many tasks each see their own object.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30000)]
async fn test_concurrent_write_read_pairs() {
    let connector = Arc::new(MemoryConnector::new());
    let fleet = Arc::new(TestFleet::start(candidates(3), connector).await.unwrap());
    let nodes: Vec<NodeId> = fleet.node_ids();
    let calls_before: u32 = nodes.iter().map(|n| fleet.faults(n).total_calls()).sum();

    let tasks: Vec<_> = (0..60)
        .map(|i| {
            let fleet = fleet.clone();
            tokio::spawn(async move {
                let key = format!("lat{i}");
                assert_eq!(fleet.put(&key, key.clone()).await.status(), StatusCode::CREATED);
                let resp = fleet.get(&key).await;
                assert_eq!(resp.status(), StatusCode::OK);
                assert_eq!(body_bytes(resp).await, key.as_bytes());
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    // Each pair costs at least a bucket check and upload, then a bucket
    // check, stat and download.
    let total: u32 = nodes.iter().map(|n| fleet.faults(n).total_calls()).sum();
    assert!(total - calls_before >= 60 * 5, "only {} calls", total - calls_before);
}
