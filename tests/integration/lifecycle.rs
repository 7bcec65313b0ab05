//! Integration test: object lifecycle through the gateway.
//!
//! 3-node in-memory fleet started through the registry. Exercises the
//! create/fetch/delete cycle, key validation and the not-found route.

use axum::body::Body;
use axum::http::StatusCode;
use sluice_integration_tests::{
    BUCKET, TestFleet, body_bytes, body_string, random_keys, test_data_seeded,
};

/// PUT "hello" → 201, GET → "hello", PUT "" → 204, GET → 404.
#[tokio::test]
async fn test_end_to_end_scenario() {
    let fleet = TestFleet::new(3).await;

    let resp = fleet.put("abc123", "hello").await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = fleet.get("abc123").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/octet-stream"
    );
    assert_eq!(body_string(resp).await, "hello");

    let resp = fleet.put("abc123", "").await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = fleet.get("abc123").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

/// Every valid key is absent before its first PUT.
#[tokio::test]
async fn test_get_before_put_is_not_found() {
    let fleet = TestFleet::new(3).await;
    for key in random_keys(100, 7) {
        let resp = fleet.get(&key).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "key {key}");
    }

    // Once one object exists on every node, misses are object-level 404s.
    for i in 0..60 {
        fleet.put(&format!("seed{i}"), "x").await;
    }
    for key in random_keys(100, 8) {
        if key.starts_with("seed") {
            continue;
        }
        let resp = fleet.get(&key).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "key {key}");
    }
}

/// Write 50 objects of varying sizes and read each back byte-for-byte.
#[tokio::test]
async fn test_objects_of_varying_sizes() {
    let fleet = TestFleet::new(3).await;

    let mut objects = Vec::new();
    for i in 0..50u32 {
        let data = test_data_seeded(1 + i as usize * 997, i + 1);
        let key = format!("obj{i:03}");
        assert_eq!(
            fleet.put(&key, data.clone()).await.status(),
            StatusCode::CREATED
        );
        objects.push((key, data));
    }

    for (key, expected) in &objects {
        let resp = fleet.get(key).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_bytes(resp).await, *expected, "object {key} mismatch");
    }
    assert_eq!(fleet.stored_total(), 50);
}

/// An empty PUT on a key that never existed still succeeds.
#[tokio::test]
async fn test_delete_is_idempotent() {
    let fleet = TestFleet::new(2).await;
    assert_eq!(fleet.put("nothing", "").await.status(), StatusCode::NO_CONTENT);
    assert_eq!(fleet.put("nothing", "").await.status(), StatusCode::NO_CONTENT);

    fleet.put("something", "data").await;
    assert_eq!(fleet.put("something", "").await.status(), StatusCode::NO_CONTENT);
    assert_eq!(fleet.put("something", "").await.status(), StatusCode::NO_CONTENT);
    assert_eq!(fleet.stored_total(), 0);
}

/// Malformed keys are rejected before any backend is contacted.
#[tokio::test]
async fn test_invalid_keys_never_reach_backends() {
    let fleet = TestFleet::new(3).await;
    let calls_after_startup = fleet.backend_calls();

    let too_long = "k".repeat(33);
    for key in ["bad%5B", "star*", "under_score", "dot.ted", too_long.as_str()] {
        for method in ["GET", "PUT"] {
            let resp = fleet
                .request(method, &format!("/object/{key}"), Body::from("data"))
                .await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{method} {key}");
        }
    }
    assert_eq!(fleet.backend_calls(), calls_after_startup);
}

/// Unknown paths answer with the fixed not-found body.
#[tokio::test]
async fn test_unknown_paths() {
    let fleet = TestFleet::new(1).await;
    for (method, uri) in [
        ("GET", "/"),
        ("GET", "/health"),
        ("PUT", "/objects/abc"),
        ("POST", "/object/abc/extra"),
    ] {
        let resp = fleet.request(method, uri, Body::empty()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{method} {uri}");
        assert_eq!(body_string(resp).await.trim_end(), "404 - Not Found");
    }
}

/// The listing shows every stored object with its node.
#[tokio::test]
async fn test_listing_matches_placement() {
    let fleet = TestFleet::new(3).await;
    let keys: Vec<String> = (0..20).map(|i| format!("list{i:02}")).collect();
    for key in &keys {
        fleet.put(key, "abc").await;
    }
    fleet.put("list05", "").await;

    let resp = fleet.request("GET", "/object", Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
    let objects = json["objects"].as_array().unwrap();

    let expected: Vec<&String> = keys.iter().filter(|k| k.as_str() != "list05").collect();
    assert_eq!(objects.len(), expected.len());
    for (object, key) in objects.iter().zip(expected) {
        assert_eq!(object["key"], key.as_str());
        assert_eq!(object["node"], fleet.owner(key).as_str());
        assert_eq!(object["size"], 3);
    }
    assert_eq!(fleet.stored_total(), keys.len() - 1);
}

/// The gateway works over a real socket with sized and chunked bodies.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ntest::timeout(20000)]
async fn test_over_tcp() {
    use sluice_http::{DEFAULT_CHUNKED_UPLOAD_LIMIT, GatewayConfig, GatewayServer};

    let fleet = TestFleet::new(3).await;
    let addr = {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap()
    };

    let server = GatewayServer::new(GatewayConfig {
        directory: fleet.directory().clone(),
        bucket: BUCKET.to_string(),
        chunked_upload_limit: DEFAULT_CHUNKED_UPLOAD_LIMIT,
    });
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let serve_addr = addr.to_string();
    let handle = tokio::spawn(async move {
        server
            .serve_with_shutdown(&serve_addr, async {
                let _ = stop_rx.await;
            })
            .await
    });

    let client = reqwest::Client::new();
    let base = format!("http://{addr}/object");

    // Wait for the listener.
    let mut ready = false;
    for _ in 0..100 {
        if client.get(format!("{base}/ping1")).send().await.is_ok() {
            ready = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(ready, "gateway never came up");

    let resp = client
        .put(format!("{base}/tcp1"))
        .body("over the wire")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);

    let chunks: Vec<Result<&'static str, std::io::Error>> = vec![Ok("chunked "), Ok("body")];
    let resp = client
        .put(format!("{base}/tcp2"))
        .body(reqwest::Body::wrap_stream(futures::stream::iter(chunks)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);

    let resp = client.get(format!("{base}/tcp1")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.text().await.unwrap(), "over the wire");

    let resp = client.get(format!("{base}/tcp2")).send().await.unwrap();
    assert_eq!(resp.text().await.unwrap(), "chunked body");

    let resp = client.put(format!("{base}/tcp1")).body("").send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 204);

    let resp = client.get(format!("{base}/tcp1")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    drop(client);
    stop_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}
