//! Shared test harness for Sluice integration tests.
//!
//! Provides [`TestFleet`]: a gateway router over N in-memory storage nodes,
//! started through the real registry path (discovery, address and
//! credential resolution, liveness probing, ring construction).

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use http_body_util::BodyExt;
use rand::distr::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sluice_cluster::{
    CandidateInfo, Directory, MemoryConnector, NodeRegistry, RegistryError, RegistrySettings,
    StaticProvider,
};
use sluice_http::{DEFAULT_CHUNKED_UPLOAD_LIMIT, GatewayConfig, GatewayServer};
use sluice_placement::RingConfig;
use sluice_store::{FaultyBackend, MemoryBackend};
use sluice_types::{NodeId, ObjectKey};
use tower::ServiceExt;

/// Name pattern every harness node matches.
pub const PATTERN: &str = "amazin-object-storage-node";

/// Bucket the harness gateway stores objects in.
pub const BUCKET: &str = "objects";

/// A storage node candidate as Docker would report a MinIO container.
pub fn candidate(i: usize) -> CandidateInfo {
    CandidateInfo::new(format!("c0ffee{i:04}"), format!("{PATTERN}-{}", i + 1))
        .address(format!("172.18.0.{}", i + 2))
        .env("PATH=/usr/bin")
        .env("MINIO_ROOT_USER=minio")
        .env("MINIO_ROOT_PASSWORD=minio123")
}

/// `n` matching candidates.
pub fn candidates(n: usize) -> Vec<CandidateInfo> {
    (0..n).map(candidate).collect()
}

/// Registry settings with no startup waits.
pub fn fast_settings() -> RegistrySettings {
    RegistrySettings::test_config(PATTERN)
}

/// A running gateway over in-memory nodes.
pub struct TestFleet {
    router: Router,
    directory: Arc<Directory>,
    connector: Arc<MemoryConnector>,
}

impl TestFleet {
    /// Start a fleet of `n` healthy nodes with the default ring.
    pub async fn new(n: usize) -> Self {
        Self::start(candidates(n), Arc::new(MemoryConnector::new()))
            .await
            .expect("fleet should start")
    }

    /// Start over explicit candidates and connector.
    ///
    /// Faults armed on the connector before this call are seen by the
    /// startup probes.
    pub async fn start(
        candidates: Vec<CandidateInfo>,
        connector: Arc<MemoryConnector>,
    ) -> Result<Self, RegistryError> {
        Self::start_with(
            StaticProvider::new(candidates),
            connector,
            fast_settings(),
            RingConfig::default(),
        )
        .await
    }

    /// Start with full control over provider, settings and ring.
    pub async fn start_with(
        provider: StaticProvider,
        connector: Arc<MemoryConnector>,
        settings: RegistrySettings,
        ring: RingConfig,
    ) -> Result<Self, RegistryError> {
        let registry = NodeRegistry::new(Arc::new(provider), connector.clone(), settings);
        let directory = Arc::new(registry.build(ring).await?);
        let router = GatewayServer::new(GatewayConfig {
            directory: directory.clone(),
            bucket: BUCKET.to_string(),
            chunked_upload_limit: DEFAULT_CHUNKED_UPLOAD_LIMIT,
        })
        .into_router();
        Ok(Self {
            router,
            directory,
            connector,
        })
    }

    /// The gateway router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// The routing directory.
    pub fn directory(&self) -> &Arc<Directory> {
        &self.directory
    }

    /// Admitted node IDs, sorted.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.directory.members()
    }

    /// The node `key` routes to.
    pub fn owner(&self, key: &str) -> NodeId {
        let key = ObjectKey::parse(key).expect("valid key");
        self.directory.locate(&key).expect("key routes").1
    }

    /// Fault-injection handle for a node.
    pub fn faults(&self, node: &NodeId) -> Arc<FaultyBackend> {
        self.connector.prepare(node)
    }

    /// Raw in-memory store of a node.
    pub fn memory(&self, node: &NodeId) -> Arc<MemoryBackend> {
        self.connector.memory(node).expect("node was connected")
    }

    /// Objects stored in the gateway bucket on `node`.
    pub fn stored_on(&self, node: &NodeId) -> usize {
        self.memory(node).object_count(BUCKET)
    }

    /// Objects stored in the gateway bucket across the fleet.
    pub fn stored_total(&self) -> usize {
        self.node_ids().iter().map(|n| self.stored_on(n)).sum()
    }

    /// Backend calls made to every node so far.
    pub fn backend_calls(&self) -> u32 {
        self.node_ids()
            .iter()
            .map(|n| self.faults(n).total_calls())
            .sum()
    }

    /// Send one request through the router.
    pub async fn request(&self, method: &str, uri: &str, body: Body) -> Response {
        self.router()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(body)
                    .expect("valid request"),
            )
            .await
            .expect("router is infallible")
    }

    /// `PUT /object/{key}`.
    pub async fn put(&self, key: &str, data: impl Into<Body>) -> Response {
        self.request("PUT", &format!("/object/{key}"), data.into())
            .await
    }

    /// `GET /object/{key}`.
    pub async fn get(&self, key: &str) -> Response {
        self.request("GET", &format!("/object/{key}"), Body::empty())
            .await
    }
}

/// Read the full response body as bytes.
pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body readable")
        .to_bytes()
        .to_vec()
}

/// Read the full response body as a UTF-8 string.
pub async fn body_string(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).expect("utf-8 body")
}

/// Random valid object keys of 1 to 32 alphanumeric characters.
pub fn random_keys(count: usize, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let len = rng.random_range(1..=32);
            (&mut rng)
                .sample_iter(Alphanumeric)
                .take(len)
                .map(char::from)
                .collect()
        })
        .collect()
}

/// Generate test data with a specific seed (for unique objects).
pub fn test_data_seeded(size: usize, seed: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let mut state: u32 = seed;
    for _ in 0..size {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        data.push((state >> 16) as u8);
    }
    data
}
