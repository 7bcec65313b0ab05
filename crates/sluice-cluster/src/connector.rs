//! Building backend handles for admitted nodes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sluice_store::{FaultyBackend, MemoryBackend, S3Backend, StorageBackend, StoreError};
use sluice_types::{Credentials, NodeEndpoint, NodeId};
use tracing::debug;

/// Creates a storage handle for a resolved node.
pub trait BackendConnector: Send + Sync {
    /// Build the handle. Must not perform network I/O; liveness is probed
    /// separately.
    fn connect(
        &self,
        node: &NodeId,
        endpoint: NodeEndpoint,
        credentials: &Credentials,
    ) -> Result<Arc<dyn StorageBackend>, StoreError>;
}

/// Connects to nodes over the S3 REST API, sharing one HTTP client.
pub struct S3Connector {
    client: reqwest::Client,
    region: String,
}

impl S3Connector {
    /// Create a connector signing requests for `region`.
    pub fn new(region: impl Into<String>) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sluice/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            region: region.into(),
        })
    }
}

impl BackendConnector for S3Connector {
    fn connect(
        &self,
        node: &NodeId,
        endpoint: NodeEndpoint,
        credentials: &Credentials,
    ) -> Result<Arc<dyn StorageBackend>, StoreError> {
        debug!(node = %node.short(), %endpoint, "creating s3 client");
        Ok(Arc::new(S3Backend::with_client(
            self.client.clone(),
            endpoint,
            credentials.clone(),
            self.region.clone(),
        )))
    }
}

/// Hands out an in-memory backend per node, wrapped for fault injection.
///
/// Backends can be prepared before startup so tests can arm faults on a node
/// before the registry probes it.
#[derive(Default)]
pub struct MemoryConnector {
    nodes: Mutex<HashMap<NodeId, (Arc<MemoryBackend>, Arc<FaultyBackend>)>>,
}

impl MemoryConnector {
    /// Create a connector with no prepared nodes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the fault-injecting handle for `node`, creating it if needed.
    pub fn prepare(&self, node: &NodeId) -> Arc<FaultyBackend> {
        self.entry(node).1
    }

    /// The raw in-memory store behind `node`, if it has been prepared or connected.
    pub fn memory(&self, node: &NodeId) -> Option<Arc<MemoryBackend>> {
        let nodes = self.nodes.lock().unwrap();
        nodes.get(node).map(|(memory, _)| memory.clone())
    }

    fn entry(&self, node: &NodeId) -> (Arc<MemoryBackend>, Arc<FaultyBackend>) {
        let mut nodes = self.nodes.lock().unwrap();
        nodes
            .entry(node.clone())
            .or_insert_with(|| {
                let memory = Arc::new(MemoryBackend::new());
                let faulty = Arc::new(FaultyBackend::new(memory.clone()));
                (memory, faulty)
            })
            .clone()
    }
}

impl BackendConnector for MemoryConnector {
    fn connect(
        &self,
        node: &NodeId,
        endpoint: NodeEndpoint,
        _credentials: &Credentials,
    ) -> Result<Arc<dyn StorageBackend>, StoreError> {
        debug!(node = %node.short(), %endpoint, "attaching in-memory backend");
        Ok(self.prepare(node))
    }
}
