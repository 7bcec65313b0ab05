//! Node discovery and admission.
//!
//! The [`NodeRegistry`] runs the startup sequence that turns provider output
//! into a [`Directory`]:
//!
//! 1. Ping the provider, doubling the wait after each failure.
//! 2. List candidates matching the name pattern; none is an error.
//! 3. Resolve each candidate's address and credentials.
//! 4. Build the ring over the candidate IDs.
//! 5. Connect to each node and probe it with `list_buckets`, waiting a
//!    linearly growing delay before every attempt.
//!
//! Any failure aborts the whole sequence. There is no partial fleet.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use sluice_placement::{Ring, RingConfig};
use sluice_store::StorageBackend;
use sluice_types::{Credentials, NodeEndpoint, NodeId};
use tracing::{debug, info, warn};

use crate::address::select_address;
use crate::connector::BackendConnector;
use crate::credentials::extract_credentials;
use crate::directory::Directory;
use crate::discovery::{CandidateInfo, NodeDiscoveryProvider};
use crate::error::RegistryError;

/// Settings for the [`NodeRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySettings {
    /// Substring a node's name must contain to be discovered.
    pub name_pattern: String,
    /// Port of each node's S3 API.
    pub api_port: u16,
    /// Provider pings before giving up.
    pub ping_attempts: u32,
    /// Initial wait between pings; doubled after each failure.
    pub ping_initial_wait: Duration,
    /// Liveness probes per node before giving up.
    pub probe_attempts: u32,
    /// The delay before probe `i` is `i * probe_step`.
    pub probe_step: Duration,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            name_pattern: "amazin-object-storage-node".to_string(),
            api_port: 9000,
            ping_attempts: 3,
            ping_initial_wait: Duration::from_secs(1),
            probe_attempts: 5,
            probe_step: Duration::from_secs(1),
        }
    }
}

impl RegistrySettings {
    /// Create settings with no waits, suitable for fast test execution.
    pub fn test_config(name_pattern: impl Into<String>) -> Self {
        Self {
            name_pattern: name_pattern.into(),
            ping_initial_wait: Duration::ZERO,
            probe_step: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// A discovered node with its connection details resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateNode {
    /// Provider handle.
    pub id: NodeId,
    /// Human-readable name.
    pub name: String,
    /// Selected address and API port.
    pub endpoint: NodeEndpoint,
    /// Access key pair.
    pub credentials: Credentials,
}

/// An admitted node with a live handle.
pub struct Node {
    /// Provider handle.
    pub id: NodeId,
    /// Human-readable name.
    pub name: String,
    /// Selected address and API port.
    pub endpoint: NodeEndpoint,
    /// Access key pair.
    pub credentials: Credentials,
    /// Storage handle shared by every request routed here.
    pub backend: Arc<dyn StorageBackend>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// Discovers, validates and admits storage nodes at startup.
pub struct NodeRegistry {
    provider: Arc<dyn NodeDiscoveryProvider>,
    connector: Arc<dyn BackendConnector>,
    settings: RegistrySettings,
}

impl NodeRegistry {
    /// Create a registry over a provider and connector.
    pub fn new(
        provider: Arc<dyn NodeDiscoveryProvider>,
        connector: Arc<dyn BackendConnector>,
        settings: RegistrySettings,
    ) -> Self {
        Self {
            provider,
            connector,
            settings,
        }
    }

    /// The registry's settings.
    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    /// Run the full startup sequence and publish the directory.
    pub async fn build(&self, ring: RingConfig) -> Result<Directory, RegistryError> {
        let candidates = self.discover().await?;

        // Build the ring before probing so a bad ring config fails fast.
        let ring = Ring::new(candidates.iter().map(|c| c.id.clone()), ring)?;

        let mut handles = HashMap::with_capacity(candidates.len());
        for candidate in candidates {
            let node = self.admit(candidate).await?;
            handles.insert(node.id, node.backend);
        }

        Ok(Directory::from_parts(Arc::new(ring), handles))
    }

    /// Ping the provider, then list and resolve candidates.
    pub async fn discover(&self) -> Result<Vec<CandidateNode>, RegistryError> {
        self.wait_for_provider().await?;

        let pattern = &self.settings.name_pattern;
        let infos = self.provider.list_candidates(pattern).await?;
        if infos.is_empty() {
            return Err(RegistryError::NoNodes {
                pattern: pattern.clone(),
            });
        }
        debug!(count = infos.len(), %pattern, "discovered candidates");

        infos.into_iter().map(|info| self.resolve(info)).collect()
    }

    /// Connect to a candidate and probe it until it answers.
    pub async fn admit(&self, candidate: CandidateNode) -> Result<Node, RegistryError> {
        let CandidateNode {
            id,
            name,
            endpoint,
            credentials,
        } = candidate;

        let backend = self
            .connector
            .connect(&id, endpoint, &credentials)
            .map_err(|source| RegistryError::Connect {
                node: id.clone(),
                source,
            })?;

        let attempts = self.settings.probe_attempts.max(1);
        let mut attempt = 1;
        loop {
            tokio::time::sleep(self.settings.probe_step.saturating_mul(attempt)).await;
            match backend.list_buckets().await {
                Ok(_) => break,
                Err(source) if attempt >= attempts => {
                    return Err(RegistryError::NotAlive {
                        node: id,
                        attempts,
                        source,
                    });
                }
                Err(e) => {
                    warn!(node = %id, attempt, attempts, error = %e, "liveness probe failed");
                    attempt += 1;
                }
            }
        }

        info!(node = %id, %name, %endpoint, "admitted storage node");
        Ok(Node {
            id,
            name,
            endpoint,
            credentials,
            backend,
        })
    }

    fn resolve(&self, info: CandidateInfo) -> Result<CandidateNode, RegistryError> {
        let id = NodeId::new(info.id);
        let ip = select_address(&id, &info.addresses)?;
        let credentials = extract_credentials(&id, &info.env)?;
        Ok(CandidateNode {
            id,
            name: info.name,
            endpoint: NodeEndpoint::new(ip, self.settings.api_port),
            credentials,
        })
    }

    async fn wait_for_provider(&self) -> Result<(), RegistryError> {
        let attempts = self.settings.ping_attempts.max(1);
        let mut wait = self.settings.ping_initial_wait;
        let mut attempt = 1;

        info!(attempts, "waiting for discovery provider");
        loop {
            match self.provider.ping().await {
                Ok(()) => {
                    debug!(attempt, "discovery provider reachable");
                    return Ok(());
                }
                Err(source) if attempt >= attempts => {
                    return Err(RegistryError::ProviderUnavailable { attempts, source });
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "discovery provider ping failed");
                    wait = next_ping_wait(wait);
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Double a ping wait, saturating instead of overflowing.
fn next_ping_wait(wait: Duration) -> Duration {
    wait.saturating_mul(2)
}
