//! Discovery provider capability.

use crate::error::DiscoveryError;

/// Raw information about one candidate node, as reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateInfo {
    /// Provider handle, used as the node ID (container ID for Docker).
    pub id: String,
    /// Human-readable name (container name without the leading `/`).
    pub name: String,
    /// Network addresses, unparsed, in provider order.
    pub addresses: Vec<String>,
    /// Environment entries in `KEY=VALUE` form.
    pub env: Vec<String>,
}

impl CandidateInfo {
    /// Start describing a candidate with no addresses or environment.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            addresses: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Add a network address.
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.addresses.push(address.into());
        self
    }

    /// Add an environment entry (`KEY=VALUE`).
    pub fn env(mut self, entry: impl Into<String>) -> Self {
        self.env.push(entry.into());
        self
    }
}

/// Enumerates candidate storage nodes.
///
/// Implementations return only active nodes whose name contains the given
/// pattern, sorted by name.
#[async_trait::async_trait]
pub trait NodeDiscoveryProvider: Send + Sync {
    /// Check that the provider is reachable.
    async fn ping(&self) -> Result<(), DiscoveryError>;

    /// List active candidates whose name contains `pattern`, sorted by name.
    async fn list_candidates(&self, pattern: &str) -> Result<Vec<CandidateInfo>, DiscoveryError>;
}
