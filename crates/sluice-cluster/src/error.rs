//! Error types for the cluster crate.

use sluice_placement::RingError;
use sluice_store::StoreError;
use sluice_types::NodeId;

/// Errors produced by a [`NodeDiscoveryProvider`](crate::NodeDiscoveryProvider).
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The provider could not be reached.
    #[error("discovery provider unreachable: {0}")]
    Unreachable(String),

    /// The provider answered with an error status.
    #[error("discovery provider returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the provider.
        message: String,
    },

    /// A network-level error.
    #[error("discovery transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider's answer could not be decoded.
    #[error("invalid discovery response: {0}")]
    Decode(#[from] serde_json::Error),

    /// HTTP exchange over the engine socket failed.
    #[error("discovery protocol error: {0}")]
    Protocol(String),

    /// The configured Docker host uses a scheme we cannot speak.
    #[error("unsupported docker host {0:?}: expected unix://, tcp:// or http(s):// address")]
    UnsupportedHost(String),
}

/// Startup failures while building the fleet. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Provider pings were exhausted.
    #[error("discovery provider did not answer after {attempts} attempts: {source}")]
    ProviderUnavailable {
        /// Number of pings attempted.
        attempts: u32,
        /// The last ping failure.
        source: DiscoveryError,
    },

    /// Listing candidates failed.
    #[error("failed to discover storage nodes: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Nothing matched the configured pattern.
    #[error("no storage nodes discovered matching {pattern:?}")]
    NoNodes {
        /// The name pattern used for discovery.
        pattern: String,
    },

    /// The node reported no network addresses.
    #[error("no valid network addresses found for node {node}")]
    NoAddresses {
        /// The node.
        node: NodeId,
    },

    /// The node reported an address that does not parse.
    #[error("invalid address {address:?} reported for node {node}")]
    InvalidAddress {
        /// The node.
        node: NodeId,
        /// The raw address.
        address: String,
    },

    /// The node's environment lacks a user or password.
    #[error("failed to find storage credentials for node {node}")]
    MissingCredentials {
        /// The node.
        node: NodeId,
    },

    /// A backend handle could not be created.
    #[error("failed to connect to node {node}: {source}")]
    Connect {
        /// The node.
        node: NodeId,
        /// Underlying error.
        source: StoreError,
    },

    /// Every liveness probe failed.
    #[error("node {node} failed liveness check after {attempts} attempts: {source}")]
    NotAlive {
        /// The node.
        node: NodeId,
        /// Number of probes attempted.
        attempts: u32,
        /// The last probe failure.
        source: StoreError,
    },

    /// The placement ring could not be built.
    #[error("failed to build placement ring: {0}")]
    Ring(#[from] RingError),
}

/// A key could not be resolved to a backend handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocateError {
    /// The placement has no members at all.
    #[error("placement has no members")]
    NoMembers,

    /// The placement chose a node the directory holds no handle for.
    #[error("no backend handle for node {0}")]
    UnknownNode(NodeId),
}
