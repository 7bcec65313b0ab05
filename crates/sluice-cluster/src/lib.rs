//! Storage node discovery, admission and routing directory.
//!
//! This crate turns a dynamically discovered set of storage nodes into an
//! immutable routing table:
//!
//! - [`NodeDiscoveryProvider`] — enumerates candidate nodes. [`DockerProvider`]
//!   talks to the Docker Engine API; [`StaticProvider`] is an in-memory fake.
//! - [`BackendConnector`] — builds a [`StorageBackend`](sluice_store::StorageBackend)
//!   handle for a resolved node ([`S3Connector`], [`MemoryConnector`]).
//! - [`NodeRegistry`] — pings the provider, resolves each candidate's address
//!   and credentials, probes liveness, and fails hard on any problem.
//! - [`Directory`] — the placement ring plus node handles, built once and
//!   shared read-only by every request.

mod address;
mod connector;
mod credentials;
mod directory;
mod discovery;
mod docker;
mod error;
mod registry;
mod static_provider;

pub use address::{select_address, sort_addresses};
pub use connector::{BackendConnector, MemoryConnector, S3Connector};
pub use credentials::extract_credentials;
pub use directory::Directory;
pub use discovery::{CandidateInfo, NodeDiscoveryProvider};
pub use docker::{DEFAULT_DOCKER_HOST, DockerEndpoint, DockerProvider};
pub use error::{DiscoveryError, LocateError, RegistryError};
pub use registry::{CandidateNode, Node, NodeRegistry, RegistrySettings};
pub use static_provider::StaticProvider;
