//! Startup wiring: discovery provider and connector to a routing directory.

use std::sync::Arc;

use anyhow::{Context, Result};
use sluice_cluster::{
    BackendConnector, CandidateInfo, Directory, DockerProvider, MemoryConnector,
    NodeDiscoveryProvider, NodeRegistry, S3Connector, StaticProvider,
};
use tracing::info;

use crate::config::CliConfig;

/// Where the storage fleet comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FleetSource {
    /// Containers on a Docker engine, reached over S3.
    Docker,
    /// `count` in-process nodes for local development.
    Memory { count: usize },
}

impl FleetSource {
    pub fn from_flag(memory: Option<usize>) -> Self {
        match memory {
            Some(count) => Self::Memory { count },
            None => Self::Docker,
        }
    }
}

/// Candidates for an in-memory dev fleet, named to match `pattern`.
pub fn memory_candidates(pattern: &str, count: usize) -> Vec<CandidateInfo> {
    (0..count)
        .map(|i| {
            CandidateInfo::new(format!("memnode{i:02}"), format!("{pattern}-{}", i + 1))
                .address(format!("127.0.0.{}", i + 1))
                .env("MINIO_ROOT_USER=sluice")
                .env("MINIO_ROOT_PASSWORD=sluice-dev-secret")
        })
        .collect()
}

/// Discover, admit and place the fleet. Blocks until every node is admitted.
pub async fn build_directory(config: &CliConfig, source: &FleetSource) -> Result<Directory> {
    let (provider, connector): (Arc<dyn NodeDiscoveryProvider>, Arc<dyn BackendConnector>) =
        match source {
            FleetSource::Docker => {
                let provider = DockerProvider::new(&config.discovery.docker_host)
                    .context("failed to create docker client")?;
                info!(engine = %provider.endpoint(), "using docker discovery");
                let connector = S3Connector::new(config.storage.region.clone())
                    .context("failed to create storage client")?;
                (Arc::new(provider), Arc::new(connector))
            }
            FleetSource::Memory { count } => {
                info!(nodes = count, "using in-memory fleet");
                let candidates = memory_candidates(&config.discovery.name_pattern, *count);
                (
                    Arc::new(StaticProvider::new(candidates)),
                    Arc::new(MemoryConnector::new()),
                )
            }
        };

    let registry = NodeRegistry::new(provider, connector, config.registry_settings());
    let directory = registry.build(config.ring_config()).await?;
    info!(nodes = directory.len(), "storage fleet ready");
    Ok(directory)
}
