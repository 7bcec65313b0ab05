//! TOML configuration for the Sluice daemon.
//!
//! Values are layered: built-in defaults, then the optional config file, then
//! the gateway's environment variables, then command-line flags. The result
//! is validated once and handed to the registry and HTTP layer by value.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sluice_cluster::{DEFAULT_DOCKER_HOST, DockerEndpoint, RegistrySettings};
use sluice_http::DEFAULT_CHUNKED_UPLOAD_LIMIT;
use sluice_placement::RingConfig;

/// Environment variable naming the discovery name pattern.
pub const ENV_NAME_PATTERN: &str = "S3_CONTAINER_NAME_PATTERN";
/// Environment variable naming the nodes' S3 API port.
pub const ENV_API_PORT: &str = "S3_API_PORT";
/// Environment variable naming the ring partition count.
pub const ENV_PARTITION_COUNT: &str = "CONSISTENT_HASH_PARTITION_COUNT";
/// Environment variable naming the ring replication factor.
pub const ENV_REPLICATION_FACTOR: &str = "CONSISTENT_HASH_REPLICATION_FACTOR";
/// Environment variable naming the ring load factor.
pub const ENV_LOAD: &str = "CONSISTENT_HASH_LOAD";
/// Environment variable naming the object bucket.
pub const ENV_BUCKET: &str = "S3_DEFAULT_BUCKET_NAME";
/// Standard Docker engine address variable.
pub const ENV_DOCKER_HOST: &str = "DOCKER_HOST";

/// Errors loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },

    /// A numeric environment variable did not parse.
    #[error("invalid number {value:?} in {var}")]
    InvalidNumber {
        /// Variable name.
        var: String,
        /// Raw value.
        value: String,
    },

    #[error("ring partition count must be greater than zero")]
    ZeroPartitions,

    #[error("ring replication factor must be greater than zero")]
    ZeroReplicationFactor,

    #[error("ring load factor must be a positive finite number, got {0}")]
    InvalidLoad(f64),

    #[error("storage node API port must be greater than zero")]
    ZeroApiPort,

    #[error("discovery ping attempts must be greater than zero")]
    ZeroPingAttempts,

    #[error("bucket name must not be empty")]
    EmptyBucket,

    #[error("unsupported docker host {0:?}: expected unix://, tcp:// or http(s):// address")]
    UnsupportedDockerHost(String),
}

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CliConfig {
    /// HTTP listener.
    pub server: ServerSection,
    /// Node discovery.
    pub discovery: DiscoverySection,
    /// Placement ring tuning.
    pub ring: RingSection,
    /// Object storage settings.
    pub storage: StorageSection,
    /// Logging configuration.
    pub log: LogSection,
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSection {
    /// Address the gateway's HTTP API listens on.
    pub listen_addr: String,
    /// Most bytes buffered for an upload sent without `Content-Length`.
    pub max_chunked_upload: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            max_chunked_upload: DEFAULT_CHUNKED_UPLOAD_LIMIT as u64,
        }
    }
}

/// `[discovery]` section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoverySection {
    /// Substring a container name must contain to be a storage node.
    pub name_pattern: String,
    /// Port of each node's S3 API.
    pub api_port: u16,
    /// Docker engine address (`tcp://` or `http(s)://`).
    pub docker_host: String,
    /// Engine pings before startup gives up.
    pub ping_attempts: u32,
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            name_pattern: "amazin-object-storage-node".to_string(),
            api_port: 9000,
            docker_host: DEFAULT_DOCKER_HOST.to_string(),
            ping_attempts: 3,
        }
    }
}

/// `[ring]` section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RingSection {
    pub partition_count: u32,
    pub replication_factor: u32,
    pub load: f64,
}

impl Default for RingSection {
    fn default() -> Self {
        let ring = RingConfig::default();
        Self {
            partition_count: ring.partition_count,
            replication_factor: ring.replication_factor,
            load: ring.load,
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageSection {
    /// Bucket every object is stored in.
    pub bucket: String,
    /// Region used when signing requests to nodes.
    pub region: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            bucket: "objects".to_string(),
            region: "us-east-1".to_string(),
        }
    }
}

/// `[log]` section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CliConfig {
    /// Load config from a TOML file, or use defaults if no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Apply overrides from environment variables.
    ///
    /// Only recognized names are consulted. An empty numeric variable counts
    /// as zero, which validation then rejects where zero is unusable.
    pub fn apply_env<I, K, V>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let value = value.into();
            match key.as_ref() {
                ENV_NAME_PATTERN => self.discovery.name_pattern = value,
                ENV_API_PORT => self.discovery.api_port = parse_number(ENV_API_PORT, &value)?,
                ENV_PARTITION_COUNT => {
                    self.ring.partition_count = parse_number(ENV_PARTITION_COUNT, &value)?;
                }
                ENV_REPLICATION_FACTOR => {
                    self.ring.replication_factor = parse_number(ENV_REPLICATION_FACTOR, &value)?;
                }
                ENV_LOAD => self.ring.load = parse_number(ENV_LOAD, &value)?,
                ENV_BUCKET => self.storage.bucket = value,
                // Docker treats an empty DOCKER_HOST as unset.
                ENV_DOCKER_HOST if !value.trim().is_empty() => self.discovery.docker_host = value,
                _ => {}
            }
        }
        Ok(())
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ring.partition_count == 0 {
            return Err(ConfigError::ZeroPartitions);
        }
        if self.ring.replication_factor == 0 {
            return Err(ConfigError::ZeroReplicationFactor);
        }
        if !self.ring.load.is_finite() || self.ring.load <= 0.0 {
            return Err(ConfigError::InvalidLoad(self.ring.load));
        }
        if self.discovery.api_port == 0 {
            return Err(ConfigError::ZeroApiPort);
        }
        if self.discovery.ping_attempts == 0 {
            return Err(ConfigError::ZeroPingAttempts);
        }
        if self.storage.bucket.is_empty() {
            return Err(ConfigError::EmptyBucket);
        }
        self.docker_endpoint()?;
        Ok(())
    }

    /// Parsed Docker engine endpoint.
    pub fn docker_endpoint(&self) -> Result<DockerEndpoint, ConfigError> {
        DockerEndpoint::parse(&self.discovery.docker_host)
            .map_err(|_| ConfigError::UnsupportedDockerHost(self.discovery.docker_host.clone()))
    }

    /// Buffer cap for chunked uploads, saturated to the platform's `usize`.
    pub fn chunked_upload_limit(&self) -> usize {
        usize::try_from(self.server.max_chunked_upload).unwrap_or(usize::MAX)
    }

    /// Ring parameters.
    pub fn ring_config(&self) -> RingConfig {
        RingConfig {
            partition_count: self.ring.partition_count,
            replication_factor: self.ring.replication_factor,
            load: self.ring.load,
        }
    }

    /// Registry settings using the standard startup waits.
    pub fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            name_pattern: self.discovery.name_pattern.clone(),
            api_port: self.discovery.api_port,
            ping_attempts: self.discovery.ping_attempts,
            ..RegistrySettings::default()
        }
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

fn parse_number<T: std::str::FromStr + Default>(var: &str, value: &str) -> Result<T, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(T::default());
    }
    value.parse().map_err(|_| ConfigError::InvalidNumber {
        var: var.to_string(),
        value: value.to_string(),
    })
}
