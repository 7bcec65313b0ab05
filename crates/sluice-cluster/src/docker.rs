//! Docker Engine API discovery provider.
//!
//! Candidates are running containers whose name contains the configured
//! pattern. Each kept container is inspected for its network addresses and
//! environment. The engine is reached through its Unix socket (`unix://`,
//! the Docker default) or over TCP (`tcp://`, `http(s)://`).

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::Request;
use hyper::header::HOST;
use hyper_util::rt::TokioIo;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::net::UnixStream;
use tracing::{debug, trace};

use crate::discovery::{CandidateInfo, NodeDiscoveryProvider};
use crate::error::DiscoveryError;

/// Engine address used when neither config nor `DOCKER_HOST` name one.
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

/// Where the Docker engine API is served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerEndpoint {
    /// HTTP base URL, e.g. `http://127.0.0.1:2375`.
    Http(String),
    /// Path of the engine's Unix domain socket.
    Unix(PathBuf),
}

impl DockerEndpoint {
    /// Parse a `DOCKER_HOST`-style address.
    ///
    /// `unix:///path` names a socket; `tcp://host:port` becomes
    /// `http://host:port`; `http://` and `https://` pass through. Anything
    /// else is rejected.
    pub fn parse(host: &str) -> Result<Self, DiscoveryError> {
        let host = host.trim();
        if let Some(path) = host.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(DiscoveryError::UnsupportedHost(host.to_string()));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        let host = host.trim_end_matches('/');
        if let Some(rest) = host.strip_prefix("tcp://") {
            return Ok(Self::Http(format!("http://{rest}")));
        }
        if host.starts_with("http://") || host.starts_with("https://") {
            return Ok(Self::Http(host.to_string()));
        }
        Err(DiscoveryError::UnsupportedHost(host.to_string()))
    }
}

impl fmt::Display for DockerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(url) => f.write_str(url),
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerSummary {
    id: String,
    #[serde(default)]
    names: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerInspect {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    config: Option<ContainerConfig>,
    #[serde(default)]
    network_settings: Option<NetworkSettings>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerConfig {
    #[serde(default)]
    env: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkSettings {
    #[serde(default)]
    networks: Option<BTreeMap<String, EndpointSettings>>,
}

#[derive(Debug, Deserialize)]
struct EndpointSettings {
    #[serde(rename = "IPAddress", default)]
    ip_address: String,
}

#[derive(Debug, Deserialize)]
struct EngineError {
    message: String,
}

enum Transport {
    Http { client: Client, base_url: String },
    Unix { socket: PathBuf },
}

/// Discovers storage nodes among containers of a Docker engine.
pub struct DockerProvider {
    endpoint: DockerEndpoint,
    transport: Transport,
}

impl DockerProvider {
    /// Create a provider for the engine at `host`.
    pub fn new(host: &str) -> Result<Self, DiscoveryError> {
        let endpoint = DockerEndpoint::parse(host)?;
        let transport = match &endpoint {
            DockerEndpoint::Http(base_url) => Transport::Http {
                client: Client::builder()
                    .user_agent(concat!("sluice/", env!("CARGO_PKG_VERSION")))
                    .build()?,
                base_url: base_url.clone(),
            },
            DockerEndpoint::Unix(socket) => Transport::Unix {
                socket: socket.clone(),
            },
        };
        Ok(Self {
            endpoint,
            transport,
        })
    }

    /// The engine endpoint requests are sent to.
    pub fn endpoint(&self) -> &DockerEndpoint {
        &self.endpoint
    }

    /// GET `path` and return the body of a successful response.
    async fn get(&self, path: &str) -> Result<Bytes, DiscoveryError> {
        let (status, body) = match &self.transport {
            Transport::Http { client, base_url } => {
                let url = format!("{base_url}{path}");
                trace!(%url, "docker request");
                let resp = client.get(url).send().await.map_err(|e| {
                    if e.is_connect() || e.is_timeout() {
                        DiscoveryError::Unreachable(e.to_string())
                    } else {
                        DiscoveryError::Transport(e)
                    }
                })?;
                let status = resp.status().as_u16();
                (status, resp.bytes().await?)
            }
            Transport::Unix { socket } => unix_get(socket, path).await?,
        };

        if (200..300).contains(&status) {
            return Ok(body);
        }
        let message = serde_json::from_slice::<EngineError>(&body)
            .map(|e| e.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
        Err(DiscoveryError::Api { status, message })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, DiscoveryError> {
        Ok(serde_json::from_slice(&self.get(path).await?)?)
    }
}

/// One HTTP/1.1 GET over a fresh connection to the engine socket.
async fn unix_get(socket: &Path, path: &str) -> Result<(u16, Bytes), DiscoveryError> {
    trace!(socket = %socket.display(), path, "docker request");
    let stream = UnixStream::connect(socket)
        .await
        .map_err(|e| DiscoveryError::Unreachable(format!("{}: {e}", socket.display())))?;

    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .map_err(|e| DiscoveryError::Protocol(e.to_string()))?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "docker socket connection closed with error");
        }
    });

    let request = Request::get(path)
        .header(HOST, "docker")
        .body(Empty::<Bytes>::new())
        .map_err(|e| DiscoveryError::Protocol(e.to_string()))?;
    let resp = sender
        .send_request(request)
        .await
        .map_err(|e| DiscoveryError::Protocol(e.to_string()))?;
    let status = resp.status().as_u16();
    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| DiscoveryError::Protocol(e.to_string()))?
        .to_bytes();
    Ok((status, body))
}

#[async_trait::async_trait]
impl NodeDiscoveryProvider for DockerProvider {
    async fn ping(&self) -> Result<(), DiscoveryError> {
        self.get("/_ping").await?;
        Ok(())
    }

    async fn list_candidates(&self, pattern: &str) -> Result<Vec<CandidateInfo>, DiscoveryError> {
        // The engine lists only running containers unless `all=true`.
        let containers: Vec<ContainerSummary> = self.get_json("/containers/json").await?;

        let mut candidates = Vec::new();
        for container in containers {
            let names = container.names.unwrap_or_default();
            if !names.iter().any(|name| name.contains(pattern)) {
                continue;
            }

            let inspect: ContainerInspect = self
                .get_json(&format!("/containers/{}/json", container.id))
                .await?;
            let addresses = inspect
                .network_settings
                .and_then(|s| s.networks)
                .unwrap_or_default()
                .into_values()
                .map(|n| n.ip_address)
                .collect();
            let env = inspect.config.and_then(|c| c.env).unwrap_or_default();

            candidates.push(CandidateInfo {
                id: inspect.id,
                name: inspect.name.trim_start_matches('/').to_string(),
                addresses,
                env,
            });
        }

        candidates.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(pattern, count = candidates.len(), "listed docker candidates");
        Ok(candidates)
    }
}
