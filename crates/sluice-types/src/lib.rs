//! Shared types and identifiers for Sluice.
//!
//! This crate defines the value types passed between the gateway crates:
//! backend identity ([`NodeId`]), the validated object key ([`ObjectKey`]),
//! and the connection details extracted for a storage node
//! ([`NodeEndpoint`], [`Credentials`]).

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Node identity
// ---------------------------------------------------------------------------

/// Opaque identifier of a backend storage node.
///
/// For container discovery this is the container ID. The gateway never
/// interprets the value; it is only hashed onto the ring and used as a
/// lookup key.
#[derive(Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a node ID from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log output (first 12 characters, like `docker ps`).
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(12) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<[u8]> for NodeId {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Object keys
// ---------------------------------------------------------------------------

/// Maximum length of an object key, in bytes.
pub const MAX_KEY_LEN: usize = 32;

/// Rejected object key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidKey {
    /// The key was empty.
    #[error("object key is empty")]
    Empty,

    /// The key exceeded [`MAX_KEY_LEN`].
    #[error("object key is {len} bytes long, at most {MAX_KEY_LEN} allowed")]
    TooLong {
        /// Actual length in bytes.
        len: usize,
    },

    /// The key contained a byte outside `[A-Za-z0-9]`.
    #[error("object key contains invalid character {ch:?} at position {position}")]
    InvalidCharacter {
        /// The offending character.
        ch: char,
        /// Character index within the key.
        position: usize,
    },
}

/// A validated object key matching `^[A-Za-z0-9]{1,32}$`.
///
/// The same key is used as the ring routing key and as the object name on
/// the backend. Because only ASCII alphanumerics are accepted, it never
/// needs escaping in a storage path.
#[derive(Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Validate and wrap a raw key.
    pub fn parse(raw: &str) -> Result<Self, InvalidKey> {
        if raw.is_empty() {
            return Err(InvalidKey::Empty);
        }

        if let Some((position, ch)) = raw
            .chars()
            .enumerate()
            .find(|(_, c)| !c.is_ascii_alphanumeric())
        {
            return Err(InvalidKey::InvalidCharacter { ch, position });
        }

        // All characters are ASCII here, so byte length == char count.
        if raw.len() > MAX_KEY_LEN {
            return Err(InvalidKey::TooLong { len: raw.len() });
        }

        Ok(Self(raw.to_string()))
    }

    /// Borrow the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Bytes fed to the placement hash.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl FromStr for ObjectKey {
    type Err = InvalidKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for ObjectKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectKey({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Connection details
// ---------------------------------------------------------------------------

/// Network location of a storage node's S3 API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeEndpoint {
    /// Selected node address.
    pub ip: IpAddr,
    /// S3 API port.
    pub port: u16,
}

impl NodeEndpoint {
    /// Create an endpoint from an address and port.
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Socket address form (IPv6 addresses are bracketed when displayed).
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// Base URL for plain-HTTP access, e.g. `http://10.0.0.2:9000`.
    pub fn http_url(&self) -> String {
        format!("http://{}", self.socket_addr())
    }
}

impl fmt::Display for NodeEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

/// Access key pair for a storage node.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Access key (user).
    pub access_key: String,
    /// Secret key (password). Never logged.
    pub secret_key: String,
}

impl Credentials {
    /// Create a credential pair.
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}
