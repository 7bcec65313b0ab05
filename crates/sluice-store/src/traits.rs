//! Core trait and types for talking to a storage node.

use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use serde::Serialize;

use crate::error::StoreError;

/// A stream of object bytes flowing to or from a backend.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StoreError>> + Send>>;

/// Metadata about a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectInfo {
    /// Object key within its bucket.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
    /// Entity tag reported by the node, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// Operations the gateway needs from a single object-storage node.
///
/// All implementations must be `Send + Sync`; one handle is shared by every
/// request routed to its node for the lifetime of the process.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// List bucket names. Used as the admission liveness probe.
    async fn list_buckets(&self) -> Result<Vec<String>, StoreError>;

    /// Check whether a bucket exists.
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError>;

    /// Create a bucket.
    ///
    /// Returns [`StoreError::BucketAlreadyOwned`] if it already exists.
    async fn make_bucket(&self, bucket: &str) -> Result<(), StoreError>;

    /// Store `length` bytes read from `body` as `bucket/key`.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        length: u64,
    ) -> Result<(), StoreError>;

    /// Open an object for reading.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ByteStream, StoreError>;

    /// Fetch object metadata without its body.
    async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo, StoreError>;

    /// Remove an object. Removing a missing object succeeds.
    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), StoreError>;

    /// List every object in a bucket, sorted by key.
    async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectInfo>, StoreError>;
}

/// Wrap an in-memory buffer as a single-chunk [`ByteStream`].
pub fn stream_from_bytes(data: impl Into<Bytes>) -> ByteStream {
    let data = data.into();
    if data.is_empty() {
        return Box::pin(futures::stream::empty());
    }
    Box::pin(futures::stream::once(async move { Ok(data) }))
}

/// Drain a [`ByteStream`] into one contiguous buffer.
pub async fn collect_stream(mut stream: ByteStream) -> Result<Bytes, StoreError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}
