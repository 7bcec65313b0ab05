//! In-memory storage backend.

use std::collections::BTreeMap;
use std::sync::RwLock;

use bytes::Bytes;
use tracing::debug;

use crate::error::StoreError;
use crate::traits::{ByteStream, ObjectInfo, StorageBackend, collect_stream, stream_from_bytes};

type Buckets = BTreeMap<String, BTreeMap<String, Bytes>>;

/// In-memory object store backed by a `RwLock<BTreeMap>`.
///
/// Behaves like a single S3 node: buckets must be created before use and
/// creating an existing bucket reports [`StoreError::BucketAlreadyOwned`].
/// Used by the dev fleet and tests.
#[derive(Default)]
pub struct MemoryBackend {
    buckets: RwLock<Buckets>,
}

impl MemoryBackend {
    /// Create an empty backend with no buckets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently stored in `bucket`.
    pub fn object_count(&self, bucket: &str) -> usize {
        let map = self.buckets.read().expect("lock poisoned");
        map.get(bucket).map_or(0, BTreeMap::len)
    }

    fn no_such_bucket(bucket: &str) -> StoreError {
        StoreError::NoSuchBucket {
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl StorageBackend for MemoryBackend {
    async fn list_buckets(&self) -> Result<Vec<String>, StoreError> {
        let map = self.buckets.read().expect("lock poisoned");
        Ok(map.keys().cloned().collect())
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        let map = self.buckets.read().expect("lock poisoned");
        Ok(map.contains_key(bucket))
    }

    async fn make_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        let mut map = self.buckets.write().expect("lock poisoned");
        if map.contains_key(bucket) {
            return Err(StoreError::BucketAlreadyOwned {
                bucket: bucket.to_string(),
            });
        }
        map.insert(bucket.to_string(), BTreeMap::new());
        debug!(bucket, "created bucket in memory");
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        length: u64,
    ) -> Result<(), StoreError> {
        // Drain the body before taking the lock.
        let data = collect_stream(body).await?;
        if data.len() as u64 != length {
            return Err(StoreError::LengthMismatch {
                expected: length,
                actual: data.len() as u64,
            });
        }

        let mut map = self.buckets.write().expect("lock poisoned");
        let objects = map
            .get_mut(bucket)
            .ok_or_else(|| Self::no_such_bucket(bucket))?;
        debug!(bucket, key, size = data.len(), "storing object in memory");
        objects.insert(key.to_string(), data);
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ByteStream, StoreError> {
        let map = self.buckets.read().expect("lock poisoned");
        let objects = map.get(bucket).ok_or_else(|| Self::no_such_bucket(bucket))?;
        let data = objects.get(key).cloned().ok_or_else(|| StoreError::NoSuchKey {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })?;
        Ok(stream_from_bytes(data))
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo, StoreError> {
        let map = self.buckets.read().expect("lock poisoned");
        let objects = map.get(bucket).ok_or_else(|| Self::no_such_bucket(bucket))?;
        let data = objects.get(key).ok_or_else(|| StoreError::NoSuchKey {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })?;
        Ok(ObjectInfo {
            key: key.to_string(),
            size: data.len() as u64,
            etag: Some(blake3::hash(data).to_hex()[..32].to_string()),
        })
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let mut map = self.buckets.write().expect("lock poisoned");
        let objects = map
            .get_mut(bucket)
            .ok_or_else(|| Self::no_such_bucket(bucket))?;
        if objects.remove(key).is_some() {
            debug!(bucket, key, "removed object from memory");
        }
        Ok(())
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        let map = self.buckets.read().expect("lock poisoned");
        let objects = map.get(bucket).ok_or_else(|| Self::no_such_bucket(bucket))?;
        Ok(objects
            .iter()
            .map(|(key, data)| ObjectInfo {
                key: key.clone(),
                size: data.len() as u64,
                etag: None,
            })
            .collect())
    }
}
