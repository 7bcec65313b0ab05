//! A [`StorageBackend`] wrapper that injects failures and random latency.
//!
//! `FaultyBackend` wraps any `Arc<dyn StorageBackend>`. Faults are armed per
//! [`Operation`], either permanently or for the next N calls, and can be
//! changed while the wrapper is shared. Every call is counted so tests can
//! assert that a code path did (or did not) reach the backend. Latency is
//! drawn from a seeded RNG for reproducible runs.
//!
//! # Example
//!
//! ```ignore
//! let faulty = FaultyBackend::new(inner).latency(5, 20).seed(42);
//! faulty.inject_times(Operation::ListBuckets, Fault::Unavailable, 2);
//! ```

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::error::StoreError;
use crate::traits::{ByteStream, ObjectInfo, StorageBackend, collect_stream};

/// Backend operations that can be faulted and counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListBuckets,
    BucketExists,
    MakeBucket,
    PutObject,
    GetObject,
    StatObject,
    RemoveObject,
    ListObjects,
}

/// Kind of failure to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Generic server-side failure (HTTP 503 `ServiceUnavailable`).
    Unavailable,
    /// The node refuses the request.
    AccessDenied,
    /// The object is reported missing with the raw `NotFoundObject` code.
    NotFoundObject,
    /// Bucket creation reports that the bucket already exists.
    BucketAlreadyOwned,
    /// `get_object` opens, but its stream fails before the first chunk.
    BrokenStream,
    /// `get_object` opens and yields part of the body, then fails.
    MidStream,
}

impl Fault {
    fn to_error(self, op: Operation) -> StoreError {
        match self {
            Self::Unavailable | Self::BrokenStream | Self::MidStream => StoreError::Backend {
                status: 503,
                code: "ServiceUnavailable".to_string(),
                message: format!("injected failure in {op:?}"),
            },
            Self::AccessDenied => StoreError::AccessDenied {
                message: format!("injected denial in {op:?}"),
            },
            Self::NotFoundObject => StoreError::Backend {
                status: 404,
                code: "NotFoundObject".to_string(),
                message: "injected missing object".to_string(),
            },
            Self::BucketAlreadyOwned => StoreError::BucketAlreadyOwned {
                bucket: "injected".to_string(),
            },
        }
    }
}

struct ArmedFault {
    fault: Fault,
    /// `None` means permanent.
    remaining: Option<u32>,
}

/// A [`StorageBackend`] wrapper for failure and latency testing.
pub struct FaultyBackend {
    inner: Arc<dyn StorageBackend>,
    faults: Mutex<HashMap<Operation, ArmedFault>>,
    calls: Mutex<HashMap<Operation, u32>>,
    latency_ms: (u64, u64),
    rng: Mutex<StdRng>,
}

impl FaultyBackend {
    /// Wrap an existing backend with no faults and zero latency.
    pub fn new(inner: Arc<dyn StorageBackend>) -> Self {
        Self {
            inner,
            faults: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            latency_ms: (0, 0),
            rng: Mutex::new(StdRng::seed_from_u64(0)),
        }
    }

    /// Set the per-call latency range in milliseconds (uniform random).
    pub fn latency(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.latency_ms = (min_ms, max_ms);
        self
    }

    /// Set the RNG seed for deterministic latency.
    pub fn seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    /// Fail every future call to `op`.
    pub fn inject(&self, op: Operation, fault: Fault) {
        self.arm(op, fault, None);
    }

    /// Fail the next `times` calls to `op`, then pass through.
    pub fn inject_times(&self, op: Operation, fault: Fault, times: u32) {
        self.arm(op, fault, Some(times));
    }

    /// Remove any fault armed for `op`.
    pub fn clear(&self, op: Operation) {
        self.faults.lock().unwrap().remove(&op);
    }

    /// Number of calls made to `op` so far, including failed ones.
    pub fn calls(&self, op: Operation) -> u32 {
        self.calls.lock().unwrap().get(&op).copied().unwrap_or(0)
    }

    /// Total number of calls across all operations.
    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }

    fn arm(&self, op: Operation, fault: Fault, remaining: Option<u32>) {
        if remaining == Some(0) {
            return;
        }
        debug!(?op, ?fault, ?remaining, "arming backend fault");
        self.faults
            .lock()
            .unwrap()
            .insert(op, ArmedFault { fault, remaining });
    }

    /// Record the call, sleep, and return the fault to apply, if any.
    async fn enter(&self, op: Operation) -> Option<Fault> {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;
        self.delay().await;

        let mut faults = self.faults.lock().unwrap();
        let armed = faults.get_mut(&op)?;
        let fault = armed.fault;
        let exhausted = match armed.remaining.as_mut() {
            None => false,
            Some(n) => {
                *n = n.saturating_sub(1);
                *n == 0
            }
        };
        if exhausted {
            faults.remove(&op);
        }
        Some(fault)
    }

    /// Sleep for a random duration in the configured range.
    async fn delay(&self) {
        let (min, max) = self.latency_ms;

        if max == 0 {
            return;
        }

        let ms = if min == max {
            min
        } else {
            self.rng.lock().unwrap().random_range(min..=max)
        };

        if ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(ms)).await;
        }
    }

    async fn check(&self, op: Operation) -> Result<(), StoreError> {
        match self.enter(op).await {
            Some(fault) => Err(fault.to_error(op)),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl StorageBackend for FaultyBackend {
    async fn list_buckets(&self) -> Result<Vec<String>, StoreError> {
        self.check(Operation::ListBuckets).await?;
        self.inner.list_buckets().await
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        self.check(Operation::BucketExists).await?;
        self.inner.bucket_exists(bucket).await
    }

    async fn make_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        self.check(Operation::MakeBucket).await?;
        self.inner.make_bucket(bucket).await
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        length: u64,
    ) -> Result<(), StoreError> {
        self.check(Operation::PutObject).await?;
        self.inner.put_object(bucket, key, body, length).await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ByteStream, StoreError> {
        let op = Operation::GetObject;
        match self.enter(op).await {
            None => self.inner.get_object(bucket, key).await,
            Some(Fault::BrokenStream) => {
                let err = StoreError::Io(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "injected stream failure",
                ));
                Ok(Box::pin(futures::stream::iter(vec![Err(err)])))
            }
            Some(Fault::MidStream) => {
                let data = collect_stream(self.inner.get_object(bucket, key).await?).await?;
                let half = data.slice(..data.len() / 2);
                let err = StoreError::Io(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "injected mid-stream failure",
                ));
                let chunks: Vec<Result<Bytes, StoreError>> = vec![Ok(half), Err(err)];
                Ok(Box::pin(futures::stream::iter(chunks)))
            }
            Some(fault) => Err(fault.to_error(op)),
        }
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo, StoreError> {
        self.check(Operation::StatObject).await?;
        self.inner.stat_object(bucket, key).await
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.check(Operation::RemoveObject).await?;
        self.inner.remove_object(bucket, key).await
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        self.check(Operation::ListObjects).await?;
        self.inner.list_objects(bucket).await
    }
}
