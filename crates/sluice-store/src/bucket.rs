//! Idempotent bucket creation.

use tracing::{debug, info};

use crate::error::StoreError;
use crate::traits::StorageBackend;

/// Make sure `bucket` exists on `backend`, creating it if absent.
///
/// Concurrent callers may race between the existence check and the create;
/// the loser's "already exists" answer counts as success.
pub async fn ensure_bucket(backend: &dyn StorageBackend, bucket: &str) -> Result<(), StoreError> {
    if backend.bucket_exists(bucket).await? {
        return Ok(());
    }

    match backend.make_bucket(bucket).await {
        Ok(()) => {
            info!(bucket, "created bucket");
            Ok(())
        }
        Err(StoreError::BucketAlreadyOwned { .. }) => {
            debug!(bucket, "bucket created concurrently");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
