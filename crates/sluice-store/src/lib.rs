//! Storage backend capability and implementations.
//!
//! This crate defines the [`StorageBackend`] trait the gateway uses to talk to
//! a single object-storage node, along with three backends:
//!
//! - [`S3Backend`] — path-style S3 REST client (SigV4 signed) over `reqwest`.
//! - [`MemoryBackend`] — in-memory buckets backed by a `RwLock<BTreeMap>`.
//! - [`FaultyBackend`] — wrapper that injects failures and latency into any
//!   backend and counts calls, for tests.
//!
//! [`ensure_bucket`] is the idempotent create-if-absent step performed before
//! every write.

mod bucket;
mod error;
mod faulty;
mod memory;
mod s3;
mod traits;

pub use bucket::ensure_bucket;
pub use error::StoreError;
pub use faulty::{Fault, FaultyBackend, Operation};
pub use memory::MemoryBackend;
pub use s3::S3Backend;
pub use traits::{ByteStream, ObjectInfo, StorageBackend, collect_stream, stream_from_bytes};
