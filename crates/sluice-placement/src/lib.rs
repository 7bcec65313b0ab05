//! Consistent hashing ring for deterministic key placement.
//!
//! This crate maps object keys to backend nodes. The key space is divided
//! into a fixed number of partitions; each partition is assigned to exactly
//! one node when the ring is built, and a key is routed through its
//! partition. Because partitions (not keys) are placed, adding or removing a
//! node only remaps the partitions that node gains or loses.
//!
//! Each node occupies `replication_factor` virtual positions on a `u64` ring,
//! determined by `blake3("{node_id}{index}")`. Partitions are placed by
//! walking clockwise from the partition's own position, skipping any node
//! whose partition count would exceed the load bound
//! (`ceil(floor(partitions / nodes) * load)`).

mod error;
mod ring;

pub use error::RingError;
pub use ring::{Placement, Ring, RingConfig, hash64};
