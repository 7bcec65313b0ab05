//! Error types for ring construction.

/// Errors that can occur while configuring or building a [`Ring`](crate::Ring).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RingError {
    /// The partition count was zero.
    #[error("ring partition count must be greater than zero")]
    ZeroPartitions,

    /// The replication factor was zero.
    #[error("ring replication factor must be greater than zero")]
    ZeroReplicationFactor,

    /// The load factor was zero, negative, or not a finite number.
    #[error("ring load factor must be a positive finite number, got {0}")]
    InvalidLoad(f64),

    /// The ring was built without any members.
    #[error("cannot build a ring without members")]
    NoMembers,

    /// No member could accept a partition without exceeding the load bound.
    #[error(
        "not enough room to distribute partition {partition}: \
         {members} members with average load {average_load}"
    )]
    InsufficientCapacity {
        /// The partition that could not be placed.
        partition: u32,
        /// Number of ring members.
        members: usize,
        /// Per-member partition limit.
        average_load: f64,
    },
}
