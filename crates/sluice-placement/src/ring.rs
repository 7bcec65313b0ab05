//! Bounded-load consistent hashing ring implementation.

use std::collections::BTreeMap;
use std::fmt;

use sluice_types::NodeId;
use tracing::debug;

use crate::error::RingError;

/// Strategy for mapping a routing key to a single node.
///
/// The gateway holds placement behind this trait so the directory can be
/// tested with hand-built layouts.
pub trait Placement: Send + Sync + fmt::Debug {
    /// The node responsible for `key`, or `None` if there are no members.
    fn locate(&self, key: &[u8]) -> Option<&NodeId>;

    /// All members known to this placement.
    fn members(&self) -> &[NodeId];
}

/// Tuning parameters for a [`Ring`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingConfig {
    /// Number of partitions the key space is divided into.
    pub partition_count: u32,
    /// Virtual positions per member.
    pub replication_factor: u32,
    /// Multiplier on the mean partitions-per-member that bounds each member.
    pub load: f64,
}

impl RingConfig {
    /// Create and validate a configuration.
    pub fn new(partition_count: u32, replication_factor: u32, load: f64) -> Result<Self, RingError> {
        let config = Self {
            partition_count,
            replication_factor,
            load,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that every parameter is usable.
    pub fn validate(&self) -> Result<(), RingError> {
        if self.partition_count == 0 {
            return Err(RingError::ZeroPartitions);
        }
        if self.replication_factor == 0 {
            return Err(RingError::ZeroReplicationFactor);
        }
        if !self.load.is_finite() || self.load <= 0.0 {
            return Err(RingError::InvalidLoad(self.load));
        }
        Ok(())
    }

    /// Partition a key falls into: `hash64(key) % partition_count`.
    ///
    /// Depends only on the configuration, never on membership. Returns 0
    /// when `partition_count` is zero.
    pub fn partition_of(&self, key: &[u8]) -> u32 {
        hash64(key)
            .checked_rem(u64::from(self.partition_count))
            .unwrap_or(0) as u32
    }
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            partition_count: 71,
            replication_factor: 20,
            load: 1.25,
        }
    }
}

/// Consistent hashing ring with bounded partition load.
///
/// Built once from a fixed member set and never mutated. Each member is
/// mapped to `replication_factor` virtual positions; each partition is
/// assigned by walking clockwise from its own position to the first member
/// that still has room under the load bound.
#[derive(Debug, Clone)]
pub struct Ring {
    config: RingConfig,
    /// Members in first-seen order, deduplicated.
    members: Vec<NodeId>,
    /// Virtual positions: ring position -> index into `members`.
    vnodes: BTreeMap<u64, usize>,
    /// Partition -> index into `members`.
    partitions: Vec<usize>,
    /// Partitions owned per member, parallel to `members`.
    loads: Vec<u32>,
    average_load: f64,
}

impl Ring {
    /// Build a ring over `members`.
    ///
    /// Duplicate IDs are collapsed. Fails if there are no members or if the
    /// load bound leaves too little room to place every partition.
    pub fn new(
        members: impl IntoIterator<Item = NodeId>,
        config: RingConfig,
    ) -> Result<Self, RingError> {
        config.validate()?;

        let mut unique: Vec<NodeId> = Vec::new();
        for member in members {
            if !unique.contains(&member) {
                unique.push(member);
            }
        }
        if unique.is_empty() {
            return Err(RingError::NoMembers);
        }

        let mut vnodes = BTreeMap::new();
        for (idx, member) in unique.iter().enumerate() {
            for i in 0..config.replication_factor {
                vnodes.insert(vnode_position(member, i), idx);
            }
        }

        let average_load = average_load(config, unique.len());
        let mut loads = vec![0u32; unique.len()];
        let mut partitions = Vec::with_capacity(config.partition_count as usize);

        for partition in 0..config.partition_count {
            let pos = partition_position(partition);

            // Walk clockwise from the partition's position, wrapping around.
            let owner = vnodes
                .range(pos..)
                .chain(vnodes.range(..pos))
                .map(|(_, idx)| *idx)
                .find(|idx| f64::from(loads[*idx] + 1) <= average_load)
                .ok_or(RingError::InsufficientCapacity {
                    partition,
                    members: unique.len(),
                    average_load,
                })?;

            loads[owner] += 1;
            partitions.push(owner);
        }

        debug!(
            members = unique.len(),
            partitions = config.partition_count,
            vnodes = vnodes.len(),
            average_load,
            "built placement ring"
        );

        Ok(Self {
            config,
            members: unique,
            vnodes,
            partitions,
            loads,
            average_load,
        })
    }

    /// Partition a key falls into. See [`RingConfig::partition_of`].
    pub fn partition_of(&self, key: &[u8]) -> u32 {
        self.config.partition_of(key)
    }

    /// Owner of a partition, or `None` if it is out of range.
    pub fn partition_owner(&self, partition: u32) -> Option<&NodeId> {
        self.partitions
            .get(partition as usize)
            .map(|idx| &self.members[*idx])
    }

    /// Maximum partitions any single member may own.
    pub fn average_load(&self) -> f64 {
        self.average_load
    }

    /// Partitions owned by each member, in member order.
    pub fn load_distribution(&self) -> Vec<(NodeId, u32)> {
        self.members
            .iter()
            .cloned()
            .zip(self.loads.iter().copied())
            .collect()
    }

    /// The configuration this ring was built with.
    pub fn config(&self) -> RingConfig {
        self.config
    }

    /// Total number of virtual positions on the ring.
    pub fn vnode_count(&self) -> usize {
        self.vnodes.len()
    }
}

impl Placement for Ring {
    fn locate(&self, key: &[u8]) -> Option<&NodeId> {
        self.partition_owner(self.partition_of(key))
    }

    fn members(&self) -> &[NodeId] {
        &self.members
    }
}

/// Hash arbitrary bytes onto the ring: first 8 bytes of blake3, little endian.
pub fn hash64(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// `ceil(floor(partitions / members) * load)`.
fn average_load(config: RingConfig, members: usize) -> f64 {
    let per_member = u64::from(config.partition_count) / members as u64;
    (per_member as f64 * config.load).ceil()
}

/// Position of a member's virtual node: hash of `"{member}{index}"`.
fn vnode_position(member: &NodeId, index: u32) -> u64 {
    hash64(format!("{member}{index}").as_bytes())
}

/// Position of a partition: hash of its index as 8 little-endian bytes.
fn partition_position(partition: u32) -> u64 {
    hash64(&u64::from(partition).to_le_bytes())
}
