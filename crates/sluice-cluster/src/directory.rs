//! The routing directory: placement plus per-node handles.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use sluice_placement::{Placement, Ring, RingConfig, RingError};
use sluice_store::StorageBackend;
use sluice_types::{NodeId, ObjectKey};

use crate::error::LocateError;
use crate::registry::Node;

/// Immutable map from object keys to backend handles.
///
/// Built once at startup and shared behind an `Arc`; nothing is ever
/// mutated afterwards, so lookups take no lock.
pub struct Directory {
    placement: Arc<dyn Placement>,
    handles: HashMap<NodeId, Arc<dyn StorageBackend>>,
}

impl Directory {
    /// Build a ring over `nodes` and index their handles.
    pub fn build(nodes: Vec<Node>, config: RingConfig) -> Result<Self, RingError> {
        let ring = Ring::new(nodes.iter().map(|n| n.id.clone()), config)?;
        let handles = nodes.into_iter().map(|n| (n.id, n.backend)).collect();
        Ok(Self::from_parts(Arc::new(ring), handles))
    }

    /// Assemble a directory from an existing placement and handle table.
    ///
    /// No consistency check is made; a member without a handle surfaces as
    /// [`LocateError::UnknownNode`] when a key routes to it.
    pub fn from_parts(
        placement: Arc<dyn Placement>,
        handles: HashMap<NodeId, Arc<dyn StorageBackend>>,
    ) -> Self {
        Self { placement, handles }
    }

    /// Resolve `key` to its node's handle and ID.
    pub fn locate(&self, key: &ObjectKey) -> Result<(Arc<dyn StorageBackend>, NodeId), LocateError> {
        let node = self
            .placement
            .locate(key.as_bytes())
            .ok_or(LocateError::NoMembers)?;
        let handle = self
            .handles
            .get(node)
            .ok_or_else(|| LocateError::UnknownNode(node.clone()))?;
        Ok((handle.clone(), node.clone()))
    }

    /// Every placement member, sorted.
    pub fn members(&self) -> Vec<NodeId> {
        let mut members = self.placement.members().to_vec();
        members.sort();
        members
    }

    /// Handle for a specific node.
    pub fn handle(&self, node: &NodeId) -> Option<Arc<dyn StorageBackend>> {
        self.handles.get(node).cloned()
    }

    /// Number of nodes with a handle.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the directory holds no handles.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl fmt::Debug for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Directory")
            .field("members", &self.members())
            .finish_non_exhaustive()
    }
}
