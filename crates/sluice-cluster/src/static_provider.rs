//! In-memory discovery provider.

use std::sync::Mutex;

use crate::discovery::{CandidateInfo, NodeDiscoveryProvider};
use crate::error::DiscoveryError;

/// A discovery provider over a fixed candidate list.
///
/// Applies the same name filter and ordering as the Docker provider. Pings
/// can be made to fail a number of times to exercise startup retries.
#[derive(Default)]
pub struct StaticProvider {
    candidates: Vec<CandidateInfo>,
    ping_failures: Mutex<u32>,
    pings: Mutex<u32>,
}

impl StaticProvider {
    /// Create a provider reporting `candidates`.
    pub fn new(candidates: Vec<CandidateInfo>) -> Self {
        Self {
            candidates,
            ..Self::default()
        }
    }

    /// Make the next `times` pings fail.
    pub fn fail_pings(self, times: u32) -> Self {
        *self.ping_failures.lock().unwrap() = times;
        self
    }

    /// Number of pings received.
    pub fn pings(&self) -> u32 {
        *self.pings.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl NodeDiscoveryProvider for StaticProvider {
    async fn ping(&self) -> Result<(), DiscoveryError> {
        *self.pings.lock().unwrap() += 1;
        let mut failures = self.ping_failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(DiscoveryError::Unreachable("static provider offline".into()));
        }
        Ok(())
    }

    async fn list_candidates(&self, pattern: &str) -> Result<Vec<CandidateInfo>, DiscoveryError> {
        let mut matching: Vec<CandidateInfo> = self
            .candidates
            .iter()
            .filter(|c| c.name.contains(pattern))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matching)
    }
}
