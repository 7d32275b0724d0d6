//! Encrypted running counts, one per candidate, created the first time a decrypted vote names
//! the candidate. A counter only ever starts at zero and grows by one.
use std::collections::HashMap;

use serde::Serialize;

use crate::{
    clock::Timestamp,
    handle::{CiphertextStore, Handle},
    oracle::RequestId,
    registry::CandidateRegistry,
    Result,
};

/// The latest decrypted value of a candidate's counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RevealedCount {
    pub count: u64,
    pub request_id: RequestId,
    pub revealed_at: Timestamp,
}

#[derive(Debug, Default)]
pub struct TallyEngine {
    counts: HashMap<String, Handle>,
    revealed: HashMap<String, RevealedCount>,
}

impl TallyEngine {
    pub fn new() -> Self {
        return Self::default();
    }

    /// Count one more vote for `candidate`. An unseen candidate gets a fresh encrypted zero and
    /// is appended to the registry before the increment. Returns whether the candidate was new.
    ///
    /// Nothing is written unless the store accepted both operations.
    pub fn record_vote<S: CiphertextStore>(
        &mut self,
        store: &mut S,
        registry: &mut CandidateRegistry,
        candidate: &str,
    ) -> Result<bool> {
        let (current, first) = match self.counts.get(candidate) {
            Some(handle) if store.is_initialized(handle) => (*handle, false),
            _ => (store.zero(), true),
        };
        let next = store.add_one(&current)?;

        if first {
            registry.register(candidate);
        }
        self.counts.insert(candidate.to_string(), next);
        return Ok(first);
    }

    pub fn encrypted_count(&self, candidate: &str) -> Option<Handle> {
        return self.counts.get(candidate).copied();
    }

    pub fn contains(&self, candidate: &str) -> bool {
        return self.counts.contains_key(candidate);
    }

    /// Remember a decrypted count. A later reveal replaces an earlier one.
    pub fn reveal(&mut self, candidate: &str, count: RevealedCount) {
        self.revealed.insert(candidate.to_string(), count);
    }

    pub fn revealed(&self, candidate: &str) -> Option<&RevealedCount> {
        return self.revealed.get(candidate);
    }
}
