//! Append-only record of submitted votes and their decrypted counterparts
use serde::Serialize;

use crate::{clock::Timestamp, handle::Handle, Result, VotingError};

/// Sequential vote identifier. Issued from 1; 0 never names a vote.
pub type VoteId = u64;

/// An encrypted vote as submitted. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Vote {
    pub id: VoteId,
    pub encrypted_candidate: Handle,
    pub encrypted_weight: Handle,
    pub submitted_at: Timestamp,
}

/// The decrypted view of a vote. Empty until its decryption callback lands, then frozen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VoteResult {
    pub vote_id: VoteId,
    pub candidate: String,
    pub weight: u64,
    pub counted: bool,
}

#[derive(Debug, Default)]
pub struct VoteLedger {
    /// `votes[i]` and `results[i]` both belong to vote `i + 1`
    votes: Vec<Vote>,
    results: Vec<VoteResult>,
}

impl VoteLedger {
    pub fn new() -> Self {
        return Self::default();
    }

    /// Store a vote under the next id
    pub fn submit(
        &mut self,
        encrypted_candidate: Handle,
        encrypted_weight: Handle,
        submitted_at: Timestamp,
    ) -> VoteId {
        let id = self.votes.len() as VoteId + 1;
        self.votes.push(Vote {
            id,
            encrypted_candidate,
            encrypted_weight,
            submitted_at,
        });
        self.results.push(VoteResult {
            vote_id: id,
            ..VoteResult::default()
        });
        return id;
    }

    fn index(&self, id: VoteId) -> Option<usize> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        if index < self.votes.len() {
            return Some(index);
        }
        return None;
    }

    pub fn get(&self, id: VoteId) -> Option<&Vote> {
        return self.index(id).map(|i| &self.votes[i]);
    }

    pub fn result(&self, id: VoteId) -> Option<&VoteResult> {
        return self.index(id).map(|i| &self.results[i]);
    }

    /// `(candidate, weight, counted)`, or the zero triple if the vote is unknown or still
    /// pending. A `false` here does not tell those two cases apart.
    pub fn decrypted(&self, id: VoteId) -> (String, u64, bool) {
        return match self.result(id) {
            Some(result) => (result.candidate.clone(), result.weight, result.counted),
            None => (String::new(), 0, false),
        };
    }

    pub fn is_counted(&self, id: VoteId) -> bool {
        return self.result(id).map_or(false, |result| result.counted);
    }

    /// The one and only write to a vote result
    pub fn mark_counted(&mut self, id: VoteId, candidate: String, weight: u64) -> Result<()> {
        let index = self.index(id).ok_or(VotingError::UnknownVote(id))?;
        let result = &mut self.results[index];
        if result.counted {
            return Err(VotingError::AlreadyDecrypted(id));
        }
        result.candidate = candidate;
        result.weight = weight;
        result.counted = true;
        return Ok(());
    }

    pub fn len(&self) -> usize {
        return self.votes.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.votes.is_empty();
    }
}
