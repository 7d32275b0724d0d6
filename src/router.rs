//! Pending decryption requests, keyed by the id the oracle issued.
//!
//! Votes and candidate tallies share the routing table, so the target is a tagged value and a
//! vote id can never be mistaken for a candidate hash.
use std::collections::HashMap;

use serde::Serialize;

use crate::{clock::Timestamp, ledger::VoteId, oracle::RequestId, registry::CandidateHash};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum Target {
    Vote(VoteId),
    Candidate(CandidateHash),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PendingRequest {
    pub target: Target,
    pub requested_at: Timestamp,
    /// `None` waits forever
    pub expires_at: Option<Timestamp>,
}

impl PendingRequest {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        return self.expires_at.map_or(false, |deadline| now >= deadline);
    }
}

#[derive(Debug, Default)]
pub struct RequestRouter {
    pending: HashMap<RequestId, PendingRequest>,
    /// The newest request per vote, used to refuse duplicates while one is in flight
    latest_for_vote: HashMap<VoteId, RequestId>,
    ttl: Option<u64>,
}

impl RequestRouter {
    pub fn new(ttl: Option<u64>) -> Self {
        return Self {
            ttl,
            ..Self::default()
        };
    }

    pub fn register(&mut self, request_id: RequestId, target: Target, now: Timestamp) {
        let request = PendingRequest {
            target,
            requested_at: now,
            expires_at: self.ttl.map(|ttl| now.saturating_add(ttl)),
        };
        if let Target::Vote(vote_id) = target {
            self.latest_for_vote.insert(vote_id, request_id);
        }
        self.pending.insert(request_id, request);
    }

    /// The unexpired request currently in flight for `vote_id`, if any
    pub fn in_flight_for_vote(&self, vote_id: VoteId, now: Timestamp) -> Option<RequestId> {
        let request_id = self.latest_for_vote.get(&vote_id)?;
        let request = self.pending.get(request_id)?;
        if request.is_expired(now) {
            return None;
        }
        return Some(*request_id);
    }

    pub fn get(&self, request_id: &RequestId) -> Option<&PendingRequest> {
        return self.pending.get(request_id);
    }

    /// Remove a request once its callback has been applied
    pub fn resolve(&mut self, request_id: &RequestId) -> Option<PendingRequest> {
        let request = self.pending.remove(request_id)?;
        self.forget_vote_link(request_id, &request);
        return Some(request);
    }

    /// Drop every request whose deadline has passed, oldest first
    pub fn reap_expired(&mut self, now: Timestamp) -> Vec<(RequestId, PendingRequest)> {
        let mut expired = self
            .pending
            .iter()
            .filter(|(_, request)| request.is_expired(now))
            .map(|(id, request)| (*id, *request))
            .collect::<Vec<(RequestId, PendingRequest)>>();
        expired.sort_by_key(|(id, request)| (request.requested_at, *id));

        for (id, request) in expired.iter() {
            self.pending.remove(id);
            self.forget_vote_link(id, request);
        }
        return expired;
    }

    fn forget_vote_link(&mut self, request_id: &RequestId, request: &PendingRequest) {
        if let Target::Vote(vote_id) = request.target {
            if self.latest_for_vote.get(&vote_id) == Some(request_id) {
                self.latest_for_vote.remove(&vote_id);
            }
        }
    }

    pub fn len(&self) -> usize {
        return self.pending.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.pending.is_empty();
    }
}
