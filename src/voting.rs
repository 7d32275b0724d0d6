//! The voting state machine.
//!
//! Votes arrive encrypted and are stored as submitted. Anyone may ask for a vote to be
//! decrypted; the request goes to the oracle and is remembered under the id the oracle hands
//! back. When the oracle calls back with a cleartext and a proof, the proof is checked, the id
//! is routed back to the vote, the vote result is frozen and the candidate's encrypted counter
//! grows by one. Candidate counters can be decrypted the same way.
//!
//! All calls are serialized by `&mut self`, so the only discipline needed against duplicate or
//! replayed callbacks is the `counted` guard and the removal of resolved requests.
use tracing::{debug, info, warn};

use crate::{
    clock::{Clock, SystemClock},
    codec,
    config::Config,
    events::{Event, EventLog},
    handle::{CiphertextStore, Handle},
    ledger::{Vote, VoteId, VoteLedger},
    oracle::{CallbackKind, DecryptionOracle, ProofVerifier, RequestId},
    registry::{candidate_hash, CandidateRegistry},
    router::{RequestRouter, Target},
    tally::{RevealedCount, TallyEngine},
    Result, VotingError,
};

pub struct VotingState<S, O, V, C = SystemClock> {
    store: S,
    oracle: O,
    verifier: V,
    clock: C,
    ledger: VoteLedger,
    router: RequestRouter,
    tallies: TallyEngine,
    registry: CandidateRegistry,
    events: EventLog,
}

impl<S, O, V, C> VotingState<S, O, V, C>
where
    S: CiphertextStore,
    O: DecryptionOracle,
    V: ProofVerifier,
    C: Clock,
{
    pub fn new(store: S, oracle: O, verifier: V, clock: C, config: &Config) -> Self {
        return Self {
            store,
            oracle,
            verifier,
            clock,
            ledger: VoteLedger::new(),
            router: RequestRouter::new(config.request_ttl_secs),
            tallies: TallyEngine::new(),
            registry: CandidateRegistry::new(),
            events: EventLog::new(),
        };
    }

    /// Accept an encrypted `(candidate, weight)` pair. The ciphertexts are not inspected;
    /// garbage only shows up once decrypted.
    pub fn submit_encrypted_vote(
        &mut self,
        encrypted_candidate: Handle,
        encrypted_weight: Handle,
    ) -> VoteId {
        let now = self.clock.now();
        let vote_id = self
            .ledger
            .submit(encrypted_candidate, encrypted_weight, now);
        self.events.emit(Event::VoteSubmitted {
            vote_id,
            timestamp: now,
        });
        debug!(vote_id, timestamp = now, "vote submitted");
        return vote_id;
    }

    /// Ask the oracle to decrypt both halves of a vote
    pub fn request_vote_decryption(&mut self, vote_id: VoteId) -> Result<RequestId> {
        let vote = self
            .ledger
            .get(vote_id)
            .ok_or(VotingError::UnknownVote(vote_id))?;
        if self.ledger.is_counted(vote_id) {
            return Err(VotingError::AlreadyDecrypted(vote_id));
        }
        let now = self.clock.now();
        if let Some(request_id) = self.router.in_flight_for_vote(vote_id, now) {
            return Err(VotingError::DecryptionPending {
                vote_id,
                request_id,
            });
        }

        let handles = [
            self.store.to_transport(&vote.encrypted_candidate),
            self.store.to_transport(&vote.encrypted_weight),
        ];
        let request_id = self
            .oracle
            .request_decryption(&handles, CallbackKind::VoteDecrypted);
        self.router.register(request_id, Target::Vote(vote_id), now);
        self.events.emit(Event::DecryptionRequested {
            vote_id,
            request_id,
        });
        debug!(vote_id, %request_id, "vote decryption requested");
        return Ok(request_id);
    }

    /// `(candidate, weight, counted)`; the zero triple for unknown or undecrypted votes
    pub fn get_decrypted_vote(&self, vote_id: VoteId) -> (String, u64, bool) {
        return self.ledger.decrypted(vote_id);
    }

    pub fn get_encrypted_candidate_count(&self, candidate: &str) -> Option<Handle> {
        return self.tallies.encrypted_count(candidate);
    }

    /// Ask the oracle to decrypt a candidate's running count. Several such requests may be in
    /// flight at once; each reveals the count as of its own request.
    pub fn request_candidate_count_decryption(&mut self, candidate: &str) -> Result<RequestId> {
        let handle = self
            .tallies
            .encrypted_count(candidate)
            .ok_or_else(|| VotingError::CandidateNotFound(candidate.to_string()))?;
        let now = self.clock.now();
        let request_id = self.oracle.request_decryption(
            &[self.store.to_transport(&handle)],
            CallbackKind::TallyDecrypted,
        );
        self.router
            .register(request_id, Target::Candidate(candidate_hash(candidate)), now);
        self.events.emit(Event::TallyDecryptionRequested {
            candidate: candidate.to_string(),
            request_id,
        });
        debug!(candidate, %request_id, "tally decryption requested");
        return Ok(request_id);
    }

    /// Oracle callback for vote decryptions. Returns the id of the vote it counted.
    pub fn on_vote_decrypted(
        &mut self,
        request_id: RequestId,
        cleartext: &[u8],
        proof: &[u8],
    ) -> Result<VoteId> {
        self.check_proof(request_id, cleartext, proof)?;
        let vote_id = match self.router.get(&request_id).map(|request| request.target) {
            Some(Target::Vote(vote_id)) => vote_id,
            _ => {
                warn!(%request_id, "vote callback for unknown request");
                return Err(VotingError::InvalidRequest(request_id));
            }
        };
        if self.ledger.is_counted(vote_id) {
            // a retried request answered after an earlier one was counted
            self.router.resolve(&request_id);
            warn!(vote_id, %request_id, "vote callback for a vote already counted");
            return Err(VotingError::AlreadyDecrypted(vote_id));
        }
        let (candidate, weight) = codec::decode_vote(cleartext)?;

        let new_candidate =
            self.tallies
                .record_vote(&mut self.store, &mut self.registry, &candidate)?;
        self.ledger.mark_counted(vote_id, candidate.clone(), weight)?;
        self.router.resolve(&request_id);
        self.events.emit(Event::VoteDecrypted { vote_id });
        info!(
            vote_id,
            %request_id,
            candidate = candidate.as_str(),
            weight,
            new_candidate,
            "vote counted"
        );
        return Ok(vote_id);
    }

    /// Oracle callback for tally decryptions. Returns the revealed count.
    pub fn on_tally_decrypted(
        &mut self,
        request_id: RequestId,
        cleartext: &[u8],
        proof: &[u8],
    ) -> Result<u64> {
        self.check_proof(request_id, cleartext, proof)?;
        let hash = match self.router.get(&request_id).map(|request| request.target) {
            Some(Target::Candidate(hash)) => hash,
            _ => {
                warn!(%request_id, "tally callback for unknown request");
                return Err(VotingError::InvalidRequest(request_id));
            }
        };
        let candidate = self
            .registry
            .resolve(&hash)
            .ok_or_else(|| VotingError::CandidateNotFound(hash.to_string()))?
            .to_string();
        let count = codec::decode_count(cleartext)?;

        let revealed_at = self.clock.now();
        self.tallies.reveal(
            &candidate,
            RevealedCount {
                count,
                request_id,
                revealed_at,
            },
        );
        self.router.resolve(&request_id);
        info!(candidate = candidate.as_str(), count, %request_id, "tally revealed");
        self.events.emit(Event::TallyDecrypted { candidate, count });
        return Ok(count);
    }

    /// Route a delivery to the handler named by its callback selector
    pub fn dispatch(
        &mut self,
        request_id: RequestId,
        callback: CallbackKind,
        cleartext: &[u8],
        proof: &[u8],
    ) -> Result<()> {
        return match callback {
            CallbackKind::VoteDecrypted => self
                .on_vote_decrypted(request_id, cleartext, proof)
                .map(|_| ()),
            CallbackKind::TallyDecrypted => self
                .on_tally_decrypted(request_id, cleartext, proof)
                .map(|_| ()),
        };
    }

    /// The most recently revealed count of a candidate
    pub fn get_decrypted_candidate_count(&self, candidate: &str) -> Option<u64> {
        return self.tallies.revealed(candidate).map(|revealed| revealed.count);
    }

    pub fn get_revealed_count(&self, candidate: &str) -> Option<&RevealedCount> {
        return self.tallies.revealed(candidate);
    }

    /// Drop pending requests past their deadline. Their votes may then be requested again; a
    /// callback for a reaped request is rejected as unknown.
    ///
    /// Leftover requests for votes that were counted through another request are dropped
    /// silently and not reported.
    pub fn reap_expired(&mut self) -> Vec<RequestId> {
        let now = self.clock.now();
        return self
            .router
            .reap_expired(now)
            .into_iter()
            .filter_map(|(request_id, request)| {
                if let Target::Vote(vote_id) = request.target {
                    if self.ledger.is_counted(vote_id) {
                        debug!(vote_id, %request_id, "dropped request for a counted vote");
                        return None;
                    }
                }
                warn!(%request_id, target = ?request.target, "decryption request expired");
                self.events.emit(Event::RequestExpired { request_id });
                Some(request_id)
            })
            .collect();
    }

    fn check_proof(&self, request_id: RequestId, cleartext: &[u8], proof: &[u8]) -> Result<()> {
        if !self.verifier.verify(request_id, cleartext, proof) {
            warn!(%request_id, "callback rejected: proof failed verification");
            return Err(VotingError::InvalidProof(request_id));
        }
        return Ok(());
    }

    /// Candidates in the order their first vote was counted
    pub fn candidates(&self) -> &[String] {
        return self.registry.names();
    }

    pub fn vote(&self, vote_id: VoteId) -> Option<&Vote> {
        return self.ledger.get(vote_id);
    }

    pub fn vote_count(&self) -> usize {
        return self.ledger.len();
    }

    pub fn pending_requests(&self) -> usize {
        return self.router.len();
    }

    pub fn events(&self) -> &EventLog {
        return &self.events;
    }

    pub fn store(&self) -> &S {
        return &self.store;
    }

    /// Clients encrypt their inputs through the store
    pub fn store_mut(&mut self) -> &mut S {
        return &mut self.store;
    }

    pub fn oracle(&self) -> &O {
        return &self.oracle;
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        return &mut self.oracle;
    }

    pub fn clock(&self) -> &C {
        return &self.clock;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::{clock::ManualClock, codec::CodecError};

    /// Plaintext counters behind sequential handles
    #[derive(Default)]
    struct FakeStore {
        values: HashMap<Handle, u64>,
        issued: u8,
    }

    impl FakeStore {
        fn issue(&mut self, value: u64) -> Handle {
            self.issued += 1;
            let handle = Handle::from_bytes([self.issued; 32]);
            self.values.insert(handle, value);
            return handle;
        }
    }

    impl CiphertextStore for FakeStore {
        fn zero(&mut self) -> Handle {
            return self.issue(0);
        }

        fn add_one(&mut self, handle: &Handle) -> Result<Handle> {
            let value = *self
                .values
                .get(handle)
                .ok_or(VotingError::UnknownHandle(*handle))?;
            return Ok(self.issue(value + 1));
        }

        fn is_initialized(&self, handle: &Handle) -> bool {
            return self.values.contains_key(handle);
        }
    }

    #[derive(Default)]
    struct FakeOracle {
        requests: Vec<(RequestId, Vec<[u8; 32]>, CallbackKind)>,
    }

    impl DecryptionOracle for FakeOracle {
        fn request_decryption(
            &mut self,
            handles: &[[u8; 32]],
            callback: CallbackKind,
        ) -> RequestId {
            let id = RequestId::new(1000 + self.requests.len() as u64);
            self.requests.push((id, handles.to_vec(), callback));
            return id;
        }
    }

    /// Accepts exactly the proof `b"ok"`
    struct FakeVerifier;

    impl ProofVerifier for FakeVerifier {
        fn verify(&self, _request_id: RequestId, _cleartext: &[u8], proof: &[u8]) -> bool {
            return proof == b"ok";
        }
    }

    type TestState = VotingState<FakeStore, FakeOracle, FakeVerifier, ManualClock>;

    fn setup(ttl: Option<u64>) -> (TestState, ManualClock) {
        let clock = ManualClock::new(1_000);
        let config = Config {
            request_ttl_secs: ttl,
            ..Config::default()
        };
        let state = VotingState::new(
            FakeStore::default(),
            FakeOracle::default(),
            FakeVerifier,
            clock.clone(),
            &config,
        );
        return (state, clock);
    }

    fn submit(state: &mut TestState) -> VoteId {
        let candidate = state.store_mut().issue(0);
        let weight = state.store_mut().issue(0);
        return state.submit_encrypted_vote(candidate, weight);
    }

    fn tally_value(state: &TestState, candidate: &str) -> Option<u64> {
        let handle = state.get_encrypted_candidate_count(candidate)?;
        return state.store().values.get(&handle).copied();
    }

    #[test]
    fn test_submission_stamps_time_and_emits() {
        let (mut state, clock) = setup(None);
        assert_eq!(submit(&mut state), 1);
        clock.advance(5);
        assert_eq!(submit(&mut state), 2);

        assert_eq!(state.vote(2).map(|vote| vote.submitted_at), Some(1_005));
        assert_eq!(
            state.events().all(),
            [
                Event::VoteSubmitted {
                    vote_id: 1,
                    timestamp: 1_000
                },
                Event::VoteSubmitted {
                    vote_id: 2,
                    timestamp: 1_005
                },
            ]
        );
    }

    #[test]
    fn test_request_forwards_both_handles() {
        let (mut state, _) = setup(None);
        let vote_id = submit(&mut state);
        let request_id = state.request_vote_decryption(vote_id).unwrap();

        let vote = state.vote(vote_id).unwrap().clone();
        let (id, handles, callback) = &state.oracle().requests[0];
        assert_eq!(*id, request_id);
        assert_eq!(
            *handles,
            vec![
                vote.encrypted_candidate.to_bytes32(),
                vote.encrypted_weight.to_bytes32()
            ]
        );
        assert_eq!(*callback, CallbackKind::VoteDecrypted);
        assert_eq!(state.pending_requests(), 1);
    }

    #[test]
    fn test_request_rejections() {
        let (mut state, _) = setup(None);
        assert_eq!(
            state.request_vote_decryption(1),
            Err(VotingError::UnknownVote(1))
        );
        let vote_id = submit(&mut state);
        let first = state.request_vote_decryption(vote_id).unwrap();
        assert_eq!(
            state.request_vote_decryption(vote_id),
            Err(VotingError::DecryptionPending {
                vote_id,
                request_id: first
            })
        );

        state
            .on_vote_decrypted(first, &codec::encode_vote("Alice", 1), b"ok")
            .unwrap();
        assert_eq!(
            state.request_vote_decryption(vote_id),
            Err(VotingError::AlreadyDecrypted(vote_id))
        );
    }

    #[test]
    fn test_callback_counts_vote() {
        let (mut state, _) = setup(None);
        let vote_id = submit(&mut state);
        assert_eq!(state.get_decrypted_vote(vote_id), (String::new(), 0, false));

        let request_id = state.request_vote_decryption(vote_id).unwrap();
        let counted = state
            .on_vote_decrypted(request_id, &codec::encode_vote("Alice", 3), b"ok")
            .unwrap();

        assert_eq!(counted, vote_id);
        assert_eq!(
            state.get_decrypted_vote(vote_id),
            ("Alice".to_string(), 3, true)
        );
        assert_eq!(tally_value(&state, "Alice"), Some(1));
        assert_eq!(state.candidates(), ["Alice"]);
        assert_eq!(state.pending_requests(), 0);
        assert_eq!(
            state.events().all().last(),
            Some(&Event::VoteDecrypted { vote_id })
        );
    }

    #[test]
    fn test_rejected_callbacks_change_nothing() {
        let (mut state, _) = setup(None);
        let vote_id = submit(&mut state);
        let request_id = state.request_vote_decryption(vote_id).unwrap();
        let cleartext = codec::encode_vote("Alice", 3);
        let events_before = state.events().len();

        assert_eq!(
            state.on_vote_decrypted(request_id, &cleartext, b"forged"),
            Err(VotingError::InvalidProof(request_id))
        );
        let foreign = RequestId::new(42);
        assert_eq!(
            state.on_vote_decrypted(foreign, &cleartext, b"ok"),
            Err(VotingError::InvalidRequest(foreign))
        );
        assert_eq!(
            state.on_tally_decrypted(request_id, &codec::encode_count(1), b"ok"),
            Err(VotingError::InvalidRequest(request_id))
        );
        assert!(matches!(
            state.on_vote_decrypted(request_id, &cleartext[..40], b"ok"),
            Err(VotingError::MalformedCleartext(_))
        ));

        assert_eq!(state.get_decrypted_vote(vote_id), (String::new(), 0, false));
        assert_eq!(state.get_encrypted_candidate_count("Alice"), None);
        assert!(state.candidates().is_empty());
        assert_eq!(state.pending_requests(), 1);
        assert_eq!(state.events().len(), events_before);

        // the genuine delivery still goes through afterwards
        assert!(state.on_vote_decrypted(request_id, &cleartext, b"ok").is_ok());
    }

    #[test]
    fn test_duplicate_delivery_counts_once() {
        let (mut state, _) = setup(None);
        let vote_id = submit(&mut state);
        let request_id = state.request_vote_decryption(vote_id).unwrap();
        let cleartext = codec::encode_vote("Bob", 2);

        state.on_vote_decrypted(request_id, &cleartext, b"ok").unwrap();
        assert_eq!(
            state.on_vote_decrypted(request_id, &cleartext, b"ok"),
            Err(VotingError::InvalidRequest(request_id))
        );
        assert_eq!(tally_value(&state, "Bob"), Some(1));
    }

    #[test]
    fn test_expired_request_can_be_retried() {
        let (mut state, clock) = setup(Some(30));
        let vote_id = submit(&mut state);
        let stale = state.request_vote_decryption(vote_id).unwrap();
        clock.advance(30);
        let fresh = state.request_vote_decryption(vote_id).unwrap();
        assert_ne!(stale, fresh);

        // the late answer to the stale request is still honoured, once
        let cleartext = codec::encode_vote("Carol", 1);
        state.on_vote_decrypted(stale, &cleartext, b"ok").unwrap();
        assert_eq!(
            state.on_vote_decrypted(fresh, &cleartext, b"ok"),
            Err(VotingError::AlreadyDecrypted(vote_id))
        );
        assert_eq!(tally_value(&state, "Carol"), Some(1));
        assert_eq!(state.pending_requests(), 0);
        assert_eq!(
            state.on_vote_decrypted(fresh, &cleartext, b"ok"),
            Err(VotingError::InvalidRequest(fresh))
        );
    }

    #[test]
    fn test_undelivered_retry_is_reaped_quietly_once_counted() {
        let (mut state, clock) = setup(Some(30));
        let vote_id = submit(&mut state);
        let stale = state.request_vote_decryption(vote_id).unwrap();
        clock.advance(30);
        let fresh = state.request_vote_decryption(vote_id).unwrap();
        state
            .on_vote_decrypted(stale, &codec::encode_vote("Carol", 1), b"ok")
            .unwrap();
        assert_eq!(state.pending_requests(), 1);

        let events_before = state.events().len();
        clock.advance(30);
        assert!(state.reap_expired().is_empty());
        assert_eq!(state.pending_requests(), 0);
        assert_eq!(state.events().len(), events_before);
        assert!(!state
            .events()
            .all()
            .contains(&Event::RequestExpired { request_id: fresh }));
    }

    #[test]
    fn test_reaped_request_is_forgotten() {
        let (mut state, clock) = setup(Some(30));
        let vote_id = submit(&mut state);
        let request_id = state.request_vote_decryption(vote_id).unwrap();
        clock.advance(10);
        assert!(state.reap_expired().is_empty());
        clock.advance(20);
        assert_eq!(state.reap_expired(), vec![request_id]);
        assert_eq!(
            state.events().all().last(),
            Some(&Event::RequestExpired { request_id })
        );

        assert_eq!(
            state.on_vote_decrypted(request_id, &codec::encode_vote("Dan", 1), b"ok"),
            Err(VotingError::InvalidRequest(request_id))
        );
        assert!(state.request_vote_decryption(vote_id).is_ok());
    }

    #[test]
    fn test_tally_reveal() {
        let (mut state, clock) = setup(None);
        assert_eq!(
            state.request_candidate_count_decryption("Alice"),
            Err(VotingError::CandidateNotFound("Alice".to_string()))
        );

        for _ in 0..2 {
            let vote_id = submit(&mut state);
            let request_id = state.request_vote_decryption(vote_id).unwrap();
            state
                .dispatch(
                    request_id,
                    CallbackKind::VoteDecrypted,
                    &codec::encode_vote("Alice", 1),
                    b"ok",
                )
                .unwrap();
        }
        assert_eq!(tally_value(&state, "Alice"), Some(2));

        let request_id = state.request_candidate_count_decryption("Alice").unwrap();
        let (_, handles, callback) = state.oracle().requests.last().unwrap().clone();
        assert_eq!(
            handles,
            vec![state
                .get_encrypted_candidate_count("Alice")
                .unwrap()
                .to_bytes32()]
        );
        assert_eq!(callback, CallbackKind::TallyDecrypted);

        clock.advance(3);
        state
            .dispatch(request_id, callback, &codec::encode_count(2), b"ok")
            .unwrap();
        assert_eq!(state.get_decrypted_candidate_count("Alice"), Some(2));
        assert_eq!(
            state.get_revealed_count("Alice").map(|r| r.revealed_at),
            Some(1_003)
        );
        assert_eq!(
            state.events().all().last(),
            Some(&Event::TallyDecrypted {
                candidate: "Alice".to_string(),
                count: 2
            })
        );
        assert_eq!(state.get_decrypted_candidate_count("Bob"), None);
    }

    #[test]
    fn test_tally_callback_rejections_change_nothing() {
        let (mut state, _) = setup(None);
        for _ in 0..2 {
            let vote_id = submit(&mut state);
            let request_id = state.request_vote_decryption(vote_id).unwrap();
            state
                .on_vote_decrypted(request_id, &codec::encode_vote("Alice", 1), b"ok")
                .unwrap();
        }
        let pending_vote = submit(&mut state);
        let vote_request = state.request_vote_decryption(pending_vote).unwrap();
        let tally_request = state.request_candidate_count_decryption("Alice").unwrap();
        let events_before = state.events().len();

        assert_eq!(
            state.on_tally_decrypted(tally_request, &codec::encode_count(2), b"forged"),
            Err(VotingError::InvalidProof(tally_request))
        );
        assert_eq!(
            state.on_tally_decrypted(vote_request, &codec::encode_count(2), b"ok"),
            Err(VotingError::InvalidRequest(vote_request))
        );
        assert_eq!(
            state.on_vote_decrypted(tally_request, &codec::encode_vote("Alice", 1), b"ok"),
            Err(VotingError::InvalidRequest(tally_request))
        );
        assert_eq!(
            state.on_tally_decrypted(tally_request, &[0u8; 8], b"ok"),
            Err(VotingError::MalformedCleartext(CodecError::TooShort {
                len: 8,
                expected: 32
            }))
        );
        assert_eq!(state.get_decrypted_candidate_count("Alice"), None);
        assert_eq!(state.events().len(), events_before);
        assert_eq!(state.pending_requests(), 2);

        // the misrouted vote request is still answerable
        assert_eq!(
            state.on_vote_decrypted(vote_request, &codec::encode_vote("Bob", 1), b"ok"),
            Ok(pending_vote)
        );

        assert_eq!(
            state.on_tally_decrypted(tally_request, &codec::encode_count(2), b"ok"),
            Ok(2)
        );
        assert_eq!(
            state.on_tally_decrypted(tally_request, &codec::encode_count(7), b"ok"),
            Err(VotingError::InvalidRequest(tally_request))
        );
        assert_eq!(state.get_decrypted_candidate_count("Alice"), Some(2));
        assert_eq!(
            state.get_revealed_count("Alice").map(|r| r.request_id),
            Some(tally_request)
        );
    }

    #[test]
    fn test_vote_request_routed_to_tally_handler_is_rejected() {
        let (mut state, _) = setup(None);
        let vote_id = submit(&mut state);
        let request_id = state.request_vote_decryption(vote_id).unwrap();
        assert_eq!(
            state.dispatch(
                request_id,
                CallbackKind::TallyDecrypted,
                &codec::encode_count(1),
                b"ok"
            ),
            Err(VotingError::InvalidRequest(request_id))
        );
    }
}
