//! Failures surfaced by the voting state machine and its reference backend
use thiserror::Error;

use crate::{codec::CodecError, handle::Handle, ledger::VoteId, oracle::RequestId};

pub type Result<T> = std::result::Result<T, VotingError>;

/// Every rejection is synchronous and leaves the state exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VotingError {
    /// Re-request or duplicate callback on a vote that is already counted
    #[error("vote {0} has already been decrypted")]
    AlreadyDecrypted(VoteId),

    /// Another decryption request for the vote is still in flight
    #[error("vote {vote_id} already has decryption request {request_id} in flight")]
    DecryptionPending {
        vote_id: VoteId,
        request_id: RequestId,
    },

    /// The callback references a request id that is unknown, already resolved, or that
    /// targets the other kind of callback
    #[error("no matching pending decryption request {0}")]
    InvalidRequest(RequestId),

    #[error("decryption proof for request {0} failed verification")]
    InvalidProof(RequestId),

    #[error("candidate not found: {0}")]
    CandidateNotFound(String),

    #[error("vote {0} was never submitted")]
    UnknownVote(VoteId),

    #[error("malformed cleartext: {0}")]
    MalformedCleartext(#[from] CodecError),

    #[error("ciphertext handle {0} is not known to the store")]
    UnknownHandle(Handle),

    #[error("ciphertext handle {0} holds a different type of value")]
    TypeMismatch(Handle),

    #[error("plaintext {value} does not fit the plaintext ring of size {ring}")]
    PlaintextOutOfRange { value: u64, ring: u64 },

    #[error("ciphertext handle {0} could not be decrypted")]
    Undecryptable(Handle),
}
