//! An in-process decryption service.
//!
//! [`LocalOracle`] only queues requests. Whoever holds the [`Attestor`] (and through it the
//! secret key held by the store) drains the queue, decrypts, and produces [`Delivery`] values
//! that are handed back to the voting state in any order.
use std::collections::{HashSet, VecDeque};

use rand::{rngs::OsRng, Rng, RngCore};
use sha3::{Digest, Sha3_256};
use tracing::trace;

use super::store::{BenalohStore, Plaintext};
use crate::{
    codec::{self, Token},
    handle::Handle,
    oracle::{CallbackKind, DecryptionOracle, ProofVerifier, RequestId},
    Result,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionJob {
    pub request_id: RequestId,
    pub handles: Vec<Handle>,
    pub callback: CallbackKind,
}

#[derive(Debug, Default)]
pub struct LocalOracle {
    queue: VecDeque<DecryptionJob>,
    issued: HashSet<RequestId>,
}

impl LocalOracle {
    pub fn new() -> Self {
        return Self::default();
    }

    /// Drain every queued job, oldest first
    pub fn take_jobs(&mut self) -> Vec<DecryptionJob> {
        return self.queue.drain(..).collect();
    }

    pub fn next_job(&mut self) -> Option<DecryptionJob> {
        return self.queue.pop_front();
    }

    pub fn queued(&self) -> usize {
        return self.queue.len();
    }
}

impl DecryptionOracle for LocalOracle {
    /// Request ids are random and non-zero so that they cannot be guessed from vote ids
    fn request_decryption(&mut self, handles: &[[u8; 32]], callback: CallbackKind) -> RequestId {
        let request_id = loop {
            let candidate = RequestId::new(OsRng.gen_range(1..=u64::MAX));
            if self.issued.insert(candidate) {
                break candidate;
            }
        };
        self.queue.push_back(DecryptionJob {
            request_id,
            handles: handles.iter().copied().map(Handle::from_bytes).collect(),
            callback,
        });
        trace!(%request_id, ?callback, handles = handles.len(), "decryption queued");
        return request_id;
    }
}

/// The answer to a [`DecryptionJob`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub request_id: RequestId,
    pub callback: CallbackKind,
    pub cleartext: Vec<u8>,
    pub proof: Vec<u8>,
}

impl From<Plaintext> for Token {
    fn from(plaintext: Plaintext) -> Self {
        match plaintext {
            Plaintext::Uint(value) => Token::Uint(value),
            Plaintext::Bytes(bytes) => Token::Bytes(bytes),
        }
    }
}

/// Keyed SHA3-256 over the request id and the exact cleartext bytes
fn attestation_tag(key: &[u8; 32], request_id: RequestId, cleartext: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(key);
    hasher.update(request_id.get().to_be_bytes());
    hasher.update((cleartext.len() as u64).to_be_bytes());
    hasher.update(cleartext);
    let mut tag = [0u8; 32];
    tag.copy_from_slice(&hasher.finalize());
    return tag;
}

/// Decrypts queued jobs and attests to the results
pub struct Attestor {
    key: [u8; 32],
}

impl Attestor {
    pub fn new(key: [u8; 32]) -> Self {
        return Self { key };
    }

    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        return Self::new(key);
    }

    /// The verifier to deploy alongside the voting state
    pub fn verifier(&self) -> AttestationVerifier {
        return AttestationVerifier { key: self.key };
    }

    pub fn sign(&self, request_id: RequestId, cleartext: &[u8]) -> Vec<u8> {
        return attestation_tag(&self.key, request_id, cleartext).to_vec();
    }

    /// Decrypt every handle of the job, lay the values out in request order and sign them
    pub fn fulfil(&self, store: &BenalohStore, job: &DecryptionJob) -> Result<Delivery> {
        let tokens = job
            .handles
            .iter()
            .map(|handle| store.decrypt(handle).map(Token::from))
            .collect::<Result<Vec<Token>>>()?;
        let cleartext = codec::encode(&tokens);
        let proof = self.sign(job.request_id, &cleartext);
        return Ok(Delivery {
            request_id: job.request_id,
            callback: job.callback,
            cleartext,
            proof,
        });
    }
}

#[derive(Clone)]
pub struct AttestationVerifier {
    key: [u8; 32],
}

impl ProofVerifier for AttestationVerifier {
    fn verify(&self, request_id: RequestId, cleartext: &[u8], proof: &[u8]) -> bool {
        return proof == attestation_tag(&self.key, request_id, cleartext).as_slice();
    }
}
