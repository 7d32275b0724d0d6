//! The asynchronous decryption service as seen from the voting state: it accepts a list of
//! handles and later calls back with `(request_id, cleartext, proof)`. Delivery may happen in
//! any order, much later, or never.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier issued by the oracle. Never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new(id: u64) -> Self {
        return Self(id);
    }

    pub fn get(&self) -> u64 {
        return self.0;
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which handler the oracle must invoke once the cleartext is ready
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackKind {
    VoteDecrypted,
    TallyDecrypted,
}

pub trait DecryptionOracle {
    /// Queue the decryption of `handles` (in transport form) and return the id that the
    /// eventual callback will carry
    fn request_decryption(&mut self, handles: &[[u8; 32]], callback: CallbackKind) -> RequestId;
}

pub trait ProofVerifier {
    /// True iff `proof` attests that `cleartext` is the decryption requested under `request_id`
    fn verify(&self, request_id: RequestId, cleartext: &[u8], proof: &[u8]) -> bool;
}
