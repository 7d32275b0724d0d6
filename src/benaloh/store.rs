//! Ciphertexts held behind handles.
//!
//! Integers are encrypted as a single residue; strings are encrypted byte by byte so that any
//! name fits regardless of the ring size. Only integer ciphertexts support addition.
//!
//! Sums wrap around `r`, so every integer ciphertext carries the largest plaintext it can hold.
//! The store issues every handle and knows that bound exactly; `add_one` refuses to reach `r`.
use std::collections::HashMap;

use crypto_bigint::Encoding;
use sha3::{Digest, Sha3_256};
use tracing::trace;

use super::{
    arithmetics::{add, decrypt, encrypt, to_u64},
    keys::{KeyPair, PublicKey},
};
use crate::{
    config::Config,
    handle::{CiphertextStore, Handle},
    BigInt, Result, VotingError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Ciphertext {
    Uint { val: BigInt, bound: u64 },
    Bytes(Vec<BigInt>),
}

/// The decryption of a handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plaintext {
    Uint(u64),
    Bytes(Vec<u8>),
}

#[derive(Debug)]
pub struct BenalohStore {
    keypair: KeyPair,
    ring: u64,
    ciphertexts: HashMap<Handle, Ciphertext>,
    issued: u64,
}

impl BenalohStore {
    pub fn new(keypair: KeyPair) -> Self {
        let ring = to_u64(keypair.get_pk().get_r()).unwrap_or(u64::MAX);
        return Self {
            keypair,
            ring,
            ciphertexts: HashMap::new(),
            issued: 0,
        };
    }

    /// Fresh keys sized by the config
    pub fn generate(config: &Config) -> Self {
        return Self::new(KeyPair::keygen(
            config.ring_bits,
            config.modulus_bits,
            config.safe_primes,
        ));
    }

    pub fn public_key(&self) -> &PublicKey {
        return self.keypair.get_pk();
    }

    /// r: integers must stay below it and sums wrap around it
    pub fn ring_size(&self) -> u64 {
        return self.ring;
    }

    pub fn len(&self) -> usize {
        return self.ciphertexts.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.ciphertexts.is_empty();
    }

    pub fn encrypt_u64(&mut self, value: u64) -> Result<Handle> {
        if value >= self.ring {
            return Err(VotingError::PlaintextOutOfRange {
                value,
                ring: self.ring,
            });
        }
        let val = encrypt(self.public_key(), &BigInt::from_u64(value));
        return Ok(self.insert(Ciphertext::Uint { val, bound: value }));
    }

    pub fn encrypt_str(&mut self, value: &str) -> Handle {
        let pk = *self.public_key();
        let bytes = value
            .bytes()
            .map(|byte| encrypt(&pk, &BigInt::from_u8(byte)))
            .collect();
        return self.insert(Ciphertext::Bytes(bytes));
    }

    pub fn decrypt(&self, handle: &Handle) -> Result<Plaintext> {
        match self.ciphertexts.get(handle) {
            None => Err(VotingError::UnknownHandle(*handle)),
            Some(Ciphertext::Uint { val, .. }) => {
                let value = decrypt(&self.keypair, val)
                    .and_then(|value| to_u64(&value))
                    .ok_or(VotingError::Undecryptable(*handle))?;
                Ok(Plaintext::Uint(value))
            }
            Some(Ciphertext::Bytes(ciphertexts)) => {
                let bytes = ciphertexts
                    .iter()
                    .map(|ciphertext| {
                        decrypt(&self.keypair, ciphertext)
                            .and_then(|value| to_u64(&value))
                            .and_then(|value| u8::try_from(value).ok())
                            .ok_or(VotingError::Undecryptable(*handle))
                    })
                    .collect::<Result<Vec<u8>>>()?;
                Ok(Plaintext::Bytes(bytes))
            }
        }
    }

    /// Handles are the SHA3-256 of an issue counter and the ciphertext, so two encryptions of
    /// the same value never share a handle
    fn insert(&mut self, ciphertext: Ciphertext) -> Handle {
        self.issued += 1;
        let mut hasher = Sha3_256::new();
        hasher.update(self.issued.to_be_bytes());
        match &ciphertext {
            Ciphertext::Uint { val, .. } => {
                hasher.update([0u8]);
                hasher.update(val.to_be_bytes());
            }
            Ciphertext::Bytes(vals) => {
                hasher.update([1u8]);
                for val in vals {
                    hasher.update(val.to_be_bytes());
                }
            }
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hasher.finalize());
        let handle = Handle::from_bytes(bytes);
        trace!(%handle, "ciphertext stored");
        self.ciphertexts.insert(handle, ciphertext);
        return handle;
    }
}

impl CiphertextStore for BenalohStore {
    fn zero(&mut self) -> Handle {
        let val = encrypt(self.public_key(), &BigInt::ZERO);
        return self.insert(Ciphertext::Uint { val, bound: 0 });
    }

    fn add_one(&mut self, handle: &Handle) -> Result<Handle> {
        let (current, bound) = match self.ciphertexts.get(handle) {
            Some(Ciphertext::Uint { val, bound }) => (*val, *bound),
            Some(Ciphertext::Bytes(_)) => return Err(VotingError::TypeMismatch(*handle)),
            None => return Err(VotingError::UnknownHandle(*handle)),
        };
        let bound = bound.saturating_add(1);
        if bound >= self.ring {
            return Err(VotingError::PlaintextOutOfRange {
                value: bound,
                ring: self.ring,
            });
        }
        let pk = self.public_key();
        let val = add(pk, &current, &encrypt(pk, &BigInt::ONE));
        return Ok(self.insert(Ciphertext::Uint { val, bound }));
    }

    fn is_initialized(&self, handle: &Handle) -> bool {
        return !handle.is_unset() && self.ciphertexts.contains_key(handle);
    }
}
