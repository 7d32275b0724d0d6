//! Opaque ciphertext handles and the homomorphic store they point into
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Result;

/// A reference to an encrypted value held by a [`CiphertextStore`]. The 32 bytes are also the
/// transport form handed to the decryption oracle.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle([u8; 32]);

impl Handle {
    /// The zero handle. No store ever issues it, so it is never initialized.
    pub const UNSET: Handle = Handle([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        return Self(bytes);
    }

    pub fn to_bytes32(&self) -> [u8; 32] {
        return self.0;
    }

    pub fn is_unset(&self) -> bool {
        return *self == Self::UNSET;
    }
}

impl fmt::Display for Handle {
    /// Abbreviated hex, enough to tell handles apart in logs
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0[..6] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "..")
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({self})")
    }
}

/// The homomorphic capabilities the tally engine relies on. Implementations own the actual
/// ciphertexts; callers only ever see handles.
pub trait CiphertextStore {
    /// Produce a fresh encryption of zero
    fn zero(&mut self) -> Handle;

    /// Produce a new handle encrypting the value behind `handle` plus one. The input handle
    /// stays valid.
    fn add_one(&mut self, handle: &Handle) -> Result<Handle>;

    /// True iff the handle refers to a value this store holds
    fn is_initialized(&self, handle: &Handle) -> bool;

    fn to_transport(&self, handle: &Handle) -> [u8; 32] {
        return handle.to_bytes32();
    }
}
