//! A confidential voting ledger.
//!
//! Votes are submitted as ciphertext handles and decrypted asynchronously by an external oracle
//! whose callbacks must carry a valid proof. Every decrypted vote adds one to its candidate's
//! encrypted counter, which can itself be decrypted on request. The [`benaloh`] module provides
//! a complete local backend for the store, the oracle and the proofs.
use crypto_bigint::Uint;

/// Use the same big integer type everywhere
pub const LIMBS: usize = 256 / 64; // 4 words each 64 bits, a total of 256 bits
pub type BigInt = Uint<LIMBS>;

pub mod benaloh;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod handle;
pub mod kv;
pub mod ledger;
pub mod oracle;
pub mod registry;
pub mod router;
pub mod tally;
pub mod voting;

pub use error::{Result, VotingError};
pub use voting::VotingState;
