//! Convenience functions for arithmetics
use std::collections::HashMap;

use crypto_bigint::{
    modular::runtime_mod::{DynResidue, DynResidueParams},
    Encoding,
};

use super::keys::{KeyPair, PublicKey};
use crate::{BigInt, LIMBS};

/// Encrypt a message m < r as (y ** m) * (x ** r) for a fresh invertible x
pub fn encrypt(pk: &PublicKey, message: &BigInt) -> BigInt {
    let y = DynResidue::new(pk.get_y(), pk.n_params());
    let x = pk.sample_invertible();
    return y.pow(message).mul(&x.pow(pk.get_r())).retrieve();
}

/// The product of two ciphertexts encrypts the sum of their plaintexts (mod r)
pub fn add(pk: &PublicKey, lhs: &BigInt, rhs: &BigInt) -> BigInt {
    let params = pk.n_params();
    let lhs = DynResidue::new(lhs, params);
    let rhs = DynResidue::new(rhs, params);
    return lhs.mul(&rhs).retrieve();
}

/// Recover the residue class of a ciphertext.
///
/// Raising an r-th residue to the power of (phi/r) gives 1 (mod n), so c ** (phi/r) is
/// (y ** (phi/r)) ** m and m is a discrete log in a group of order r.
pub fn decrypt(keypair: &KeyPair, ciphertext: &BigInt) -> Option<BigInt> {
    let pk = keypair.get_pk();
    let params = pk.n_params();
    let phi_over_r = keypair.get_phi_over_r();
    let base = DynResidue::new(pk.get_y(), params).pow(&phi_over_r);
    let target = DynResidue::new(ciphertext, params).pow(&phi_over_r);
    return discrete_log(&base, &target, pk.get_r(), params);
}

/// The value as a u64, or None if it does not fit
pub fn to_u64(val: &BigInt) -> Option<u64> {
    let bytes = val.to_be_bytes();
    let (high, low) = bytes.split_at(bytes.len() - 8);
    if high.iter().any(|byte| *byte != 0) {
        return None;
    }
    let mut word = [0u8; 8];
    word.copy_from_slice(low);
    return Some(u64::from_be_bytes(word));
}

/// Baby-step giant-step discrete log given that the base has small order under the modulus.
/// If no discrete log can be found, return None;
pub fn discrete_log(
    base: &DynResidue<LIMBS>,
    target: &DynResidue<LIMBS>,
    order: &BigInt,
    modulus: DynResidueParams<LIMBS>,
) -> Option<BigInt> {
    let order = to_u64(order)?;
    let mut step = 1u64;
    while step.saturating_mul(step) < order {
        step += 1;
    }

    // base ** j for 0 <= j < step
    let mut baby_steps = HashMap::with_capacity(step as usize);
    let mut baby = DynResidue::new(&BigInt::ONE, modulus);
    for j in 0..step {
        baby_steps.entry(baby.retrieve().to_be_bytes()).or_insert(j);
        baby = baby.mul(base);
    }

    // baby is now base ** step
    let (giant, invertible) = baby.invert();
    if !bool::from(invertible) {
        return None;
    }
    let mut gamma = *target;
    for i in 0..step {
        if let Some(j) = baby_steps.get(&gamma.retrieve().to_be_bytes()) {
            return Some(BigInt::from_u64((i * step + j) % order));
        }
        gamma = gamma.mul(&giant);
    }
    return None;
}
