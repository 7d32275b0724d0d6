//! The key pairs
use crypto_bigint::{
    modular::runtime_mod::{DynResidue, DynResidueParams},
    NonZero, RandomMod,
};
use rand::rngs::OsRng;

use crate::{BigInt, LIMBS};

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct PublicKey {
    r: BigInt,
    n: BigInt,
    y: BigInt,
}

impl PublicKey {
    /// Instantiate an instance with no check
    pub fn new(r: BigInt, n: BigInt, y: BigInt) -> Self {
        return Self { r, n, y };
    }

    pub fn get_r(&self) -> &BigInt {
        &self.r
    }

    pub fn get_n(&self) -> &BigInt {
        &self.n
    }

    pub fn get_y(&self) -> &BigInt {
        &self.y
    }

    pub fn n_params(&self) -> DynResidueParams<LIMBS> {
        return DynResidueParams::new(&self.n);
    }

    /// Sample a random element from the multiplicative group Z/n
    pub fn sample_invertible(&self) -> DynResidue<LIMBS> {
        let params = self.n_params();
        loop {
            let val = DynResidue::new(&random_below(&self.n), params);
            let (_, invertible) = val.invert();
            if invertible.into() {
                return val;
            }
        }
    }
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct SecretKey {
    phi: BigInt,
}

impl SecretKey {
    /// Instantiate an instance with no check
    pub fn new(phi: BigInt) -> Self {
        Self { phi }
    }

    pub fn get_phi(&self) -> &BigInt {
        &self.phi
    }
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct KeyPair {
    pk: PublicKey,
    sk: SecretKey,
}

/// Uniform sample from [0, bound). `bound` must be non-zero.
fn random_below(bound: &BigInt) -> BigInt {
    return BigInt::random_mod(&mut OsRng, &NonZero::new(*bound).unwrap());
}

fn is_prime(candidate: &BigInt, safe: bool) -> bool {
    if safe {
        return crypto_primes::is_safe_prime(candidate);
    }
    return crypto_primes::is_prime(candidate);
}

impl KeyPair {
    pub fn new(pk: PublicKey, sk: SecretKey) -> Self {
        Self { pk, sk }
    }

    pub fn get_pk(&self) -> &PublicKey {
        &self.pk
    }

    pub fn get_sk(&self) -> &SecretKey {
        &self.sk
    }

    /// phi / r, the exponent that maps every ciphertext onto the order-r subgroup
    pub fn get_phi_over_r(&self) -> BigInt {
        return self.sk.phi.wrapping_div(&self.pk.r);
    }

    /// generate p according to the arithmetic sequence:
    /// p = r * r * x + b * r + 1
    ///
    /// p - 1 is a multiple of r, so p is never a safe prime and only primality is required
    fn generate_p(r: BigInt, xbound: BigInt, b: BigInt) -> BigInt {
        loop {
            let x = random_below(&xbound).wrapping_add(&BigInt::ONE);
            let rrx = r.wrapping_mul(&r).wrapping_mul(&x);
            let rb = r.wrapping_mul(&b);
            let p = rrx.wrapping_add(&rb).wrapping_add(&BigInt::ONE);
            if crypto_primes::is_prime(&p) {
                return p;
            }
        }
    }

    /// Generate q according to the arithmetic sequence:
    /// q = r * x + b
    fn generate_q(r: BigInt, xbound: BigInt, b: BigInt, safe: bool) -> BigInt {
        loop {
            let x = random_below(&xbound).wrapping_add(&BigInt::ONE);
            let q = r.wrapping_mul(&x).wrapping_add(&b);
            if is_prime(&q, safe) {
                return q;
            }
        }
    }

    /// Sample a non-residue. A non-residue is an invertible element such that
    /// y^{phi/r} != 1 (mod n)
    fn sample_nonresidue(pk_without_y: &PublicKey, phi_over_r: &BigInt) -> BigInt {
        loop {
            let y = pk_without_y.sample_invertible();
            if y.pow(phi_over_r).retrieve() != BigInt::ONE {
                return y.retrieve();
            }
        }
    }

    /// Perfect consonance is defined by two conditions:
    /// 1. r divides phi
    /// 2. r and phi/r are relatively prime
    pub fn check_perfect_consonance(&self) -> bool {
        let r = self.pk.r;
        let divisible = self.sk.phi.wrapping_rem(&r) == BigInt::ZERO;
        let indivisible = self.get_phi_over_r().wrapping_rem(&r) != BigInt::ZERO;
        return divisible && indivisible;
    }

    /// Generate a valid set of parameters such that (r, n, y) is perfectly consonant.
    /// First generate r, then use arithmetic sequences to generate p, q:
    /// q = r * x + b
    /// p = (r ** 2) * x' + br + 1
    ///
    /// With 2 <= b < r, r divides p - 1 exactly once and does not divide q - 1. The ring size
    /// bounds every plaintext (bytes, weights, counts), while the modulus size is the main
    /// security parameter. Both are measured in bits; see `Config::validate` for the limits.
    pub fn keygen(ring_size: usize, modulus_size: usize, safe: bool) -> Self {
        let r: BigInt = crypto_primes::generate_prime(Some(ring_size));
        let xbound = BigInt::ONE.shl_vartime(modulus_size);
        let two = BigInt::from_u8(2);
        let b = random_below(&r.wrapping_sub(&two)).wrapping_add(&two);

        let p = Self::generate_p(r, xbound, b);
        let mut q = Self::generate_q(r, xbound, b, safe);
        while q == p {
            q = Self::generate_q(r, xbound, b, safe);
        }

        let n = p.wrapping_mul(&q);
        let phi = p
            .wrapping_sub(&BigInt::ONE)
            .wrapping_mul(&q.wrapping_sub(&BigInt::ONE));
        let phi_over_r = phi.wrapping_div(&r);
        let y = Self::sample_nonresidue(&PublicKey::new(r, n, BigInt::ONE), &phi_over_r);

        return Self::new(PublicKey::new(r, n, y), SecretKey::new(phi));
    }
}
