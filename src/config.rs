//! Deployment parameters, read from JSON
use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{BigInt, LIMBS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Bit length of the prime `r`; every plaintext (a byte of a name, a weight, a count) must
    /// be smaller than `r`
    pub ring_bits: usize,

    /// Bit length of the random factor in the arithmetic sequences generating `p` and `q`.
    /// This is the main security parameter.
    pub modulus_bits: usize,

    pub safe_primes: bool,

    /// Seconds after which a pending decryption request may be reaped. `None` keeps requests
    /// forever.
    pub request_ttl_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        return Self {
            ring_bits: 16,
            modulus_bits: 64,
            safe_primes: false,
            request_ttl_secs: None,
        };
    }
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        return Ok(config);
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        return Self::from_json_str(&fs::read_to_string(path)?);
    }

    /// Check that the key sizes fit the integer width. `n = p * q` takes roughly
    /// `3 * ring_bits + 2 * modulus_bits` bits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(9..=32).contains(&self.ring_bits) {
            return Err(ConfigError::Invalid(format!(
                "ring_bits must be between 9 and 32, got {}",
                self.ring_bits
            )));
        }
        if self.modulus_bits <= self.ring_bits {
            return Err(ConfigError::Invalid(format!(
                "modulus_bits ({}) must exceed ring_bits ({})",
                self.modulus_bits, self.ring_bits
            )));
        }
        let needed = 3 * self.ring_bits + 2 * self.modulus_bits + 4;
        if needed > BigInt::BITS {
            return Err(ConfigError::Invalid(format!(
                "keys need about {} bits but integers have {} ({} limbs)",
                needed,
                BigInt::BITS,
                LIMBS
            )));
        }
        if self.request_ttl_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "request_ttl_secs must be positive".to_string(),
            ));
        }
        return Ok(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = Config::from_json_str(r#"{ "request_ttl_secs": 600 }"#).unwrap();
        assert_eq!(config.request_ttl_secs, Some(600));
        assert_eq!(config.ring_bits, 16);
        assert_eq!(config.modulus_bits, 64);
    }

    #[test]
    fn test_rejects_bad_sizes() {
        let tiny_ring = r#"{ "ring_bits": 8 }"#;
        assert!(matches!(
            Config::from_json_str(tiny_ring),
            Err(ConfigError::Invalid(_))
        ));
        let too_wide = r#"{ "ring_bits": 32, "modulus_bits": 100 }"#;
        assert!(matches!(
            Config::from_json_str(too_wide),
            Err(ConfigError::Invalid(_))
        ));
        let unknown = r#"{ "ring_size": 16 }"#;
        assert!(matches!(
            Config::from_json_str(unknown),
            Err(ConfigError::Json(_))
        ));
    }
}
