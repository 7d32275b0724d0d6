//! Distinct candidate names in discovery order, resolvable from their hashes
use std::{collections::HashMap, fmt};

use digest::Digest;
use serde::{Deserialize, Serialize};
use sha3::Keccak256;

/// Keccak-256 of a candidate name. Used as the routing target of tally decryptions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateHash([u8; 32]);

impl CandidateHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        return &self.0;
    }
}

impl fmt::Display for CandidateHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in self.0.iter() {
            write!(f, "{byte:02x}")?;
        }
        return Ok(());
    }
}

impl fmt::Debug for CandidateHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CandidateHash({self})")
    }
}

/// Names are compared byte for byte: case-sensitive, no normalization
pub fn candidate_hash(name: &str) -> CandidateHash {
    let digest = Keccak256::digest(name.as_bytes());
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    return CandidateHash(bytes);
}

#[derive(Debug, Default)]
pub struct CandidateRegistry {
    names: Vec<String>,
    by_hash: HashMap<CandidateHash, usize>,
}

impl CandidateRegistry {
    pub fn new() -> Self {
        return Self::default();
    }

    /// Append `name` unless it is already registered. Returns whether it was new.
    pub fn register(&mut self, name: &str) -> bool {
        let hash = candidate_hash(name);
        if self.by_hash.contains_key(&hash) {
            return false;
        }
        self.by_hash.insert(hash, self.names.len());
        self.names.push(name.to_string());
        return true;
    }

    pub fn contains(&self, name: &str) -> bool {
        return self.by_hash.contains_key(&candidate_hash(name));
    }

    /// Reverse lookup from hash to the registered name
    pub fn resolve(&self, hash: &CandidateHash) -> Option<&str> {
        return self
            .by_hash
            .get(hash)
            .map(|index| self.names[*index].as_str());
    }

    pub fn names(&self) -> &[String] {
        return &self.names;
    }

    pub fn len(&self) -> usize {
        return self.names.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.names.is_empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak_of_empty_name() {
        // Keccak-256 of the empty string
        assert_eq!(
            candidate_hash("").to_string(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_register_keeps_discovery_order() {
        let mut registry = CandidateRegistry::new();
        assert!(registry.register("Bob"));
        assert!(registry.register("Alice"));
        assert!(!registry.register("Bob"));
        assert!(registry.register("bob"));
        assert_eq!(registry.names(), ["Bob", "Alice", "bob"]);
        assert!(registry.contains("Alice"));
        assert!(!registry.contains("alice"));
    }

    #[test]
    fn test_resolve() {
        let mut registry = CandidateRegistry::new();
        registry.register("Alice");
        registry.register("Bob");
        assert_eq!(registry.resolve(&candidate_hash("Bob")), Some("Bob"));
        assert_eq!(registry.resolve(&candidate_hash("Carol")), None);
    }
}
