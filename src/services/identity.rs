//! Deterministic deduplication identities.
//!
//! An identity is the first 128 bits of SHA-256 over the length-prefixed
//! fields `(source_id, network, territory, discriminator?)`, rendered as 32
//! lowercase hex characters. The criterion that found an item is not an
//! input, so rediscovery through another criterion yields the same identity.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Width of an identity in bytes.
pub const IDENTITY_BYTES: usize = 16;

/// Content hash used as the store's uniqueness key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the identity of an item, or of a sub-item when `discriminator`
/// (the sub-entity's own id) is given.
pub fn identity(
    source_id: &str,
    network: &str,
    territory: &str,
    discriminator: Option<&str>,
) -> Identity {
    let mut hasher = Sha256::new();
    for field in [source_id, network, territory] {
        hash_field(&mut hasher, field);
    }
    match discriminator {
        Some(sub) => {
            hasher.update([1u8]);
            hash_field(&mut hasher, sub);
        }
        None => hasher.update([0u8]),
    }

    let digest = hasher.finalize();
    Identity(hex::encode(&digest[..IDENTITY_BYTES]))
}

fn hash_field(hasher: &mut Sha256, field: &str) {
    hasher.update((field.len() as u64).to_be_bytes());
    hasher.update(field.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_and_fixed_width() {
        let a = identity("12345", "twitter", "acme", None);
        let b = identity("12345", "twitter", "acme", None);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), IDENTITY_BYTES * 2);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn stable_across_releases() {
        // Pinned value: changing the hash layout would orphan stored records.
        let id = identity("1", "twitter", "acme", None);
        assert_eq!(id.as_str(), "dacad559be35d2ee3be7904c95bd66df");
    }

    #[test]
    fn every_field_matters() {
        let base = identity("1", "twitter", "acme", None);
        assert_ne!(base, identity("2", "twitter", "acme", None));
        assert_ne!(base, identity("1", "facebook", "acme", None));
        assert_ne!(base, identity("1", "twitter", "globex", None));
    }

    #[test]
    fn discriminator_separates_sub_entities() {
        let parent = identity("post-9", "twitter", "acme", None);
        let first = identity("post-9", "twitter", "acme", Some("user-1"));
        let second = identity("post-9", "twitter", "acme", Some("user-2"));
        assert_ne!(first, second);
        assert_ne!(parent, first);
        assert_ne!(parent, identity("post-9", "twitter", "acme", Some("")));
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        assert_ne!(
            identity("ab", "c", "acme", None),
            identity("a", "bc", "acme", None)
        );
    }
}
