//! Cryptographic utilities for shared-secret hashing and comparison.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// SHA-256 digest of a secret value.
pub type SecretDigest = [u8; 32];

/// Computes the SHA-256 digest of the input.
pub fn sha256_digest(input: &str) -> SecretDigest {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hasher.finalize().into()
}

/// Compares two digests without short-circuiting on the first differing byte.
pub fn digests_match(a: &SecretDigest, b: &SecretDigest) -> bool {
    a.ct_eq(b).into()
}

/// Hashes `presented` and compares it against `expected` in constant time.
///
/// An empty presented value never matches, whatever digest is expected.
pub fn verify_secret(presented: &str, expected: &SecretDigest) -> bool {
    if presented.is_empty() {
        return false;
    }
    digests_match(&sha256_digest(presented), expected)
}
