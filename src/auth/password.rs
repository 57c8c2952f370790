//! Shared-password verification.

use sha2::{Digest, Sha256};

/// The password every account logs in with.
///
/// Only the SHA-256 digest is kept; candidates are hashed to the same length
/// and compared without early exit.
pub struct SharedPassword {
    digest: [u8; 32],
}

impl SharedPassword {
    pub fn new(password: &str) -> Self {
        Self {
            digest: Sha256::digest(password.as_bytes()).into(),
        }
    }

    pub fn verify(&self, candidate: &str) -> bool {
        let candidate: [u8; 32] = Sha256::digest(candidate.as_bytes()).into();
        constant_time_eq(&self.digest, &candidate)
    }
}

impl std::fmt::Debug for SharedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedPassword(..)")
    }
}

fn constant_time_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
