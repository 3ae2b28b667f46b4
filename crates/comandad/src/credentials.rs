//! Salted credential digests.
//!
//! Secrets are never persisted in the clear; enrollment stores a random salt
//! and the SHA-256 digest of salt-then-secret.

use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt::Write;

const SALT_LEN: usize = 16;

pub struct SaltedSecret {
    pub salt: String,
    pub digest: String,
}

/// Hash a plaintext secret under a fresh random salt.
pub fn hash_secret(secret: &str) -> SaltedSecret {
    let mut salt_bytes = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = to_hex(&salt_bytes);
    SaltedSecret {
        digest: digest_with_salt(&salt, secret),
        salt,
    }
}

/// Digest of `salt || secret`, hex-encoded. Recomputing with the stored salt
/// is how a future credential check would compare.
pub fn digest_with_salt(salt: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(secret.as_bytes());
    to_hex(&hasher.finalize())
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::new(), |mut acc, byte| {
        let _ = write!(acc, "{byte:02x}");
        acc
    })
}
