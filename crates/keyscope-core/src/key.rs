//! API key material: generation and hashing.
//!
//! A plaintext key has the form `<prefix>.<secret>`. The prefix is
//! 8 lowercase hex characters and identifies the key to operators; it is
//! stored in the clear and is the key's natural identity. The secret is
//! 32 random bytes, base64url-encoded without padding. Only the SHA-256
//! of the full plaintext is persisted.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use sha2::{Digest, Sha256};

const PREFIX_BYTES: usize = 4;
const SECRET_BYTES: usize = 32;

/// Freshly generated key material. `plaintext` is handed to the operator
/// once and never stored.
#[derive(Debug, Clone)]
pub struct GeneratedKey {
    pub prefix: String,
    pub plaintext: String,
    pub hashed_key: String,
}

/// Generate a new random key.
pub fn generate_key() -> GeneratedKey {
    let mut rng = rand::rng();
    let prefix_bytes: [u8; PREFIX_BYTES] = rng.random();
    let secret_bytes: [u8; SECRET_BYTES] = rng.random();

    let prefix = hex::encode(prefix_bytes);
    let plaintext = format!("{prefix}.{}", URL_SAFE_NO_PAD.encode(secret_bytes));
    let hashed_key = hash_key(&plaintext);

    GeneratedKey {
        prefix,
        plaintext,
        hashed_key,
    }
}

/// SHA-256 hash of a plaintext key, hex-encoded.
///
/// This is the value stored as `api_key.hashed_key` and the value
/// presented keys are looked up by.
pub fn hash_key(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hex::encode(hasher.finalize())
}

/// Prefix portion of a plaintext key, if it has one.
pub fn key_prefix(plaintext: &str) -> Option<&str> {
    plaintext
        .split_once('.')
        .map(|(prefix, _)| prefix)
        .filter(|p| !p.is_empty())
}
