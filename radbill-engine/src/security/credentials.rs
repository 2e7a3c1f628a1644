//! One-way hashing of subscriber passwords.

use base64::{Engine, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Salt used when the configuration does not provide one.
pub const DEFAULT_SALT: &str = "radbill";

/// Turns a plaintext password into its stored form.
pub trait CredentialHasher: Send + Sync {
    /// Hashes `plaintext`. The same input always yields the same output.
    fn hash(&self, plaintext: &str) -> String;

    /// Checks `plaintext` against a stored hash.
    fn verify(&self, plaintext: &str, stored: &str) -> bool {
        self.hash(plaintext) == stored
    }
}

/// Base64-encoded SHA-256 of `salt || password`.
///
/// The concatenated key material is wiped from memory once hashed.
///
/// # Examples
///
/// ```
/// use radbill_engine::security::credentials::{CredentialHasher, SaltedSha256};
///
/// let hasher = SaltedSha256::new("s3");
/// let stored = hasher.hash("hunter2");
/// assert!(hasher.verify("hunter2", &stored));
/// assert!(!hasher.verify("hunter3", &stored));
/// ```
#[derive(Debug, Clone)]
pub struct SaltedSha256 {
    salt: String,
}

impl SaltedSha256 {
    /// Creates a hasher with the given salt.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for constructors"
    )]
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }
}

impl Default for SaltedSha256 {
    fn default() -> Self {
        Self::new(DEFAULT_SALT)
    }
}

impl CredentialHasher for SaltedSha256 {
    fn hash(&self, plaintext: &str) -> String {
        let mut material = Zeroizing::new(Vec::with_capacity(self.salt.len() + plaintext.len()));
        material.extend_from_slice(self.salt.as_bytes());
        material.extend_from_slice(plaintext.as_bytes());
        STANDARD.encode(Sha256::digest(material.as_slice()))
    }
}
