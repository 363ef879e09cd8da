//! services/api/src/security/password.rs
//!
//! Salted, adaptive one-way password hashing with Argon2.
//!
//! Hashes are PHC strings (`$argon2id$v=19$m=...,t=...,p=...$salt$digest`), so the
//! algorithm, cost and salt travel with the digest.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Argon2,
};

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("empty password")]
    EmptyInput,
    #[error("failed to hash password: {0}")]
    Hash(String),
}

/// Hashes and verifies passwords with fixed Argon2 parameters.
#[derive(Clone, Default)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hashes `plain` with a fresh random salt.
    pub fn hash(&self, plain: &str) -> Result<String, PasswordError> {
        if plain.is_empty() {
            return Err(PasswordError::EmptyInput);
        }

        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hash(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Checks `plain` against an encoded hash. Never errors: empty input, an
    /// unparsable hash and a mismatch all yield `false`.
    pub fn verify(&self, hash: &str, plain: &str) -> bool {
        if hash.is_empty() || plain.is_empty() {
            return false;
        }

        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        // Digest comparison inside `verify_password` is constant-time.
        self.argon2.verify_password(plain.as_bytes(), &parsed).is_ok()
    }

    /// Spends the same work as a real verification and always fails.
    ///
    /// Used when there is no stored hash to check against, so an unknown email
    /// costs as much as a wrong password.
    pub fn verify_decoy(&self, plain: &str) -> bool {
        // Only the time spent matters; the hash itself is thrown away.
        let _ = self.hash(if plain.is_empty() { "decoy" } else { plain });
        false
    }
}
