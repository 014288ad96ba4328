//! Argon2 hashing for user passwords and identity-provider subject ids.
//!
//! Both secrets share the primitive but are verified through separate entry
//! points, so a provider subject can never be checked on the password path.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;
use std::sync::LazyLock;

use crate::error::{AppError, AuthError};

fn hash_secret(secret: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()).into())
}

/// Constant-time verification. A malformed stored hash counts as a mismatch.
fn verify_secret(secret: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash_secret(password)
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    verify_secret(password, stored_hash)
}

/// Hash checked against when no account matches, so a login for an unknown
/// email costs the same argon2 work as a wrong password.
static DECOY_HASH: LazyLock<Option<String>> = LazyLock::new(|| {
    let secret = SaltString::generate(&mut OsRng);
    hash_secret(secret.as_str()).ok()
});

/// Runs a full verification that can never succeed.
pub fn verify_against_decoy(password: &str) -> bool {
    match DECOY_HASH.as_deref() {
        Some(hash) => {
            verify_secret(password, hash);
            false
        }
        None => false,
    }
}

pub fn hash_provider_subject(subject_id: &str) -> Result<String, AppError> {
    hash_secret(subject_id)
}

pub fn verify_provider_subject(subject_id: &str, stored_hash: &str) -> bool {
    verify_secret(subject_id, stored_hash)
}
