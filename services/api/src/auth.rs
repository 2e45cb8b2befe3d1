//! Session tokens and password hashing

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use rand::RngCore;

use crate::error::ApiError;

/// Random bytes behind a session token
const TOKEN_BYTES: usize = 32;

/// Random bytes behind a generated password
const GENERATED_PASSWORD_BYTES: usize = 8;

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generate an opaque session token (64 lowercase hex characters)
pub fn generate_token() -> String {
    random_hex(TOKEN_BYTES)
}

/// Generate a password for accounts created without one
pub fn generate_password() -> String {
    random_hex(GENERATED_PASSWORD_BYTES)
}

/// Hash a password with argon2 and a random salt
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a stored hash
///
/// An unparsable stored hash never verifies.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is not parsable: {}", e);
            false
        }
    }
}
