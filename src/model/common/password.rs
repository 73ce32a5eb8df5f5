use argon2::Config;
use log::warn;
use rand::Rng;

use crate::error::{Error, Result};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a plaintext password for storage.
///
/// Rejects passwords shorter than [`MIN_PASSWORD_LENGTH`].
pub fn hash_password(password: &str) -> Result<String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    // 16 bytes is recommended for password hashing:
    //  https://en.wikipedia.org/wiki/Argon2
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    Ok(argon2::hash_encoded(
        password.as_bytes(),
        &salt,
        &Config::default(),
    )?)
}

/// Check a plaintext password against a stored hash.
/// A malformed hash never verifies.
pub fn verify_password(hash: &str, password: &str) -> bool {
    argon2::verify_encoded(hash, password.as_bytes()).unwrap_or_else(|e| {
        warn!("Stored password hash could not be checked: {e}");
        false
    })
}
