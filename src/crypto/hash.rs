//! pgAdmin login password hashing.
//!
//! pgAdmin (through Flask-Security) first HMACs the password with the
//! installation's `SECURITY_PASSWORD_SALT`, then stores a passlib style
//! `pbkdf2_sha512` hash of the base64 encoded HMAC:
//!
//! ```text
//! $pbkdf2-sha512$25000$<salt>$<derived key>
//! ```
//!
//! Salt and key use passlib's "adapted base64": standard alphabet, no
//! padding, `+` replaced by `.`.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD as BASE64, STANDARD_NO_PAD};
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha512;

use super::CryptoError;

/// PBKDF2 rounds pgAdmin uses for new hashes.
pub const PBKDF2_ROUNDS: u32 = 25_000;

/// Random salt length in bytes.
pub const SALT_SIZE: usize = 16;

/// Derived key length in bytes (one SHA-512 block).
const KEY_SIZE: usize = 64;

/// Hashes `password` the way pgAdmin stores it in `user.password`.
pub fn hash_password(password: &str, security_salt: &str) -> Result<String, CryptoError> {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    hash_password_with_salt(password, security_salt, &salt)
}

/// [`hash_password`] with a caller supplied PBKDF2 salt.
pub fn hash_password_with_salt(
    password: &str,
    security_salt: &str,
    salt: &[u8],
) -> Result<String, CryptoError> {
    let mut mac = Hmac::<Sha512>::new_from_slice(security_salt.as_bytes())
        .map_err(|e| CryptoError::Hmac(e.to_string()))?;
    mac.update(password.as_bytes());
    let signed = BASE64.encode(mac.finalize().into_bytes());

    let mut derived = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha512>(signed.as_bytes(), salt, PBKDF2_ROUNDS, &mut derived);

    Ok(format!(
        "$pbkdf2-sha512${}${}${}",
        PBKDF2_ROUNDS,
        adapted_base64(salt),
        adapted_base64(&derived)
    ))
}

fn adapted_base64(data: &[u8]) -> String {
    STANDARD_NO_PAD.encode(data).replace('+', ".")
}
