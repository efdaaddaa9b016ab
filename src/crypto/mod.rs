//! Byte compatible emulation of pgAdmin's password storage.
//!
//! - [`hash_password`]: login password hashes for the `user` table
//! - [`encrypt`] / [`decrypt`]: AES-CFB8 encryption of saved server
//!   passwords, keyed by the owning user's password hash
//!
//! Errors from this module indicate corrupt data or a programming bug and
//! are never worth retrying.

mod cipher;
mod hash;

use thiserror::Error;

pub use cipher::{BLOCK_SIZE, Cfb8, KeyStream, decrypt, encrypt, encrypt_with_iv, pad_key};
pub use hash::{PBKDF2_ROUNDS, SALT_SIZE, hash_password, hash_password_with_salt};

/// Errors raised while hashing, encrypting or decrypting.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Encrypted payload is {0} bytes, shorter than the IV")]
    PayloadTooShort(usize),

    #[error("Invalid AES key length: {0}")]
    InvalidKeyLength(usize),

    #[error("Decrypted password is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("HMAC error: {0}")]
    Hmac(String),
}
