//! AES in 8-bit cipher feedback mode, as pgAdmin stores saved server
//! passwords.
//!
//! pgAdmin encrypts connection passwords with AES-CFB8 keyed by the owning
//! user's password hash. Keys of arbitrary length are forced into an AES key
//! size by [`pad_key`]. The payload is `base64(iv || ciphertext)`.

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256, Block};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use rand::rngs::OsRng;
use tracing::error;

use super::CryptoError;

/// AES block and IV size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Largest AES key size in bytes.
const MAX_KEY_SIZE: usize = 32;

/// Byte appended to short keys (`}`).
const PADDING_BYTE: u8 = b'}';

/// XORs a key stream into a buffer.
pub trait KeyStream {
    /// Writes `src` XOR key stream into `dst`.
    ///
    /// Processes `min(dst.len(), src.len())` bytes.
    fn xor_key_stream(&mut self, dst: &mut [u8], src: &[u8]);
}

/// Forces `key` into an AES key size.
///
/// Keys longer than 32 bytes are truncated. Keys longer than 8 bytes whose
/// length is a multiple of 8 are used as-is. Anything else is right-padded
/// with `}` to 32 bytes.
pub fn pad_key(key: &[u8]) -> Vec<u8> {
    if key.len() > MAX_KEY_SIZE {
        return key.iter().take(MAX_KEY_SIZE).copied().collect();
    }
    if key.len() > 8 && key.len() % 8 == 0 {
        return key.to_vec();
    }

    let mut padded = key.to_vec();
    padded.resize(MAX_KEY_SIZE, PADDING_BYTE);
    padded
}

/// AES block cipher sized by the padded key.
enum LegacyAes {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl LegacyAes {
    fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let invalid = |_| CryptoError::InvalidKeyLength(key.len());
        match key.len() {
            16 => Aes128::new_from_slice(key).map(Self::Aes128).map_err(invalid),
            24 => Aes192::new_from_slice(key).map(Self::Aes192).map_err(invalid),
            32 => Aes256::new_from_slice(key).map(Self::Aes256).map_err(invalid),
            len => Err(CryptoError::InvalidKeyLength(len)),
        }
    }

    fn encrypt_block(&self, block: &mut Block) {
        match self {
            Self::Aes128(cipher) => cipher.encrypt_block(block),
            Self::Aes192(cipher) => cipher.encrypt_block(block),
            Self::Aes256(cipher) => cipher.encrypt_block(block),
        }
    }
}

/// CFB mode with a one-byte segment size.
///
/// A 16-byte shift register starts as the IV. For every byte the register
/// is encrypted and the first output byte is the key stream byte; the
/// register then shifts left by one and takes the ciphertext byte at the
/// end.
pub struct Cfb8 {
    cipher: LegacyAes,
    register: [u8; BLOCK_SIZE],
    decrypt: bool,
}

impl Cfb8 {
    /// Encrypting stream for an already padded key.
    pub fn encryptor(key: &[u8], iv: [u8; BLOCK_SIZE]) -> Result<Self, CryptoError> {
        Ok(Self {
            cipher: LegacyAes::new(key)?,
            register: iv,
            decrypt: false,
        })
    }

    /// Decrypting stream for an already padded key.
    pub fn decryptor(key: &[u8], iv: [u8; BLOCK_SIZE]) -> Result<Self, CryptoError> {
        Ok(Self {
            cipher: LegacyAes::new(key)?,
            register: iv,
            decrypt: true,
        })
    }
}

impl KeyStream for Cfb8 {
    #[allow(clippy::indexing_slicing)] // Safe: BLOCK_SIZE is a non-zero constant
    fn xor_key_stream(&mut self, dst: &mut [u8], src: &[u8]) {
        for (out, &input) in dst.iter_mut().zip(src) {
            let mut block = Block::from(self.register);
            self.cipher.encrypt_block(&mut block);
            let result = block[0] ^ input;

            self.register.copy_within(1.., 0);
            self.register[BLOCK_SIZE - 1] = if self.decrypt { input } else { result };
            *out = result;
        }
    }
}

/// Encrypts `plaintext` with a fresh random IV.
///
/// A cipher that cannot be built from a padded key means the padding logic
/// itself is broken, so this terminates the process rather than storing an
/// unusable password.
#[allow(clippy::exit)]
pub fn encrypt(plaintext: &str, key: &str) -> String {
    let mut iv = [0u8; BLOCK_SIZE];
    OsRng.fill_bytes(&mut iv);

    match encrypt_with_iv(plaintext.as_bytes(), key.as_bytes(), iv) {
        Ok(encoded) => encoded,
        Err(e) => {
            error!(error = %e, "Unable to initialize pgAdmin password cipher");
            std::process::exit(1);
        }
    }
}

/// Encrypts with a caller supplied IV. Returns `base64(iv || ciphertext)`.
pub fn encrypt_with_iv(
    plaintext: &[u8],
    key: &[u8],
    iv: [u8; BLOCK_SIZE],
) -> Result<String, CryptoError> {
    let mut stream = Cfb8::encryptor(&pad_key(key), iv)?;

    let mut payload = Vec::with_capacity(BLOCK_SIZE + plaintext.len());
    payload.extend_from_slice(&iv);
    payload.resize(BLOCK_SIZE + plaintext.len(), 0);
    if let Some(ciphertext) = payload.get_mut(BLOCK_SIZE..) {
        stream.xor_key_stream(ciphertext, plaintext);
    }

    Ok(BASE64.encode(payload))
}

/// Reverses [`encrypt`].
pub fn decrypt(ciphertext: &str, key: &str) -> Result<String, CryptoError> {
    let payload = BASE64.decode(ciphertext)?;
    if payload.len() < BLOCK_SIZE {
        return Err(CryptoError::PayloadTooShort(payload.len()));
    }

    let (iv, body) = payload.split_at(BLOCK_SIZE);
    let mut register = [0u8; BLOCK_SIZE];
    register.copy_from_slice(iv);

    let mut stream = Cfb8::decryptor(&pad_key(key.as_bytes()), register)?;
    let mut plaintext = vec![0u8; body.len()];
    stream.xor_key_stream(&mut plaintext, body);

    Ok(String::from_utf8(plaintext)?)
}
