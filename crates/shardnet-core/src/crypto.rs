//! Per-hop cryptographic transform.
//!
//! There is no onion-style nested encryption here: each hop decrypts a
//! chunk's payload fully into plaintext, then re-encrypts it under its own
//! forwarding key before passing it on. A single key may be shared by both
//! sides of a hop, or each hop may use a distinct key; the protocol does
//! not require either.
//!
//! AES-256-GCM, random 12-byte nonce prepended to the ciphertext:
//! `nonce || ciphertext || tag`.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

const NONCE_LEN: usize = 12;

/// A 32-byte AES-256-GCM key, loaded from config or a secrets mechanism,
/// never a hardcoded constant.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a 64-character hex string into a key.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s).map_err(|_| CryptoError::BadKey)?;
        if bytes.len() != 32 {
            return Err(CryptoError::BadKey);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }
}

/// Encrypt `plaintext`, returning `nonce || ciphertext || tag`.
pub fn encrypt(key: &EncryptionKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = key.cipher();
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::EncryptFailed)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(nonce.as_slice());
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt `nonce || ciphertext || tag` produced by [`encrypt`].
pub fn decrypt(key: &EncryptionKey, framed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if framed.len() < NONCE_LEN {
        return Err(CryptoError::TooShort);
    }
    let (nonce_bytes, ciphertext) = framed.split_at(NONCE_LEN);
    let cipher = key.cipher();
    cipher
        .decrypt(nonce_bytes.into(), ciphertext)
        .map_err(|_| CryptoError::DecryptFailed)
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption key must be 32 bytes (64 hex characters)")]
    BadKey,
    #[error("ciphertext too short to contain a nonce")]
    TooShort,
    #[error("encryption failed")]
    EncryptFailed,
    #[error("decryption failed: wrong key or tampered ciphertext")]
    DecryptFailed,
}
