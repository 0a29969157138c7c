//! Encryption-at-rest for platform API tokens.
//!
//! Tokens are sealed with ChaCha20-Poly1305 under a 256-bit key derived by
//! hashing the configured vault secret. Every call to [`Vault::encrypt`]
//! draws a fresh random 96-bit nonce; the stored blob is
//! `base64(nonce || ciphertext)`. Decryption failures never distinguish a
//! malformed blob from a wrong key or tampering.
//!
//! The vault performs no I/O; it is pure CPU and always reports failures to
//! the caller.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::error::{Result, VaultError};

const NONCE_LEN: usize = 12;

/// Number of leading and trailing characters preserved by [`Vault::mask`].
pub const MASK_VISIBLE_CHARS: usize = 4;

const MASK_CHAR: char = '*';

pub struct Vault {
    key: [u8; 32],
}

impl Vault {
    /// Derive the vault key from the configured secret.
    pub fn new(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self { key }
    }

    /// Seal a plaintext token for storage.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Encryption`] if the cipher rejects the input.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.key)
            .map_err(|e| VaultError::Encryption(e.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| VaultError::Encryption(e.to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(blob))
    }

    /// Open a blob produced by [`Vault::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::DecryptionFailed`] if the blob is truncated,
    /// not valid base64, the key is wrong, or the ciphertext was tampered
    /// with.
    pub fn decrypt(&self, blob: &str) -> Result<String> {
        let raw = BASE64
            .decode(blob.trim())
            .map_err(|_| VaultError::DecryptionFailed)?;

        if raw.len() <= NONCE_LEN {
            return Err(VaultError::DecryptionFailed.into());
        }

        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        let cipher = ChaCha20Poly1305::new_from_slice(&self.key)
            .map_err(|_| VaultError::DecryptionFailed)?;

        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| VaultError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| VaultError::DecryptionFailed.into())
    }

    /// Mask a token for display, preserving the first and last `visible`
    /// characters. Tokens no longer than `2 * visible` are masked entirely.
    /// Never use the result for authentication.
    pub fn mask(token: &str, visible: usize) -> String {
        let chars: Vec<char> = token.chars().collect();
        if chars.len() <= visible * 2 {
            return MASK_CHAR.to_string().repeat(chars.len());
        }

        let head: String = chars[..visible].iter().collect();
        let tail: String = chars[chars.len() - visible..].iter().collect();
        let masked = MASK_CHAR.to_string().repeat(chars.len() - visible * 2);
        format!("{head}{masked}{tail}")
    }
}

impl Drop for Vault {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}
