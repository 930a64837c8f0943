//! Authenticated encryption for sealed message sections.
//!
//! Key management and nonce generation live outside this crate. Callers hand
//! the codec an [`Envelope`]: a keyed [`CipherContext`] plus the nonce to use
//! for one message.
//!
//! # Security
//!
//! Opening a sealed section either returns the exact plaintext or fails with
//! [`ProtocolError::AuthenticationFailed`]. There is no path that yields empty
//! or zeroed data for a section that did not verify.

use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit},
};

use crate::errors::{ProtocolError, Result};

/// A keyed AEAD primitive.
///
/// `seal` returns `ciphertext ‖ tag`; `open` verifies the tag before
/// returning any plaintext.
pub trait CipherContext: Send + Sync {
    /// Nonce length this cipher requires
    fn nonce_len(&self) -> usize;

    /// Encrypt and authenticate `plaintext`
    fn seal(&self, nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Verify and decrypt `ciphertext`
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::AuthenticationFailed`] if the tag does not
    /// verify under this key and nonce.
    fn open(&self, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// ChaCha20-Poly1305 cipher context (96-bit nonce, 128-bit tag).
#[derive(Clone)]
pub struct ChaChaCipher {
    cipher: ChaCha20Poly1305,
}

impl ChaChaCipher {
    /// Key length in bytes
    pub const KEY_SIZE: usize = 32;

    /// Nonce length in bytes
    pub const NONCE_SIZE: usize = 12;

    /// Authentication tag length appended to every sealed section
    pub const TAG_SIZE: usize = 16;

    /// Build a cipher context from a 32-byte key
    #[must_use]
    pub fn new(key: &[u8; Self::KEY_SIZE]) -> Self {
        Self { cipher: ChaCha20Poly1305::new(Key::from_slice(key)) }
    }

    fn nonce<'a>(&self, nonce: &'a [u8]) -> Result<&'a Nonce> {
        if nonce.len() != Self::NONCE_SIZE {
            return Err(ProtocolError::InvalidNonceLength {
                expected: Self::NONCE_SIZE,
                actual: nonce.len(),
            });
        }
        Ok(Nonce::from_slice(nonce))
    }
}

impl std::fmt::Debug for ChaChaCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaChaCipher").field("key", &"<redacted>").finish()
    }
}

impl CipherContext for ChaChaCipher {
    fn nonce_len(&self) -> usize {
        Self::NONCE_SIZE
    }

    fn seal(&self, nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = self.nonce(nonce)?;
        self.cipher.encrypt(nonce, plaintext).map_err(|_| ProtocolError::EncryptionFailed)
    }

    fn open(&self, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let nonce = self.nonce(nonce)?;
        self.cipher.decrypt(nonce, ciphertext).map_err(|_| ProtocolError::AuthenticationFailed)
    }
}

/// Cipher context and nonce for sealing or opening one message.
#[derive(Clone, Copy)]
pub struct Envelope<'a> {
    cipher: &'a dyn CipherContext,
    nonce: &'a [u8],
}

impl<'a> Envelope<'a> {
    /// Pair a cipher context with the nonce for one message
    #[must_use]
    pub fn new(cipher: &'a dyn CipherContext, nonce: &'a [u8]) -> Self {
        Self { cipher, nonce }
    }

    /// Seal `plaintext` with this envelope's key and nonce
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        encrypt(self.cipher, self.nonce, plaintext)
    }

    /// Open `ciphertext` with this envelope's key and nonce
    pub fn open(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        decrypt(self.cipher, self.nonce, ciphertext)
    }
}

impl std::fmt::Debug for Envelope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope").field("nonce_len", &self.nonce.len()).finish_non_exhaustive()
    }
}

/// Seal `plaintext` under `cipher` and `iv`.
pub fn encrypt(cipher: &dyn CipherContext, iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    cipher.seal(iv, plaintext)
}

/// Open `ciphertext` under `cipher` and `iv`.
///
/// # Errors
///
/// Returns [`ProtocolError::AuthenticationFailed`] if the tag does not verify.
pub fn decrypt(cipher: &dyn CipherContext, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    cipher.open(iv, ciphertext)
}
