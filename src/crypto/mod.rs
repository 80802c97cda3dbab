//! Cryptographic primitives for TradeVault.
//!
//! This module provides:
//! - AES-256-GCM encryption and decryption (`encryption`)
//! - Master key storage and HKDF sub-key derivation (`keys`)
//! - The `SecretCipher` facade the vault encrypts through

pub mod encryption;
pub mod keys;

pub use encryption::{decrypt, encrypt};
pub use keys::MasterKey;

use zeroize::Zeroize;

use crate::errors::Result;

/// Authenticated encryption of opaque byte blobs under a derived key.
///
/// Construct one from a `MasterKey`; the actual encryption key is an
/// HKDF sub-key, so the raw key-file bytes never touch a cipher.
pub struct SecretCipher {
    key: [u8; 32],
}

impl SecretCipher {
    /// Derive the cipher key from the master key.
    pub fn new(master: &MasterKey) -> Result<Self> {
        Ok(Self {
            key: master.derive_cipher_key()?,
        })
    }

    /// Encrypt a plaintext blob.  See `encryption::encrypt` for layout.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        encrypt(&self.key, plaintext)
    }

    /// Decrypt a blob produced by `encrypt`.
    ///
    /// Fails with `DecryptionFailed` on tampered or foreign ciphertext.
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>> {
        decrypt(&self.key, blob)
    }
}

impl Drop for SecretCipher {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}
