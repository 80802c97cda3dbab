//! Master key management and HKDF-SHA256 sub-key derivation.
//!
//! The master key is a 32-byte random value held in a local key file.
//! From it we derive purpose-bound sub-keys via HKDF (RFC 5869) so the
//! cipher key is never the raw key-file content.  Losing the key file
//! makes every previously encrypted blob permanently unrecoverable —
//! fail-closed, there is no recovery path.

use std::fs;
use std::path::Path;

use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::errors::{Result, TradeVaultError};

/// Length of the master key and all derived sub-keys (256 bits).
const KEY_LEN: usize = 32;

/// A 32-byte master key that zeroes its memory when dropped.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    /// Wrap raw key bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Load the master key from `path`, or generate and persist a new one
    /// if the file does not exist yet.
    ///
    /// A key file with the wrong length is treated as corruption and
    /// surfaces as a `Security` error — initialization must abort rather
    /// than continue with unusable key material.
    pub fn load_or_generate(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }

        let mut bytes = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    TradeVaultError::Security(format!("cannot create key directory: {e}"))
                })?;
            }
        }

        fs::write(path, bytes)
            .map_err(|e| TradeVaultError::Security(format!("failed to write key file: {e}")))?;

        // On Unix, restrict the key file to owner-only read/write.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms).map_err(|e| {
                TradeVaultError::Security(format!("failed to set key file permissions: {e}"))
            })?;
        }

        Ok(Self::new(bytes))
    }

    /// Load an existing master key file, validating its length.
    pub fn load(path: &Path) -> Result<Self> {
        let mut data = fs::read(path)
            .map_err(|e| TradeVaultError::Security(format!("failed to read key file: {e}")))?;

        if data.len() != KEY_LEN {
            data.zeroize();
            return Err(TradeVaultError::Security(format!(
                "key file must be exactly {KEY_LEN} bytes, got a corrupted file"
            )));
        }

        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&data);
        data.zeroize();
        Ok(Self::new(bytes))
    }

    /// Derive the blob-encryption sub-key.
    pub fn derive_cipher_key(&self) -> Result<[u8; KEY_LEN]> {
        hkdf_derive(&self.bytes, b"tradevault-cipher-key:v1")
    }
}

/// Run HKDF-SHA256 expand with the given `info`.
///
/// The extract step is skipped and the master key is used directly as the
/// pseudo-random key, because it already has full entropy (it came from
/// the OS RNG).
fn hkdf_derive(ikm: &[u8], info: &[u8]) -> Result<[u8; KEY_LEN]> {
    let hk = Hkdf::<Sha256>::new(None, ikm);

    let mut okm = [0u8; KEY_LEN];
    hk.expand(info, &mut okm)
        .map_err(|e| TradeVaultError::KeyDerivationFailed(format!("HKDF expand failed: {e}")))?;

    Ok(okm)
}
