use std::path::PathBuf;
use thiserror::Error;

/// All errors that can occur in TradeVault.
#[derive(Debug, Error)]
pub enum TradeVaultError {
    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed — ciphertext is tampered or encrypted under a foreign key")]
    DecryptionFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Security error: {0}")]
    Security(String),

    // --- Vault errors ---
    #[error("Secret '{0}' not found")]
    SecretNotFound(String),

    #[error("Secret store unavailable at {0}")]
    SecretStoreUnavailable(PathBuf),

    // --- Validation errors ---
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    // --- Store errors ---
    #[error("Concurrent write — atomic_update called from within an open write section")]
    ConcurrentWrite,

    // --- History errors ---
    #[error("Integrity error: stored checksum does not match snapshot for version {0}")]
    IntegrityMismatch(u64),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    Config(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Convenience type alias for TradeVault results.
pub type Result<T> = std::result::Result<T, TradeVaultError>;
