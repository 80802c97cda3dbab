//! Vault module — encrypted secret and credential storage.
//!
//! Secrets are encrypted through `SecretCipher` and persisted one blob
//! per name at `<root>/<name>.enc`; exchange credentials live under
//! `<root>/credentials/<exchange>.enc` as encrypted JSON records.  Files
//! contain nothing but the authenticated-encryption output — no
//! plaintext secret ever touches disk, and decrypted values are handed
//! to the caller without being cached anywhere.

pub mod credentials;

pub use credentials::{ApiCredentials, CredentialRecord};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Duration;
use serde_json::{Map, Value};
use tracing::warn;

use crate::audit::{AuditEvent, AuditEventType, AuditTrail, RiskLevel};
use crate::crypto::SecretCipher;
use crate::errors::{Result, TradeVaultError};

/// Default credential rotation period.
const DEFAULT_ROTATION_DAYS: i64 = 90;

/// Subdirectory holding exchange credential records.
const CREDENTIALS_DIR: &str = "credentials";

/// Encrypted secret storage rooted at a local directory.
pub struct SecretVault {
    root: PathBuf,
    cipher: SecretCipher,
    rotation_period: Duration,
    audit: Option<Arc<AuditTrail>>,
}

impl SecretVault {
    /// Open (or create) a vault rooted at `root`.
    pub fn open(root: &Path, cipher: SecretCipher) -> Result<Self> {
        fs::create_dir_all(root.join(CREDENTIALS_DIR))
            .map_err(|_| TradeVaultError::SecretStoreUnavailable(root.to_path_buf()))?;

        // On Unix, keep the whole tree owner-only.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o700);
            let _ = fs::set_permissions(root, perms);
        }

        Ok(Self {
            root: root.to_path_buf(),
            cipher,
            rotation_period: Duration::days(DEFAULT_ROTATION_DAYS),
            audit: None,
        })
    }

    /// Override the rotation period (days) stamped on new credentials.
    pub fn with_rotation_days(mut self, days: i64) -> Self {
        self.rotation_period = Duration::days(days);
        self
    }

    /// Attach an audit trail; secret access and rotation are logged to it.
    pub fn with_audit(mut self, audit: Arc<AuditTrail>) -> Self {
        self.audit = Some(audit);
        self
    }

    // ------------------------------------------------------------------
    // Generic secrets
    // ------------------------------------------------------------------

    /// Encrypt `data` and persist it under `name`.
    pub fn store_secret(&self, name: &str, data: &[u8]) -> Result<()> {
        validate_secret_name(name)?;
        let blob = self.cipher.encrypt(data)?;
        write_atomic(&self.secret_path(name), &blob)
    }

    /// Load and decrypt the secret stored under `name`.
    pub fn retrieve_secret(&self, name: &str) -> Result<Vec<u8>> {
        validate_secret_name(name)?;
        let path = self.secret_path(name);
        if !path.exists() {
            return Err(TradeVaultError::SecretNotFound(name.to_string()));
        }

        let blob = fs::read(&path)?;
        self.decrypt_or_alert(&blob, name)
    }

    /// Remove the secret stored under `name`.
    pub fn delete_secret(&self, name: &str) -> Result<()> {
        validate_secret_name(name)?;
        let path = self.secret_path(name);
        if !path.exists() {
            return Err(TradeVaultError::SecretNotFound(name.to_string()));
        }
        fs::remove_file(path)?;
        Ok(())
    }

    /// List stored secret names, sorted.  Metadata only — nothing is
    /// decrypted.
    pub fn list_secrets(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            if let Some(name) = file_name.to_string_lossy().strip_suffix(".enc") {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    // ------------------------------------------------------------------
    // Exchange credentials
    // ------------------------------------------------------------------

    /// Store the initial credential record for an exchange.
    ///
    /// All three fields must be non-empty.  The record is stamped with
    /// `created_at = now`, `rotation_due = now + rotation_period`, and
    /// version 1.  Storing again re-provisions the exchange from scratch.
    pub fn store_api_credentials(
        &self,
        exchange_id: &str,
        credentials: ApiCredentials,
    ) -> Result<()> {
        validate_secret_name(exchange_id)?;
        check_required_fields(exchange_id, &credentials)?;

        let record = CredentialRecord::first(exchange_id, credentials, self.rotation_period);
        self.save_record(&record)
    }

    /// Return the current credential triple for an exchange.
    ///
    /// An overdue rotation deadline is logged but does not fail the call.
    pub fn get_api_credentials(&self, exchange_id: &str) -> Result<ApiCredentials> {
        let record = self.credential_record(exchange_id)?;

        let overdue = record.rotation_overdue();
        if overdue {
            warn!(
                exchange = exchange_id,
                version = record.version,
                rotation_due = %record.rotation_due,
                "exchange credentials are past their rotation deadline"
            );
        }

        self.log_audit_event(
            AuditEventType::SecretAccessed,
            RiskLevel::Low,
            [
                ("exchange".to_string(), Value::from(exchange_id)),
                ("version".to_string(), Value::from(record.version)),
                ("rotation_overdue".to_string(), Value::from(overdue)),
            ],
        );

        Ok(record.credentials.clone())
    }

    /// Replace an exchange's credentials, keeping the prior record
    /// reachable through `previous_version`.
    ///
    /// Fails with `SecretNotFound` when no baseline record exists —
    /// rotation requires something to rotate from.
    pub fn rotate_credentials(
        &self,
        exchange_id: &str,
        new_credentials: ApiCredentials,
    ) -> Result<()> {
        check_required_fields(exchange_id, &new_credentials)?;

        let current = self.credential_record(exchange_id)?;
        let rotated = current.rotated(new_credentials, self.rotation_period);
        self.save_record(&rotated)?;

        self.log_audit_event(
            AuditEventType::SecretRotated,
            RiskLevel::Medium,
            [
                ("exchange".to_string(), Value::from(exchange_id)),
                ("version".to_string(), Value::from(rotated.version)),
            ],
        );

        Ok(())
    }

    /// Load the full current credential record, rotation metadata included.
    pub fn credential_record(&self, exchange_id: &str) -> Result<CredentialRecord> {
        validate_secret_name(exchange_id)?;
        let path = self.credential_path(exchange_id);
        if !path.exists() {
            return Err(TradeVaultError::SecretNotFound(exchange_id.to_string()));
        }

        let blob = fs::read(&path)?;
        let plaintext = self.decrypt_or_alert(&blob, exchange_id)?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| TradeVaultError::Serialization(format!("credential record: {e}")))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn secret_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.enc"))
    }

    fn credential_path(&self, exchange_id: &str) -> PathBuf {
        self.root
            .join(CREDENTIALS_DIR)
            .join(format!("{exchange_id}.enc"))
    }

    fn save_record(&self, record: &CredentialRecord) -> Result<()> {
        let plaintext = serde_json::to_vec(record)
            .map_err(|e| TradeVaultError::Serialization(format!("credential record: {e}")))?;
        let blob = self.cipher.encrypt(&plaintext)?;
        write_atomic(&self.credential_path(&record.exchange_id), &blob)
    }

    /// Decrypt a blob; a failure is treated as a security event before
    /// the error is returned to the caller.
    fn decrypt_or_alert(&self, blob: &[u8], name: &str) -> Result<Vec<u8>> {
        match self.cipher.decrypt(blob) {
            Ok(plaintext) => Ok(plaintext),
            Err(e) => {
                self.log_audit_event(
                    AuditEventType::SecurityViolation,
                    RiskLevel::Critical,
                    [
                        ("secret".to_string(), Value::from(name)),
                        (
                            "reason".to_string(),
                            Value::from("ciphertext failed authentication"),
                        ),
                    ],
                );
                Err(e)
            }
        }
    }

    fn log_audit_event<I>(&self, event_type: AuditEventType, risk: RiskLevel, details: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        if let Some(audit) = &self.audit {
            let details: Map<String, Value> = details.into_iter().collect();
            audit.log_event(AuditEvent::new(event_type, risk, details));
        }
    }
}

/// Reject a missing credential field with a descriptive error.
fn check_required_fields(exchange_id: &str, credentials: &ApiCredentials) -> Result<()> {
    let missing = credentials.missing_fields();
    if missing.is_empty() {
        return Ok(());
    }
    Err(TradeVaultError::Validation(format!(
        "credentials for '{exchange_id}' missing required field(s): {}",
        missing.join(", ")
    )))
}

/// Validate that a secret name is safe to use as a file stem.
///
/// Allowed: ASCII letters, digits, underscores, hyphens, periods.
/// Must be non-empty and at most 256 characters.
fn validate_secret_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TradeVaultError::Validation(
            "secret name cannot be empty".into(),
        ));
    }
    if name.len() > 256 {
        return Err(TradeVaultError::Validation(
            "secret name cannot exceed 256 characters".into(),
        ));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
    {
        return Err(TradeVaultError::Validation(format!(
            "secret name '{name}' contains invalid characters — only ASCII letters, digits, underscores, hyphens, and periods are allowed"
        )));
    }
    Ok(())
}

/// Write `data` via temp file + rename so readers never see a partial
/// file.  The temp file lives in the same directory, which keeps the
/// rename atomic on the same filesystem.
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    fs::write(&tmp_path, data)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        let _ = fs::set_permissions(&tmp_path, perms);
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::MasterKey;
    use tempfile::TempDir;

    fn vault(dir: &TempDir) -> SecretVault {
        let cipher = SecretCipher::new(&MasterKey::new([0x42u8; 32])).unwrap();
        SecretVault::open(dir.path(), cipher).unwrap()
    }

    #[test]
    fn secret_names_are_validated() {
        let dir = TempDir::new().unwrap();
        let v = vault(&dir);

        assert!(v.store_secret("", b"x").is_err());
        assert!(v.store_secret("has space", b"x").is_err());
        assert!(v.store_secret("../escape", b"x").is_err());
        assert!(v.store_secret("telegram_token", b"x").is_ok());
    }

    #[test]
    fn stored_file_contains_only_ciphertext() {
        let dir = TempDir::new().unwrap();
        let v = vault(&dir);

        v.store_secret("webhook_url", b"https://hooks.example/abc").unwrap();

        let raw = fs::read(dir.path().join("webhook_url.enc")).unwrap();
        let needle = b"hooks.example";
        let leaked = raw
            .windows(needle.len())
            .any(|window| window == needle.as_slice());
        assert!(!leaked, "plaintext must never appear on disk");
    }

    #[test]
    fn retrieve_missing_secret_fails() {
        let dir = TempDir::new().unwrap();
        let v = vault(&dir);
        assert!(matches!(
            v.retrieve_secret("nope"),
            Err(TradeVaultError::SecretNotFound(_))
        ));
    }

    #[test]
    fn list_secrets_sorted_and_excludes_credentials() {
        let dir = TempDir::new().unwrap();
        let v = vault(&dir);

        v.store_secret("zeta", b"1").unwrap();
        v.store_secret("alpha", b"2").unwrap();
        v.store_api_credentials("bitget", ApiCredentials::new("k", "s", "p"))
            .unwrap();

        assert_eq!(v.list_secrets().unwrap(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn tampered_blob_fails_and_logs_security_violation() {
        let dir = TempDir::new().unwrap();
        let audit = Arc::new(AuditTrail::new());
        let cipher = SecretCipher::new(&MasterKey::new([0x42u8; 32])).unwrap();
        let v = SecretVault::open(dir.path(), cipher)
            .unwrap()
            .with_audit(audit.clone());

        v.store_secret("target", b"payload").unwrap();

        // Flip a byte in the stored blob.
        let path = dir.path().join("target.enc");
        let mut raw = fs::read(&path).unwrap();
        raw[14] ^= 0xFF;
        fs::write(&path, raw).unwrap();

        assert!(matches!(
            v.retrieve_secret("target"),
            Err(TradeVaultError::DecryptionFailed)
        ));

        let events = audit.query(1, None);
        assert_eq!(events[0].event_type, AuditEventType::SecurityViolation);
        assert_eq!(events[0].risk_level, RiskLevel::Critical);
    }
}
