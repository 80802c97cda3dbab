//! Integration tests for the secret vault and credential rotation.

use std::sync::Arc;

use tempfile::TempDir;
use tradevault::audit::{AuditEventType, AuditTrail};
use tradevault::crypto::{MasterKey, SecretCipher};
use tradevault::errors::TradeVaultError;
use tradevault::vault::{ApiCredentials, SecretVault};

fn open_vault(dir: &TempDir) -> SecretVault {
    let cipher = SecretCipher::new(&MasterKey::new([0x42u8; 32])).unwrap();
    SecretVault::open(dir.path(), cipher).unwrap()
}

// ---------------------------------------------------------------------------
// Generic secrets
// ---------------------------------------------------------------------------

#[test]
fn store_and_retrieve_secret_roundtrip() {
    let dir = TempDir::new().unwrap();
    let vault = open_vault(&dir);

    vault
        .store_secret("telegram_token", b"123456:ABC-DEF")
        .unwrap();

    assert_eq!(
        vault.retrieve_secret("telegram_token").unwrap(),
        b"123456:ABC-DEF"
    );
}

#[test]
fn secrets_are_stored_one_blob_per_name() {
    let dir = TempDir::new().unwrap();
    let vault = open_vault(&dir);

    vault.store_secret("alpha", b"1").unwrap();
    vault.store_secret("beta", b"2").unwrap();

    assert!(dir.path().join("alpha.enc").exists());
    assert!(dir.path().join("beta.enc").exists());
    assert_eq!(vault.list_secrets().unwrap(), vec!["alpha", "beta"]);
}

#[test]
fn overwriting_a_secret_replaces_its_value() {
    let dir = TempDir::new().unwrap();
    let vault = open_vault(&dir);

    vault.store_secret("webhook", b"old").unwrap();
    vault.store_secret("webhook", b"new").unwrap();

    assert_eq!(vault.retrieve_secret("webhook").unwrap(), b"new");
}

#[test]
fn delete_secret_removes_the_blob() {
    let dir = TempDir::new().unwrap();
    let vault = open_vault(&dir);

    vault.store_secret("doomed", b"x").unwrap();
    vault.delete_secret("doomed").unwrap();

    assert!(matches!(
        vault.retrieve_secret("doomed"),
        Err(TradeVaultError::SecretNotFound(_))
    ));
    assert!(matches!(
        vault.delete_secret("doomed"),
        Err(TradeVaultError::SecretNotFound(_))
    ));
}

// ---------------------------------------------------------------------------
// Exchange credentials
// ---------------------------------------------------------------------------

#[test]
fn credential_store_get_rotate_scenario() {
    let dir = TempDir::new().unwrap();
    let vault = open_vault(&dir);

    vault
        .store_api_credentials("bitget", ApiCredentials::new("k1", "s1", "p1"))
        .unwrap();

    let creds = vault.get_api_credentials("bitget").unwrap();
    assert_eq!(creds, ApiCredentials::new("k1", "s1", "p1"));

    vault
        .rotate_credentials("bitget", ApiCredentials::new("k2", "s2", "p2"))
        .unwrap();

    let creds = vault.get_api_credentials("bitget").unwrap();
    assert_eq!(creds, ApiCredentials::new("k2", "s2", "p2"));

    let record = vault.credential_record("bitget").unwrap();
    assert_eq!(record.version, 2);

    // The prior record stays reachable, exactly one level deep.
    let prior = record.previous_version.as_ref().unwrap();
    assert_eq!(prior.version, 1);
    assert_eq!(prior.credentials, ApiCredentials::new("k1", "s1", "p1"));
    assert!(prior.previous_version.is_none());
}

#[test]
fn incomplete_credentials_are_rejected() {
    let dir = TempDir::new().unwrap();
    let vault = open_vault(&dir);

    let result = vault.store_api_credentials("bitget", ApiCredentials::new("k1", "", ""));
    match result {
        Err(TradeVaultError::Validation(message)) => {
            assert!(message.contains("secret_key"));
            assert!(message.contains("passphrase"));
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
fn rotation_without_baseline_fails() {
    let dir = TempDir::new().unwrap();
    let vault = open_vault(&dir);

    assert!(matches!(
        vault.rotate_credentials("binance", ApiCredentials::new("k", "s", "p")),
        Err(TradeVaultError::SecretNotFound(_))
    ));
}

#[test]
fn rotation_due_stamp_is_about_ninety_days_out() {
    let dir = TempDir::new().unwrap();
    let vault = open_vault(&dir);

    vault
        .store_api_credentials("bitget", ApiCredentials::new("k", "s", "p"))
        .unwrap();

    let record = vault.credential_record("bitget").unwrap();
    let due_in = record.rotation_due - record.created_at;
    assert_eq!(due_in.num_days(), 90);
    assert!(!record.rotation_overdue());
}

#[test]
fn overdue_credentials_are_returned_but_flagged_in_audit() {
    let dir = TempDir::new().unwrap();
    let audit = Arc::new(AuditTrail::new());
    let cipher = SecretCipher::new(&MasterKey::new([0x42u8; 32])).unwrap();
    // A negative rotation period makes every record overdue immediately.
    let vault = SecretVault::open(dir.path(), cipher)
        .unwrap()
        .with_rotation_days(-1)
        .with_audit(audit.clone());

    vault
        .store_api_credentials("bitget", ApiCredentials::new("k", "s", "p"))
        .unwrap();

    // The call still succeeds — overdue rotation logs, it does not fail.
    let creds = vault.get_api_credentials("bitget").unwrap();
    assert_eq!(creds.api_key, "k");

    let events = audit.query(1, None);
    assert_eq!(events[0].event_type, AuditEventType::SecretAccessed);
    assert_eq!(events[0].details["rotation_overdue"], serde_json::json!(true));
}

#[test]
fn rotation_logs_secret_rotated_event() {
    let dir = TempDir::new().unwrap();
    let audit = Arc::new(AuditTrail::new());
    let cipher = SecretCipher::new(&MasterKey::new([0x42u8; 32])).unwrap();
    let vault = SecretVault::open(dir.path(), cipher)
        .unwrap()
        .with_audit(audit.clone());

    vault
        .store_api_credentials("bitget", ApiCredentials::new("k1", "s1", "p1"))
        .unwrap();
    vault
        .rotate_credentials("bitget", ApiCredentials::new("k2", "s2", "p2"))
        .unwrap();

    let events = audit.query(1, None);
    assert_eq!(events[0].event_type, AuditEventType::SecretRotated);
    assert_eq!(events[0].details["version"], serde_json::json!(2));
}

#[test]
fn credential_blobs_never_hold_plaintext_on_disk() {
    let dir = TempDir::new().unwrap();
    let vault = open_vault(&dir);

    vault
        .store_api_credentials(
            "bitget",
            ApiCredentials::new("visible-key-material", "visible-secret", "visible-pass"),
        )
        .unwrap();

    let raw = std::fs::read(dir.path().join("credentials").join("bitget.enc")).unwrap();
    for needle in [b"visible-key-material".as_slice(), b"visible-secret", b"visible-pass"] {
        let leaked = raw.windows(needle.len()).any(|window| window == needle);
        assert!(!leaked, "plaintext credential material found on disk");
    }
}
