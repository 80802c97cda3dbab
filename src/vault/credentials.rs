//! Exchange API credential records with rotation metadata.
//!
//! One logical record exists per exchange.  Rotation produces a new
//! record with an incremented version that embeds the immediately prior
//! record at depth 1 — the embedded record's own predecessor is cleared,
//! so history never chains deeper than one step.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// The credential triple required to talk to an exchange.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
#[zeroize(drop)]
pub struct ApiCredentials {
    pub api_key: String,
    pub secret_key: String,
    pub passphrase: String,
}

impl ApiCredentials {
    pub fn new(
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            passphrase: passphrase.into(),
        }
    }

    /// Names of required fields that are empty, in declaration order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.api_key.is_empty() {
            missing.push("api_key");
        }
        if self.secret_key.is_empty() {
            missing.push("secret_key");
        }
        if self.passphrase.is_empty() {
            missing.push("passphrase");
        }
        missing
    }
}

// Manual Debug so credential material can never leak through logging.
impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &"[REDACTED]")
            .field("secret_key", &"[REDACTED]")
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}

/// A versioned credential record for one exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub exchange_id: String,

    pub credentials: ApiCredentials,

    /// Strictly incremented by rotation; the first record is version 1.
    pub version: u32,

    pub created_at: DateTime<Utc>,

    /// When this credential should next be rotated.
    pub rotation_due: DateTime<Utc>,

    /// The record this one replaced, if any.  Its own `previous_version`
    /// is always `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<Box<CredentialRecord>>,
}

impl CredentialRecord {
    /// Build the initial (version 1) record for an exchange.
    pub fn first(
        exchange_id: impl Into<String>,
        credentials: ApiCredentials,
        rotation_period: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            exchange_id: exchange_id.into(),
            credentials,
            version: 1,
            created_at: now,
            rotation_due: now + rotation_period,
            previous_version: None,
        }
    }

    /// Build the successor record holding `new_credentials`.
    ///
    /// The current record is embedded as `previous_version` with its own
    /// predecessor cleared.
    pub fn rotated(mut self, new_credentials: ApiCredentials, rotation_period: Duration) -> Self {
        self.previous_version = None;
        let now = Utc::now();
        Self {
            exchange_id: self.exchange_id.clone(),
            credentials: new_credentials,
            version: self.version + 1,
            created_at: now,
            rotation_due: now + rotation_period,
            previous_version: Some(Box::new(self)),
        }
    }

    /// Whether the rotation deadline has passed.
    pub fn rotation_overdue(&self) -> bool {
        Utc::now() > self.rotation_due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(suffix: &str) -> ApiCredentials {
        ApiCredentials::new(
            format!("key-{suffix}"),
            format!("sec-{suffix}"),
            format!("pass-{suffix}"),
        )
    }

    #[test]
    fn missing_fields_reports_each_empty_field() {
        let full = creds("a");
        assert!(full.missing_fields().is_empty());

        let partial = ApiCredentials::new("k", "", "");
        assert_eq!(partial.missing_fields(), vec!["secret_key", "passphrase"]);
    }

    #[test]
    fn rotation_increments_version_and_embeds_prior() {
        let first = CredentialRecord::first("bitget", creds("1"), Duration::days(90));
        assert_eq!(first.version, 1);
        assert!(first.previous_version.is_none());

        let second = first.rotated(creds("2"), Duration::days(90));
        assert_eq!(second.version, 2);
        assert_eq!(second.credentials, creds("2"));

        let prior = second.previous_version.as_ref().unwrap();
        assert_eq!(prior.version, 1);
        assert_eq!(prior.credentials, creds("1"));
    }

    #[test]
    fn rotation_history_does_not_chain_past_depth_one() {
        let first = CredentialRecord::first("bitget", creds("1"), Duration::days(90));
        let second = first.rotated(creds("2"), Duration::days(90));
        let third = second.rotated(creds("3"), Duration::days(90));

        let prior = third.previous_version.as_ref().unwrap();
        assert_eq!(prior.version, 2);
        assert!(prior.previous_version.is_none());
    }

    #[test]
    fn debug_output_never_contains_credential_material() {
        let c = creds("topsecret");
        let rendered = format!("{c:?}");
        assert!(!rendered.contains("topsecret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
