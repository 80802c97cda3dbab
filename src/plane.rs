//! The control-plane context.
//!
//! `ControlPlane` bundles every component — key store, cipher, vault,
//! validator, history, audit trail, config store — behind one explicitly
//! constructed value.  Build it once at process start with `init` and
//! pass references to consumers; tear it down with `shutdown`.  There
//! are no module-level singletons and no import-time side effects.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::audit::{AuditSink, AuditTrail};
use crate::config::Settings;
use crate::crypto::{MasterKey, SecretCipher};
use crate::document::Document;
use crate::errors::Result;
use crate::store::ConfigStore;
use crate::validator::Validator;
use crate::vault::SecretVault;

/// One fully wired control plane instance.
pub struct ControlPlane {
    settings: Settings,
    store: Arc<ConfigStore>,
    vault: SecretVault,
    audit: Arc<AuditTrail>,
}

impl ControlPlane {
    /// Initialize from `<base_dir>/.tradevault.toml` (or defaults) and
    /// the collaborator-supplied initial document.
    ///
    /// Fails with a `Security` error when the master key file exists but
    /// is corrupt — the plane must not start with unusable key material.
    pub fn init(
        base_dir: &Path,
        initial: Document,
        sink: Option<Box<dyn AuditSink>>,
    ) -> Result<Self> {
        let settings = Settings::load(base_dir)?;
        Self::init_with_settings(base_dir, settings, initial, sink)
    }

    /// Initialize with explicit settings.
    pub fn init_with_settings(
        base_dir: &Path,
        settings: Settings,
        initial: Document,
        sink: Option<Box<dyn AuditSink>>,
    ) -> Result<Self> {
        let audit = Arc::new(match sink {
            Some(sink) => AuditTrail::with_sink(sink),
            None => AuditTrail::new(),
        });

        let master = MasterKey::load_or_generate(&settings.key_path(base_dir))?;
        let cipher = SecretCipher::new(&master)?;
        let vault = SecretVault::open(&settings.secrets_path(base_dir), cipher)?
            .with_rotation_days(settings.credential_rotation_days)
            .with_audit(audit.clone());

        let validator = Validator::new()?;
        let store = Arc::new(ConfigStore::new(
            initial,
            validator,
            settings.max_versions,
            audit.clone(),
        )?);

        info!(
            secrets_dir = %settings.secrets_path(base_dir).display(),
            max_versions = settings.max_versions,
            "control plane initialized"
        );

        Ok(Self {
            settings,
            store,
            vault,
            audit,
        })
    }

    /// The atomic configuration store.
    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// The encrypted secret vault.
    pub fn vault(&self) -> &SecretVault {
        &self.vault
    }

    /// The audit trail shared by store and vault.
    pub fn audit(&self) -> &Arc<AuditTrail> {
        &self.audit
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Tear the plane down.
    ///
    /// In-memory history and audit events are discarded; encrypted blobs
    /// and the key file stay on disk for the next start.
    pub fn shutdown(self) {
        info!(
            audit_events = self.audit.len(),
            final_version = self.store.get_version(),
            "control plane shut down"
        );
    }
}
