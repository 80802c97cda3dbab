use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, TradeVaultError};

/// Project-level configuration for the control plane itself, loaded from
/// `.tradevault.toml`.
///
/// Every field has a sensible default so the control plane works
/// out-of-the-box without any config file at all.  Note this is not the
/// trading configuration document — that is supplied by a collaborator
/// at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory (relative to the base dir) where encrypted secret blobs
    /// are stored.
    #[serde(default = "default_secrets_dir")]
    pub secrets_dir: String,

    /// Path (relative to the base dir) of the master key file.
    #[serde(default = "default_key_file")]
    pub key_file: String,

    /// How many configuration versions the history ring retains.
    #[serde(default = "default_max_versions")]
    pub max_versions: usize,

    /// Days until newly stored exchange credentials are due for rotation.
    #[serde(default = "default_rotation_days")]
    pub credential_rotation_days: i64,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_secrets_dir() -> String {
    "secrets".to_string()
}

fn default_key_file() -> String {
    "secrets/master.key".to_string()
}

fn default_max_versions() -> usize {
    50
}

fn default_rotation_days() -> i64 {
    90
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            secrets_dir: default_secrets_dir(),
            key_file: default_key_file(),
            max_versions: default_max_versions(),
            credential_rotation_days: default_rotation_days(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the base directory.
    const FILE_NAME: &'static str = ".tradevault.toml";

    /// Load settings from `<base_dir>/.tradevault.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(base_dir: &Path) -> Result<Self> {
        let config_path = base_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        toml::from_str(&contents).map_err(|e| {
            TradeVaultError::Config(format!("failed to parse {}: {e}", config_path.display()))
        })
    }

    /// Full path of the secrets directory.
    pub fn secrets_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.secrets_dir)
    }

    /// Full path of the master key file.
    pub fn key_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.key_file)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sensible() {
        let s = Settings::default();
        assert_eq!(s.secrets_dir, "secrets");
        assert_eq!(s.key_file, "secrets/master.key");
        assert_eq!(s.max_versions, 50);
        assert_eq!(s.credential_rotation_days, 90);
    }

    #[test]
    fn load_returns_defaults_when_no_config_file() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.max_versions, 50);
    }

    #[test]
    fn load_parses_toml_file() {
        let tmp = TempDir::new().unwrap();
        let config = r#"
secrets_dir = "private"
key_file = "private/key.bin"
max_versions = 5
credential_rotation_days = 30
"#;
        fs::write(tmp.path().join(".tradevault.toml"), config).unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.secrets_dir, "private");
        assert_eq!(settings.key_file, "private/key.bin");
        assert_eq!(settings.max_versions, 5);
        assert_eq!(settings.credential_rotation_days, 30);
    }

    #[test]
    fn load_uses_defaults_for_missing_fields() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".tradevault.toml"), "max_versions = 7\n").unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.max_versions, 7);
        assert_eq!(settings.secrets_dir, "secrets");
    }

    #[test]
    fn load_errors_on_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".tradevault.toml"), "not valid {{toml").unwrap();

        assert!(Settings::load(tmp.path()).is_err());
    }

    #[test]
    fn paths_are_rooted_at_base_dir() {
        let s = Settings::default();
        let base = Path::new("/srv/bot");
        assert_eq!(s.secrets_path(base), PathBuf::from("/srv/bot/secrets"));
        assert_eq!(
            s.key_path(base),
            PathBuf::from("/srv/bot/secrets/master.key")
        );
    }
}
