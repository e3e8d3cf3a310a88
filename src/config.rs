//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. explicit path (e.g. the CLI's `--config <path>`)
//! 2. `~/.muninn/config.toml` (user)
//! 3. `/etc/muninn/config.toml` (system)
//!
//! When no file exists at all, built-in defaults are used; every field has
//! a default so a partial file is always valid.

use serde::Deserialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use crate::signature::SignaturePolicy;
use crate::{MuninnError, Result};

/// State layer configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub signatures: SignaturePolicy,
}

/// Where persisted state lives.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory for all state files (default: `<data dir>/muninn`).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Credential document file name, relative to `data_dir`.
    #[serde(default = "default_credentials_file")]
    pub credentials_file: String,
    /// Cooldown document file name, relative to `data_dir`.
    #[serde(default = "default_cooldowns_file")]
    pub cooldowns_file: String,
    /// Directory holding one signature history per model, relative to `data_dir`.
    #[serde(default = "default_signatures_dir")]
    pub signatures_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            credentials_file: default_credentials_file(),
            cooldowns_file: default_cooldowns_file(),
            signatures_dir: default_signatures_dir(),
        }
    }
}

impl StorageConfig {
    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir.join(&self.credentials_file)
    }

    pub fn cooldowns_path(&self) -> PathBuf {
        self.data_dir.join(&self.cooldowns_file)
    }

    pub fn signatures_path(&self) -> PathBuf {
        self.data_dir.join(&self.signatures_dir)
    }

    /// Reject layouts where the signature directory is `data_dir` itself.
    ///
    /// Clearing signatures must never be able to reach the credential or
    /// cooldown documents.
    pub fn validate(&self) -> Result<()> {
        let signatures = Path::new(self.signatures_dir.trim());
        let is_root = signatures
            .components()
            .all(|c| matches!(c, Component::CurDir));
        if is_root {
            return Err(MuninnError::Configuration(format!(
                "signatures_dir {:?} must name a subdirectory of data_dir",
                self.signatures_dir
            )));
        }
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from(".data"))
        .join("muninn")
}

fn default_credentials_file() -> String {
    "accounts.json".to_string()
}

fn default_cooldowns_file() -> String {
    "cooldowns.json".to_string()
}

fn default_signatures_dir() -> String {
    "signatures".to_string()
}

/// Credential repository tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    /// How long `read_all` may serve the cached set, in seconds (default: 5).
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl CredentialsConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

fn default_cache_ttl_secs() -> u64 {
    5
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// An explicit path must exist. Without one, the first of
    /// `~/.muninn/config.toml` and `/etc/muninn/config.toml` that exists is
    /// used, falling back to [`Config::default`].
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| MuninnError::Configuration(format!("Failed to parse config: {e}")))?;
        config.storage.validate()?;
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MuninnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            MuninnError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })?;
        config.storage.validate()?;
        Ok(config)
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(MuninnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".muninn").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/muninn/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert!(config.storage.data_dir.ends_with("muninn"));
        assert_eq!(config.storage.credentials_file, "accounts.json");
        assert_eq!(config.credentials.cache_ttl(), Duration::from_secs(5));
        assert_eq!(config.signatures, SignaturePolicy::default());
    }

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
            [storage]
            data_dir = "/var/lib/proxy"
        "#;
        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("/var/lib/proxy"));
        // Defaults preserved
        assert_eq!(config.storage.cooldowns_file, "cooldowns.json");
        assert_eq!(config.credentials.cache_ttl_secs, 5);
        assert!(!config.signatures.cache_all);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [storage]
            data_dir = "/srv/state"
            credentials_file = "tokens.json"
            cooldowns_file = "cd.json"
            signatures_dir = "sigs"

            [credentials]
            cache_ttl_secs = 30

            [signatures]
            cache_tool_signatures = true
            cache_image_signatures = true
            retain_reasoning_content = true
        "#;
        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(
            config.storage.credentials_path(),
            PathBuf::from("/srv/state/tokens.json")
        );
        assert_eq!(config.storage.cooldowns_path(), PathBuf::from("/srv/state/cd.json"));
        assert_eq!(config.storage.signatures_path(), PathBuf::from("/srv/state/sigs"));
        assert_eq!(config.credentials.cache_ttl(), Duration::from_secs(30));
        assert!(!config.signatures.cache_all);
        assert!(config.signatures.cache_tool_signatures);
        assert!(config.signatures.cache_image_signatures);
        assert!(config.signatures.retain_reasoning_content);
    }

    #[test]
    fn invalid_toml_is_configuration_error() {
        let err = Config::from_toml_str("[storage\n").unwrap_err();
        assert!(matches!(err, MuninnError::Configuration(_)));
    }

    #[test]
    fn signatures_dir_must_be_a_subdirectory() {
        for dir in ["", ".", "./", " "] {
            let toml = format!("[storage]\nsignatures_dir = {dir:?}\n");
            let err = Config::from_toml_str(&toml).unwrap_err();
            assert!(
                err.to_string().contains("must name a subdirectory"),
                "{dir:?}: {err}"
            );
        }
        assert!(Config::from_toml_str("[storage]\nsignatures_dir = \"sigs\"\n").is_ok());
    }

    #[test]
    fn config_not_found_returns_error() {
        let result = Config::load(Some(Path::new("/nonexistent/config.toml")));
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Config file not found"));
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[credentials]\ncache_ttl_secs = 1\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.credentials.cache_ttl_secs, 1);
    }
}
