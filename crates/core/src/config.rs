//! Configuration management
//!
//! This module handles loading, validating, and saving the bsync configuration
//! file. The configuration file is stored in TOML format at
//! `~/.config/bsync/config.toml`, or under `$BSYNC_CONFIG_DIR` when set.
//!
//! Changes to schema_version require migration support.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::profile::Profile;

/// Current configuration schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "BSYNC_CONFIG_DIR";

/// Default output format
const DEFAULT_OUTPUT: &str = "human";

/// Default color setting
const DEFAULT_COLOR: &str = "auto";

/// Default number of concurrent transfers during a sync
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Default per-action timeout in seconds
pub const DEFAULT_ACTION_TIMEOUT_SECS: u64 = 300;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema version for migration support
    pub schema_version: u32,

    /// Profile used when none is given on the command line
    #[serde(default = "default_profile")]
    pub default_profile: String,

    /// Default settings
    #[serde(default)]
    pub defaults: Defaults,

    /// Sync engine tuning
    #[serde(default)]
    pub sync: SyncSettings,

    /// Configured profiles
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

/// Default settings for CLI behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    /// Output format: "human" or "json"
    #[serde(default = "default_output")]
    pub output: String,

    /// Color mode: "auto", "always", or "never"
    #[serde(default = "default_color")]
    pub color: String,

    /// Show progress bars
    #[serde(default = "default_true")]
    pub progress: bool,
}

/// Sync engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Maximum number of transfers in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Timeout applied to each get or put, in seconds
    #[serde(default = "default_action_timeout")]
    pub action_timeout_secs: u64,
}

impl SyncSettings {
    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs)
    }
}

fn default_profile() -> String {
    "default".to_string()
}

fn default_output() -> String {
    DEFAULT_OUTPUT.to_string()
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_action_timeout() -> u64 {
    DEFAULT_ACTION_TIMEOUT_SECS
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            progress: true,
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            action_timeout_secs: default_action_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            default_profile: default_profile(),
            defaults: Defaults::default(),
            sync: SyncSettings::default(),
            profiles: Vec::new(),
        }
    }
}

impl Config {
    /// Validate every field that cannot be expressed through serde defaults
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.defaults.output.as_str(), "human" | "json") {
            return Err(Error::Config(format!(
                "defaults.output must be \"human\" or \"json\", got \"{}\"",
                self.defaults.output
            )));
        }
        if !matches!(self.defaults.color.as_str(), "auto" | "always" | "never") {
            return Err(Error::Config(format!(
                "defaults.color must be \"auto\", \"always\" or \"never\", got \"{}\"",
                self.defaults.color
            )));
        }
        if self.sync.concurrency == 0 {
            return Err(Error::Config("sync.concurrency must be at least 1".into()));
        }
        if self.sync.action_timeout_secs == 0 {
            return Err(Error::Config(
                "sync.action_timeout_secs must be at least 1".into(),
            ));
        }
        for (position, profile) in self.profiles.iter().enumerate() {
            profile.validate(position)?;
        }
        Ok(())
    }

    /// Look up a profile, falling back to `default_profile` when `name` is None
    pub fn profile(&self, name: Option<&str>) -> Result<&Profile> {
        let name = name.unwrap_or(&self.default_profile);
        self.profiles
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::ProfileNotFound(name.to_string()))
    }
}

/// Configuration manager handles loading and saving config
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the default config path
    pub fn new() -> Result<Self> {
        let config_dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| Error::Config("Could not determine config directory".into()))?
                .join("bsync"),
        };
        Ok(Self {
            config_path: config_dir.join("config.toml"),
        })
    }

    /// Create a ConfigManager with a custom path (useful for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load and validate configuration from disk
    ///
    /// If the configuration file doesn't exist, returns a default configuration.
    /// If the schema version doesn't match, attempts migration.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        if config.schema_version < SCHEMA_VERSION {
            config = self.migrate(config)?;
        } else if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is newer than supported version {}. Please upgrade bsync.",
                config.schema_version, SCHEMA_VERSION
            )));
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to disk
    ///
    /// Creates parent directories if they don't exist.
    /// Sets file permissions to 600 (owner read/write only).
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.config_path, permissions)?;
        }

        Ok(())
    }

    /// Migrate configuration from older schema version
    fn migrate(&self, config: Config) -> Result<Config> {
        let mut config = config;
        config.schema_version = SCHEMA_VERSION;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let manager = ConfigManager::with_path(config_path);
        (manager, temp_dir)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.schema_version, SCHEMA_VERSION);
        assert_eq!(config.default_profile, "default");
        assert_eq!(config.defaults.output, "human");
        assert_eq!(config.sync.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.sync.action_timeout(), Duration::from_secs(300));
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let (manager, _temp_dir) = temp_config_manager();
        let config = manager.load().unwrap();
        assert_eq!(config.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_save_and_load() {
        let (manager, _temp_dir) = temp_config_manager();

        let mut config = Config::default();
        config.profiles.push(
            Profile::new("local", "minioadmin", "minioadmin").with_endpoint("http://localhost:9000"),
        );
        config.sync.concurrency = 4;

        manager.save(&config).unwrap();
        let loaded = manager.load().unwrap();

        assert_eq!(loaded.profiles.len(), 1);
        assert_eq!(loaded.profiles[0].name, "local");
        assert_eq!(
            loaded.profiles[0].endpoint.as_deref(),
            Some("http://localhost:9000")
        );
        assert_eq!(loaded.sync.concurrency, 4);
    }

    #[test]
    fn test_schema_version_too_new() {
        let (manager, _temp_dir) = temp_config_manager();

        let content = format!("schema_version = {}\n", SCHEMA_VERSION + 1);
        std::fs::write(manager.config_path(), content).unwrap();

        let result = manager.load();
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("newer than supported")
        );
    }

    #[test]
    fn test_missing_secret_key_is_named() {
        let (manager, _temp_dir) = temp_config_manager();

        let content = r#"
            schema_version = 1

            [[profiles]]
            name = "backup"
            access_key = "AKIA"
        "#;
        std::fs::write(manager.config_path(), content).unwrap();

        let err = manager.load().unwrap_err();
        assert!(matches!(
            err,
            Error::MissingField {
                ref profile,
                field: "secret_key"
            } if profile == "backup"
        ));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let (manager, _temp_dir) = temp_config_manager();

        let content = "schema_version = 1\n[sync]\nconcurrency = 0\n";
        std::fs::write(manager.config_path(), content).unwrap();

        assert!(matches!(manager.load(), Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_output_default_rejected() {
        let (manager, _temp_dir) = temp_config_manager();

        let content = "schema_version = 1\n[defaults]\noutput = \"jsn\"\n";
        std::fs::write(manager.config_path(), content).unwrap();

        let err = manager.load().unwrap_err();
        assert!(matches!(&err, Error::Config(message) if message.contains("jsn")));
    }

    #[test]
    fn test_color_defaults() {
        let mut config = Config::default();
        for color in ["auto", "always", "never"] {
            config.defaults.color = color.to_string();
            assert!(config.validate().is_ok());
        }
        config.defaults.color = "sometimes".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_profile_lookup() {
        let mut config = Config::default();
        config.profiles.push(Profile::new("default", "a", "b"));
        config.profiles.push(Profile::new("archive", "c", "d"));

        assert_eq!(config.profile(None).unwrap().name, "default");
        assert_eq!(config.profile(Some("archive")).unwrap().access_key, "c");
        assert!(matches!(
            config.profile(Some("missing")),
            Err(Error::ProfileNotFound(_))
        ));
    }
}
