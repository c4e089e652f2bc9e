//! Configuration management
//!
//! Host entries name an S3-compatible endpoint together with its
//! credentials. They are stored in TOML format at
//! ~/.config/bucketfs/hosts.toml and handed to the client factory.
//!
//! Changes to schema_version require migration support.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Current configuration schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Signature version 4
pub const SIGNATURE_V4: &str = "S3v4";

/// Signature version 2
pub const SIGNATURE_V2: &str = "S3v2";

/// Connection details for one S3-compatible endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Unique name for this host
    pub alias: String,

    /// Target URL, e.g. `https://play.min.io` or `https://bucket.s3.amazonaws.com`
    pub url: String,

    /// Access key ID
    pub access_key: String,

    /// Secret access key
    pub secret_key: String,

    /// Signature version: "S3v4" or "S3v2"
    #[serde(default = "default_signature")]
    pub signature: String,

    /// Region used for signing
    #[serde(default = "default_region")]
    pub region: String,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure: bool,

    /// Trace requests
    #[serde(default)]
    pub debug: bool,

    /// Application name reported to the backend
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Application version reported to the backend
    #[serde(default = "default_app_version")]
    pub app_version: String,
}

fn default_signature() -> String {
    SIGNATURE_V4.to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_app_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl HostConfig {
    /// Create a host entry with required fields
    pub fn new(
        alias: impl Into<String>,
        url: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            alias: alias.into(),
            url: url.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            signature: default_signature(),
            region: default_region(),
            insecure: false,
            debug: false,
            app_name: default_app_name(),
            app_version: default_app_version(),
        }
    }

    /// Whether the entry asks for signature version 2
    pub fn is_signature_v2(&self) -> bool {
        self.signature.eq_ignore_ascii_case(SIGNATURE_V2)
    }
}

/// Contents of the hosts file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema version for migration support
    pub schema_version: u32,

    /// Configured hosts
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            hosts: Vec::new(),
        }
    }
}

impl Config {
    /// Look up a host entry by alias
    pub fn host(&self, alias: &str) -> Result<&HostConfig> {
        self.hosts
            .iter()
            .find(|h| h.alias == alias)
            .ok_or_else(|| Error::Config(format!("Host '{alias}' is not configured")))
    }

    /// Add or replace a host entry
    pub fn set_host(&mut self, host: HostConfig) {
        self.hosts.retain(|h| h.alias != host.alias);
        self.hosts.push(host);
    }
}

/// Configuration manager handles loading and saving the hosts file
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the default config path
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".into()))?;
        let config_path = config_dir.join("bucketfs").join("hosts.toml");
        Ok(Self { config_path })
    }

    /// Create a ConfigManager with a custom path (useful for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load configuration from disk
    ///
    /// A missing file yields the default configuration. Older schema
    /// versions are migrated, newer ones rejected.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        if config.schema_version < SCHEMA_VERSION {
            config = self.migrate(config);
        } else if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is newer than supported version {}",
                config.schema_version, SCHEMA_VERSION
            )));
        }

        tracing::debug!(path = %self.config_path.display(), hosts = config.hosts.len(), "loaded hosts file");
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

    fn migrate(&self, mut config: Config) -> Config {
        tracing::debug!(from = config.schema_version, to = SCHEMA_VERSION, "migrating hosts file");
        config.schema_version = SCHEMA_VERSION;
        config
    }
}
