//! # Sync Configuration
//!
//! Configuration management for the sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     SUPABASE_URL / SUPABASE_KEY                                        │
//! │     MILKRECORD_SYNC_INTERVAL_SECS=10                                   │
//! │     MILKRECORD_DB_PATH=/var/lib/milkrecord/milkrecord.db               │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/pos/sync.toml (Linux)                                    │
//! │     ~/Library/Application Support/com.milkrecord.pos/sync.toml (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     10s interval, batch of 100, 3s probe, 30s remote timeout           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The device id is deliberately absent: it lives in the local database so
//! it survives config edits and is never regenerated while the store exists.
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [device]
//! name = "Counter 1"
//!
//! [sync]
//! interval_secs = 10
//! batch_size = 100
//! push_on_write = true
//! push_timeout_secs = 5
//!
//! [connectivity]
//! probe_url = "https://www.google.com/generate_204"
//! probe_timeout_secs = 3
//!
//! [remote]
//! url = "https://project.supabase.co"
//! api_key = "..."
//! timeout_secs = 30
//!
//! [database]
//! path = "/var/lib/milkrecord/milkrecord.db"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};

/// Hard ceiling for the connectivity probe.
pub const MAX_PROBE_TIMEOUT_SECS: u64 = 3;

// =============================================================================
// Device Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Human-readable device name (e.g., "Counter 1", "Collection Centre").
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn default_device_name() -> String {
    "MilkRecord POS".to_string()
}

impl Default for DeviceSettings {
    fn default() -> Self {
        DeviceSettings {
            name: default_device_name(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Sync loop and write path behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Seconds between sync passes. Every pass is a retry; there is no backoff.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Maximum records pushed per table per pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Push immediately after a local save when online.
    #[serde(default = "default_true")]
    pub push_on_write: bool,

    /// Upper bound for the push-on-write attempt (seconds).
    #[serde(default = "default_push_timeout")]
    pub push_timeout_secs: u64,
}

fn default_interval() -> u64 {
    10
}
fn default_batch_size() -> u32 {
    100
}
fn default_true() -> bool {
    true
}
fn default_push_timeout() -> u64 {
    5
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            interval_secs: default_interval(),
            batch_size: default_batch_size(),
            push_on_write: true,
            push_timeout_secs: default_push_timeout(),
        }
    }
}

// =============================================================================
// Connectivity Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivitySettings {
    /// URL fetched to decide whether the internet is reachable.
    #[serde(default = "default_probe_url")]
    pub probe_url: String,

    /// Probe timeout (seconds), at most [`MAX_PROBE_TIMEOUT_SECS`].
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_probe_url() -> String {
    "https://www.google.com/generate_204".to_string()
}
fn default_probe_timeout() -> u64 {
    MAX_PROBE_TIMEOUT_SECS
}

impl Default for ConnectivitySettings {
    fn default() -> Self {
        ConnectivitySettings {
            probe_url: default_probe_url(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

// =============================================================================
// Remote Settings
// =============================================================================

/// Remote store (Supabase) connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Project URL, e.g. `https://project.supabase.co`.
    #[serde(default)]
    pub url: Option<String>,

    /// API key sent as `apikey` and bearer token.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Deadline for every remote call (seconds).
    #[serde(default = "default_remote_timeout")]
    pub timeout_secs: u64,
}

fn default_remote_timeout() -> u64 {
    30
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            url: None,
            api_key: None,
            timeout_secs: default_remote_timeout(),
        }
    }
}

impl RemoteSettings {
    /// Both url and key are present.
    pub fn is_configured(&self) -> bool {
        self.url.is_some() && self.api_key.is_some()
    }
}

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Local SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub device: DeviceSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub connectivity: ConnectivitySettings,

    #[serde(default)]
    pub remote: RemoteSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl SyncConfig {
    /// Creates a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();

        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.sync.interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "interval_secs must be greater than 0".into(),
            ));
        }

        if self.sync.batch_size == 0 {
            return Err(SyncError::InvalidConfig(
                "batch_size must be greater than 0".into(),
            ));
        }

        if self.sync.push_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "push_timeout_secs must be greater than 0".into(),
            ));
        }

        if !(1..=MAX_PROBE_TIMEOUT_SECS).contains(&self.connectivity.probe_timeout_secs) {
            return Err(SyncError::InvalidConfig(format!(
                "probe_timeout_secs must be between 1 and {}",
                MAX_PROBE_TIMEOUT_SECS
            )));
        }

        if self.remote.timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "remote timeout_secs must be greater than 0".into(),
            ));
        }

        parse_http_url(&self.connectivity.probe_url)?;

        if let Some(ref url) = self.remote.url {
            parse_http_url(url)?;
        }

        if self.remote.url.is_some() != self.remote.api_key.is_some() {
            return Err(SyncError::InvalidConfig(
                "remote url and api_key must be set together".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup.
    ///
    /// Unparseable numeric values are ignored with a warning.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(name) = lookup("MILKRECORD_DEVICE_NAME") {
            self.device.name = name;
        }

        if let Some(secs) = parse_override(&lookup, "MILKRECORD_SYNC_INTERVAL_SECS") {
            debug!(interval_secs = secs, "Overriding sync interval from environment");
            self.sync.interval_secs = secs;
        }

        if let Some(size) = parse_override(&lookup, "MILKRECORD_BATCH_SIZE") {
            self.sync.batch_size = size;
        }

        if let Some(enabled) = parse_override(&lookup, "MILKRECORD_PUSH_ON_WRITE") {
            self.sync.push_on_write = enabled;
        }

        if let Some(url) = lookup("MILKRECORD_PROBE_URL") {
            self.connectivity.probe_url = url;
        }

        let remote_url = lookup("MILKRECORD_REMOTE_URL").or_else(|| lookup("SUPABASE_URL"));
        if let Some(url) = remote_url {
            debug!(url = %url, "Overriding remote URL from environment");
            self.remote.url = Some(url);
        }

        let remote_key = lookup("MILKRECORD_REMOTE_KEY").or_else(|| lookup("SUPABASE_KEY"));
        if let Some(key) = remote_key {
            self.remote.api_key = Some(key);
        }

        if let Some(secs) = parse_override(&lookup, "MILKRECORD_REMOTE_TIMEOUT_SECS") {
            self.remote.timeout_secs = secs;
        }

        if let Some(path) = lookup("MILKRECORD_DB_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "milkrecord", "pos")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Local database file: configured path, else the platform data dir.
    pub fn database_path(&self) -> PathBuf {
        self.database.path.clone().unwrap_or_else(|| {
            directories::ProjectDirs::from("com", "milkrecord", "pos")
                .map(|dirs| dirs.data_dir().join("milkrecord.db"))
                .unwrap_or_else(|| PathBuf::from("milkrecord.db"))
        })
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.push_timeout_secs)
    }

    /// Probe timeout, clamped to [`MAX_PROBE_TIMEOUT_SECS`].
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(
            self.connectivity
                .probe_timeout_secs
                .min(MAX_PROBE_TIMEOUT_SECS),
        )
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout_secs)
    }
}

fn parse_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable config override");
            None
        }
    }
}

/// Parses a URL and requires an http(s) scheme.
pub(crate) fn parse_http_url(raw: &str) -> SyncResult<Url> {
    let url = Url::parse(raw.trim())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(SyncError::InvalidUrl(format!(
            "URL must use http:// or https://, got {}://",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.interval(), Duration::from_secs(10));
        assert_eq!(config.sync.batch_size, 100);
        assert_eq!(config.probe_timeout(), Duration::from_secs(3));
        assert_eq!(config.remote_timeout(), Duration::from_secs(30));
        assert!(config.sync.push_on_write);
        assert!(!config.remote.is_configured());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();

        config.sync.batch_size = 0;
        assert!(config.validate().is_err());
        config.sync.batch_size = 10;

        config.connectivity.probe_timeout_secs = 10;
        assert!(config.validate().is_err());
        config.connectivity.probe_timeout_secs = 2;

        config.remote.url = Some("ftp://project.supabase.co".into());
        config.remote.api_key = Some("key".into());
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        config.remote.url = Some("https://project.supabase.co".into());
        assert!(config.validate().is_ok());

        config.remote.api_key = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = SyncConfig::default();
        config.apply_overrides(lookup_from(&[
            ("SUPABASE_URL", "https://project.supabase.co"),
            ("SUPABASE_KEY", "anon"),
            ("MILKRECORD_SYNC_INTERVAL_SECS", "30"),
            ("MILKRECORD_BATCH_SIZE", "not-a-number"),
            ("MILKRECORD_PUSH_ON_WRITE", "false"),
            ("MILKRECORD_DB_PATH", "/tmp/mr.db"),
        ]));

        assert_eq!(config.remote.url.as_deref(), Some("https://project.supabase.co"));
        assert!(config.remote.is_configured());
        assert_eq!(config.sync.interval_secs, 30);
        assert_eq!(config.sync.batch_size, 100);
        assert!(!config.sync.push_on_write);
        assert_eq!(config.database_path(), PathBuf::from("/tmp/mr.db"));
    }

    #[test]
    fn test_milkrecord_remote_vars_win_over_supabase_vars() {
        let mut config = SyncConfig::default();
        config.apply_overrides(lookup_from(&[
            ("SUPABASE_URL", "https://old.supabase.co"),
            ("MILKRECORD_REMOTE_URL", "https://new.supabase.co"),
        ]));
        assert_eq!(config.remote.url.as_deref(), Some("https://new.supabase.co"));
    }

    #[test]
    fn test_toml_round_trip() {
        let toml_str = r#"
            [sync]
            interval_secs = 15

            [remote]
            url = "https://project.supabase.co"
            api_key = "anon"
        "#;
        let config: SyncConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.sync.interval_secs, 15);
        assert_eq!(config.sync.batch_size, 100);
        assert!(config.validate().is_ok());

        let rendered = toml::to_string_pretty(&config).unwrap();
        assert!(rendered.contains("[connectivity]"));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("milkrecord-sync-{}.toml", uuid::Uuid::new_v4()));

        let mut config = SyncConfig::default();
        config.device.name = "Counter 2".into();
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let loaded: SyncConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.device.name, "Counter 2");

        std::fs::remove_file(path).unwrap();
    }
}
