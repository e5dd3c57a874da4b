//! Configuration file parser for ~/.config/feedsync/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as possible typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::{PollPolicy, SyncSettings};
use crate::icon::IconSettings;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid config value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

// ============================================================================
// Configuration Struct
// ============================================================================

/// Engine configuration.
///
/// Every field has a default, so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file; defaults to `feeds.db` next to the config file
    pub database_path: Option<PathBuf>,

    /// Delay between the end of one pass and the start of the next
    pub pass_interval_ms: u64,

    pub startup_delay_ms: u64,

    pub fetch_timeout_secs: u64,

    pub icon_timeout_secs: u64,

    /// Feed bodies larger than this are treated as a fetch failure
    pub max_feed_bytes: usize,

    pub poll_interval_min_ms: i64,

    pub poll_interval_max_ms: i64,

    pub backoff_factor: f64,

    /// Favicon service URL template containing `{domain}`
    pub icon_service_url: String,

    /// Directory of `<domain>.png` / `<domain>.ico` overrides
    pub icon_dir: Option<PathBuf>,

    /// Allow feeds on loopback and private networks
    pub allow_private_hosts: bool,

    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            pass_interval_ms: 5_000,
            startup_delay_ms: 1_000,
            fetch_timeout_secs: 30,
            icon_timeout_secs: 10,
            max_feed_bytes: 10 * 1024 * 1024,
            poll_interval_min_ms: PollPolicy::DEFAULT_MIN_MS,
            poll_interval_max_ms: PollPolicy::DEFAULT_MAX_MS,
            backoff_factor: PollPolicy::DEFAULT_BACKOFF,
            icon_service_url: IconSettings::default().service_url,
            icon_dir: None,
            allow_private_hosts: false,
            user_agent: format!("feedsync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB)
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 13] = [
        "database_path",
        "pass_interval_ms",
        "startup_delay_ms",
        "fetch_timeout_secs",
        "icon_timeout_secs",
        "max_feed_bytes",
        "poll_interval_min_ms",
        "poll_interval_max_ms",
        "backoff_factor",
        "icon_service_url",
        "icon_dir",
        "allow_private_hosts",
        "user_agent",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Out-of-range values → `Err(ConfigError::Invalid)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Size check before reading
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        let config = Self::from_toml(&content)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_min_ms <= 0 {
            return Err(ConfigError::Invalid {
                key: "poll_interval_min_ms",
                reason: "must be positive".to_string(),
            });
        }
        if self.poll_interval_max_ms < self.poll_interval_min_ms {
            return Err(ConfigError::Invalid {
                key: "poll_interval_max_ms",
                reason: format!(
                    "{} is below poll_interval_min_ms ({})",
                    self.poll_interval_max_ms, self.poll_interval_min_ms
                ),
            });
        }
        if !(self.backoff_factor > 1.0 && self.backoff_factor.is_finite()) {
            return Err(ConfigError::Invalid {
                key: "backoff_factor",
                reason: format!("{} must be a finite number above 1.0", self.backoff_factor),
            });
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "fetch_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.icon_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "icon_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.icon_service_url.contains("{domain}") {
            return Err(ConfigError::Invalid {
                key: "icon_service_url",
                reason: "must contain the {domain} placeholder".to_string(),
            });
        }
        Ok(())
    }

    /// Database file, falling back to `feeds.db` in `config_dir`
    pub fn database_path(&self, config_dir: &Path) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| config_dir.join("feeds.db"))
    }

    pub fn pass_interval(&self) -> Duration {
        Duration::from_millis(self.pass_interval_ms)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            min_ms: self.poll_interval_min_ms,
            max_ms: self.poll_interval_max_ms,
            backoff: self.backoff_factor,
        }
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            policy: self.poll_policy(),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            max_feed_bytes: self.max_feed_bytes,
            allow_private_hosts: self.allow_private_hosts,
        }
    }

    pub fn icon_settings(&self) -> IconSettings {
        IconSettings {
            service_url: self.icon_service_url.clone(),
            timeout: Duration::from_secs(self.icon_timeout_secs),
            icon_dir: self.icon_dir.clone(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_config(name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("feedsync_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.pass_interval_ms, 5_000);
        assert_eq!(config.startup_delay_ms, 1_000);
        assert_eq!(config.poll_policy(), PollPolicy::default());
        assert!(!config.allow_private_hosts);
        assert!(config.user_agent.starts_with("feedsync/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feedsync_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_empty_file_returns_default() {
        let (dir, path) = write_config("empty", "  \n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config, Config::default());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let (dir, path) = write_config("partial", "pass_interval_ms = 20000\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.pass_interval(), Duration::from_secs(20));
        assert_eq!(config.fetch_timeout_secs, 30);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r#"
database_path = "/var/lib/feedsync/feeds.db"
pass_interval_ms = 10000
startup_delay_ms = 0
fetch_timeout_secs = 15
icon_timeout_secs = 5
max_feed_bytes = 1048576
poll_interval_min_ms = 30000
poll_interval_max_ms = 3600000
backoff_factor = 1.5
icon_service_url = "https://icons.example.com/{domain}.ico"
icon_dir = "/srv/icons"
allow_private_hosts = true
user_agent = "custom/1.0"
"#;
        let (dir, path) = write_config("full", content);
        let config = Config::load(&path).unwrap();

        assert_eq!(
            config.database_path(Path::new("/ignored")),
            PathBuf::from("/var/lib/feedsync/feeds.db")
        );
        assert_eq!(config.startup_delay(), Duration::ZERO);
        assert_eq!(
            config.poll_policy(),
            PollPolicy {
                min_ms: 30_000,
                max_ms: 3_600_000,
                backoff: 1.5
            }
        );
        let sync = config.sync_settings();
        assert_eq!(sync.fetch_timeout, Duration::from_secs(15));
        assert_eq!(sync.max_feed_bytes, 1_048_576);
        assert!(sync.allow_private_hosts);
        let icons = config.icon_settings();
        assert_eq!(icons.timeout, Duration::from_secs(5));
        assert_eq!(icons.icon_dir, Some(PathBuf::from("/srv/icons")));
        assert_eq!(config.user_agent, "custom/1.0");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_default_database_path() {
        let config = Config::default();
        assert_eq!(
            config.database_path(Path::new("/home/u/.config/feedsync")),
            PathBuf::from("/home/u/.config/feedsync/feeds.db")
        );
    }

    #[test]
    fn test_invalid_toml_returns_parse_error() {
        let (dir, path) = write_config("invalid", "pass_interval_ms = [unclosed");
        let result = Config::load(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_parse_error() {
        let result = Config::from_toml("pass_interval_ms = \"soon\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::from_toml("pass_interval_ms = 7000\ntheme = \"dark\"\n").unwrap();
        assert_eq!(config.pass_interval_ms, 7_000);
    }

    #[test]
    fn test_interval_bounds_validated() {
        let result = Config::from_toml("poll_interval_min_ms = 0");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { key: "poll_interval_min_ms", .. })
        ));

        let result = Config::from_toml("poll_interval_min_ms = 9000\npoll_interval_max_ms = 1000");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { key: "poll_interval_max_ms", .. })
        ));
    }

    #[test]
    fn test_backoff_factor_validated() {
        for bad in ["1.0", "0.5", "-2.0", "nan", "inf"] {
            let result = Config::from_toml(&format!("backoff_factor = {bad}"));
            assert!(
                matches!(result, Err(ConfigError::Invalid { key: "backoff_factor", .. })),
                "backoff_factor = {bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_icon_service_needs_placeholder() {
        let result = Config::from_toml("icon_service_url = \"https://icons.example.com/\"");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { key: "icon_service_url", .. })
        ));
    }

    #[test]
    fn test_oversized_file_rejected() {
        let (dir, path) = write_config("large", &"#".repeat(1_048_577));
        let result = Config::load(&path);
        assert!(matches!(result, Err(ConfigError::TooLarge(_))));
        std::fs::remove_dir_all(&dir).ok();
    }
}
