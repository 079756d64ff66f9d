//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/scrawl/config.toml)
//! 3. Environment variables (SCRAWL_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable prefix
const ENV_PREFIX: &str = "SCRAWL";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Sync server URL (optional)
    #[serde(default)]
    pub server_url: Option<String>,

    /// Debounce window for local edits, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Reconnect attempts before giving up
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Delay before the first reconnect attempt, in milliseconds
    #[serde(default = "default_initial_reconnect_delay_ms")]
    pub initial_reconnect_delay_ms: u64,

    /// Backoff cap, in milliseconds
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: None,
            debounce_ms: default_debounce_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            initial_reconnect_delay_ms: default_initial_reconnect_delay_ms(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (SCRAWL_SERVER_URL, SCRAWL_DEBOUNCE_MS)
    /// 2. Config file (~/.config/scrawl/config.toml or SCRAWL_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration, preferring a CLI-provided path
    ///
    /// Order of precedence for the file location:
    /// 1. CLI-provided path
    /// 2. SCRAWL_CONFIG environment variable
    /// 3. Default location
    pub fn load_with_cli_override(cli_path: Option<&PathBuf>) -> Result<Self> {
        match cli_path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // SCRAWL_SERVER_URL
        if let Ok(val) = std::env::var(format!("{}_SERVER_URL", ENV_PREFIX)) {
            self.server_url = if val.is_empty() { None } else { Some(val) };
        }

        // SCRAWL_DEBOUNCE_MS
        if let Ok(val) = std::env::var(format!("{}_DEBOUNCE_MS", ENV_PREFIX)) {
            if let Ok(ms) = val.parse() {
                self.debounce_ms = ms;
            }
        }

        // SCRAWL_MAX_RECONNECT_ATTEMPTS
        if let Ok(val) = std::env::var(format!("{}_MAX_RECONNECT_ATTEMPTS", ENV_PREFIX)) {
            if let Ok(n) = val.parse() {
                self.max_reconnect_attempts = n;
            }
        }
    }

    /// Save configuration to the default file location
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with SCRAWL_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scrawl")
            .join("config.toml")
    }
}

fn default_debounce_ms() -> u64 {
    2000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_initial_reconnect_delay_ms() -> u64 {
    1000
}

fn default_max_reconnect_delay_ms() -> u64 {
    30_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap();
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            // Clear all the vars
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "SCRAWL_SERVER_URL",
        "SCRAWL_DEBOUNCE_MS",
        "SCRAWL_MAX_RECONNECT_ATTEMPTS",
    ];

    #[test]
    fn test_default_config() {
        let _guard = EnvGuard::new(ENV_VARS);
        let config = Config::default();

        assert!(config.server_url.is_none());
        assert_eq!(config.debounce_ms, 2000);
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.initial_reconnect_delay_ms, 1000);
        assert_eq!(config.max_reconnect_delay_ms, 30_000);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);
        let config = Config::load_from_str(
            r#"
            server_url = "ws://example.com:3030"
            debounce_ms = 500
            "#,
        )
        .unwrap();

        assert_eq!(config.server_url.as_deref(), Some("ws://example.com:3030"));
        assert_eq!(config.debounce_ms, 500);
        // Unspecified keys fall back to defaults
        assert_eq!(config.max_reconnect_attempts, 5);
    }

    #[test]
    fn test_env_overrides() {
        let _guard = EnvGuard::new(ENV_VARS);
        env::set_var("SCRAWL_SERVER_URL", "ws://env-server:3030");
        env::set_var("SCRAWL_DEBOUNCE_MS", "250");

        let config = Config::load_from_str(r#"server_url = "ws://file-server:3030""#).unwrap();

        assert_eq!(config.server_url.as_deref(), Some("ws://env-server:3030"));
        assert_eq!(config.debounce_ms, 250);
    }

    #[test]
    fn test_empty_env_url_clears_value() {
        let _guard = EnvGuard::new(ENV_VARS);
        env::set_var("SCRAWL_SERVER_URL", "");

        let config = Config::load_from_str(r#"server_url = "ws://file-server:3030""#).unwrap();
        assert!(config.server_url.is_none());
    }

    #[test]
    fn test_load_from_missing_path_uses_defaults() {
        let _guard = EnvGuard::new(ENV_VARS);
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("does-not-exist.toml");

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.debounce_ms, 2000);
    }

    #[test]
    fn test_save_and_reload() {
        let _guard = EnvGuard::new(ENV_VARS);
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.server_url = Some("ws://saved:3030".to_string());
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.server_url.as_deref(), Some("ws://saved:3030"));
    }

    #[test]
    fn test_load_from_path() {
        let _guard = EnvGuard::new(ENV_VARS);
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_reconnect_attempts = 2\n").unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.max_reconnect_attempts, 2);
    }
}
