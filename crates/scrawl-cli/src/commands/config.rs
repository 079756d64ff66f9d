//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use scrawl_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "server_url": config.server_url,
                    "debounce_ms": config.debounce_ms,
                    "max_reconnect_attempts": config.max_reconnect_attempts,
                    "initial_reconnect_delay_ms": config.initial_reconnect_delay_ms,
                    "max_reconnect_delay_ms": config.max_reconnect_delay_ms
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.server_url.as_deref().unwrap_or(""));
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!(
                "  server_url:                 {}",
                config.server_url.as_deref().unwrap_or("(not set)")
            );
            println!("  debounce_ms:                {}", config.debounce_ms);
            println!(
                "  max_reconnect_attempts:     {}",
                config.max_reconnect_attempts
            );
            println!(
                "  initial_reconnect_delay_ms: {}",
                config.initial_reconnect_delay_ms
            );
            println!(
                "  max_reconnect_delay_ms:     {}",
                config.max_reconnect_delay_ms
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match key.as_str() {
        "server_url" => {
            config.server_url = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.clone())
            };
        }
        "debounce_ms" => {
            config.debounce_ms = value
                .parse()
                .context("Invalid value for debounce_ms. Use a number of milliseconds.")?;
        }
        "max_reconnect_attempts" => {
            config.max_reconnect_attempts = value
                .parse()
                .context("Invalid value for max_reconnect_attempts. Use a number.")?;
        }
        "initial_reconnect_delay_ms" => {
            config.initial_reconnect_delay_ms = value.parse().context(
                "Invalid value for initial_reconnect_delay_ms. Use a number of milliseconds.",
            )?;
        }
        "max_reconnect_delay_ms" => {
            config.max_reconnect_delay_ms = value.parse().context(
                "Invalid value for max_reconnect_delay_ms. Use a number of milliseconds.",
            )?;
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: server_url, debounce_ms, max_reconnect_attempts, \
                 initial_reconnect_delay_ms, max_reconnect_delay_ms",
                key
            );
        }
    }

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;

    #[test]
    fn test_set_and_show_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let output = Output::new(OutputFormat::Quiet);

        set(
            "server_url".to_string(),
            "ws://localhost:3030".to_string(),
            Some(&path),
            &output,
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.server_url.as_deref(), Some("ws://localhost:3030"));
    }

    #[test]
    fn test_set_rejects_unknown_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let output = Output::new(OutputFormat::Quiet);

        let result = set(
            "sync_interval".to_string(),
            "10".to_string(),
            Some(&path),
            &output,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_set_none_clears_url() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let output = Output::new(OutputFormat::Quiet);

        set(
            "server_url".to_string(),
            "ws://localhost:3030".to_string(),
            Some(&path),
            &output,
        )
        .unwrap();
        set("server_url".to_string(), "none".to_string(), Some(&path), &output).unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert!(config.server_url.is_none());
    }
}
