//! Config command - inspect and edit the OrderSync configuration
//!
//! `show` prints the effective configuration, `set` edits one dotted key and
//! saves the file, `validate` reports every problem, and `path` prints where
//! the file is read from.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use ordersync_core::config::Config;

use crate::output::{get_formatter, OutputFormat};

/// Keys accepted by `config set`, with a short hint each
const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("sync.quick_interval_secs", "Seconds between invoice-only passes"),
    ("sync.full_interval_secs", "Seconds between full passes"),
    ("sync.debounce_ms", "Change notification debounce window"),
    ("sync.auto_delete", "true|false"),
    ("courier.partner", "Delivery partner name"),
    ("courier.base_url", "Courier API base URL"),
    ("courier.timeout_secs", "Per-request timeout"),
    ("store.database_path", "SQLite database file"),
    ("logging.level", "trace|debug|info|warn|error"),
    ("logging.format", "pretty|json"),
];

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Set a configuration value
    Set {
        /// Dotted key, e.g. "sync.quick_interval_secs"
        key: String,
        /// New value
        value: String,
    },
    /// Validate the configuration file
    Validate,
    /// Print the configuration file location
    Path,
}

impl ConfigCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(config_path, format),
            ConfigCommand::Set { key, value } => execute_set(config_path, key, value, format),
            ConfigCommand::Validate => execute_validate(config_path, format),
            ConfigCommand::Path => {
                let formatter = get_formatter(format);
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "config_path": config_path.display().to_string(),
                        "exists": config_path.exists(),
                    }));
                } else {
                    formatter.info(&config_path.display().to_string());
                }
                Ok(())
            }
        }
    }
}

fn execute_show(config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let config = Config::load_or_default(config_path);

    info!(config_path = %config_path.display(), "Showing configuration");

    if format.is_json() {
        let json = serde_json::to_value(&config).context("Failed to serialize configuration")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", config_path.display()));
        let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }
    Ok(())
}

fn execute_set(config_path: &Path, key: &str, value: &str, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let mut config = Config::load_or_default(config_path);

    info!(key = %key, value = %value, "Setting configuration value");

    if let Err(e) = apply_config_value(&mut config, key, value) {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "value": value,
                "error": e.to_string(),
            }));
        } else {
            formatter.error(&format!("Failed to set '{key}': {e}"));
            formatter.info("Supported keys:");
            for (name, hint) in SUPPORTED_KEYS {
                formatter.info(&format!("  {name:<28}{hint}"));
            }
        }
        return Ok(());
    }

    let errors: Vec<String> = config.validate().iter().map(ToString::to_string).collect();
    if !errors.is_empty() {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "value": value,
                "errors": errors,
            }));
        } else {
            formatter.error(&format!("Invalid value for '{key}': {}", errors.join("; ")));
        }
        return Ok(());
    }

    save_config(&config, config_path)?;

    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "success": true,
            "key": key,
            "value": value,
            "config_path": config_path.display().to_string(),
        }));
    } else {
        formatter.success(&format!("Set {key} = {value}"));
        formatter.info(&format!("Saved to {}", config_path.display()));
    }
    Ok(())
}

fn execute_validate(config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    if !config_path.exists() {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "errors": [],
                "defaults": true,
            }));
        } else {
            formatter.success("No configuration file, defaults apply");
            formatter.info(&format!("Expected at {}", config_path.display()));
        }
        return Ok(());
    }

    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": [format!("Failed to parse configuration: {e}")],
                }));
            } else {
                formatter.error(&format!("Failed to parse configuration: {e}"));
                formatter.info(&format!("File: {}", config_path.display()));
            }
            return Ok(());
        }
    };

    info!(config_path = %config_path.display(), "Validating configuration");
    let errors = config.validate();

    if format.is_json() {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": config_path.display().to_string(),
            "errors": messages,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", config_path.display()));
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }
    Ok(())
}

/// Writes `config` as YAML, creating the parent directory
fn save_config(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
    }
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    std::fs::write(path, yaml).context("Failed to write configuration file")
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse::<T>()
        .with_context(|| format!("Expected a non-negative integer for {key}"))
}

/// Applies one dotted key to `config`; see [`SUPPORTED_KEYS`]
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "sync.quick_interval_secs" => config.sync.quick_interval_secs = parse_number(key, value)?,
        "sync.full_interval_secs" => config.sync.full_interval_secs = parse_number(key, value)?,
        "sync.debounce_ms" => config.sync.debounce_ms = parse_number(key, value)?,
        "sync.auto_delete" => {
            config.sync.auto_delete = value
                .parse::<bool>()
                .context("Expected true or false for sync.auto_delete")?;
        }
        "courier.partner" => config.courier.partner = value.to_string(),
        "courier.base_url" => config.courier.base_url = value.to_string(),
        "courier.timeout_secs" => config.courier.timeout_secs = parse_number(key, value)?,
        "store.database_path" => config.store.database_path = PathBuf::from(value),
        "logging.level" => config.logging.level = value.to_string(),
        "logging.format" => config.logging.format = value.to_string(),
        _ => anyhow::bail!("Unknown configuration key: '{key}'"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_intervals() {
        let mut config = Config::default();
        apply_config_value(&mut config, "sync.quick_interval_secs", "60").unwrap();
        apply_config_value(&mut config, "sync.full_interval_secs", "1800").unwrap();
        assert_eq!(config.sync.quick_interval_secs, 60);
        assert_eq!(config.sync.full_interval_secs, 1800);
    }

    #[test]
    fn test_apply_auto_delete() {
        let mut config = Config::default();
        apply_config_value(&mut config, "sync.auto_delete", "false").unwrap();
        assert!(!config.sync.auto_delete);
        assert!(apply_config_value(&mut config, "sync.auto_delete", "maybe").is_err());
    }

    #[test]
    fn test_apply_courier_and_store() {
        let mut config = Config::default();
        apply_config_value(&mut config, "courier.base_url", "http://localhost:8080").unwrap();
        apply_config_value(&mut config, "courier.timeout_secs", "30").unwrap();
        apply_config_value(&mut config, "store.database_path", "/var/lib/ordersync/orders.db")
            .unwrap();

        assert_eq!(config.courier.base_url, "http://localhost:8080");
        assert_eq!(config.courier.timeout_secs, 30);
        assert_eq!(
            config.store.database_path,
            PathBuf::from("/var/lib/ordersync/orders.db")
        );
    }

    #[test]
    fn test_apply_rejects_non_numeric_interval() {
        let mut config = Config::default();
        let err = apply_config_value(&mut config, "sync.debounce_ms", "soon").unwrap_err();
        assert!(err.to_string().contains("sync.debounce_ms"));
    }

    #[test]
    fn test_apply_unknown_key() {
        let mut config = Config::default();
        let err = apply_config_value(&mut config, "sync.root", "/tmp").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
    }

    #[test]
    fn test_every_supported_key_is_applicable() {
        let samples = [
            "5", "900", "300", "true", "alwaseet", "http://x", "10", "/tmp/o.db", "debug", "json",
        ];
        let mut config = Config::default();
        for ((key, _), value) in SUPPORTED_KEYS.iter().zip(samples) {
            apply_config_value(&mut config, key, value).unwrap();
        }
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_save_config_round_trips_through_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let mut config = Config::default();
        config.sync.debounce_ms = 750;

        save_config(&config, &path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.sync.debounce_ms, 750);
    }
}
