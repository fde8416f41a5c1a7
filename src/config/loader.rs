//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::{AppConfig, SourceKind};
use crate::domain::oracle::PerformanceIndex;

/// Environment variable overriding the config file path.
pub const CONFIG_PATH_ENV: &str = "PORT_EXCHANGE_CONFIG";

/// Config file path: `PORT_EXCHANGE_CONFIG` or `config.toml`.
pub fn config_path() -> String {
  std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config.toml".to_string())
}

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    ports = config.feed.ports.len(),
    interval_secs = config.feed.interval_seconds,
    source = ?config.source.kind,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig = toml::from_str(content).context("Failed to parse config.toml")?;
  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - A positive cycle interval
/// - Non-empty, well-formed, unique port codes
/// - Base performances within the index range
/// - A usable source definition
/// - Parseable owner and bind addresses
fn validate_config(config: &AppConfig) -> Result<()> {
  // Feed validation
  anyhow::ensure!(
    config.feed.interval_seconds > 0,
    "feed.interval_seconds must be positive"
  );
  anyhow::ensure!(
    !config.feed.ports.is_empty(),
    "At least one port must be tracked"
  );

  let codes = config.port_codes()?;
  let mut seen = HashSet::new();
  for code in &codes {
    anyhow::ensure!(seen.insert(code.clone()), "Port {} is listed twice", code);
  }

  for port in &config.feed.ports {
    if let Some(base) = port.base_performance {
      anyhow::ensure!(
        base <= PerformanceIndex::MAX,
        "Port {} base_performance must be <= {}, got {}",
        port.code,
        PerformanceIndex::MAX,
        base
      );
    }
  }

  // Source validation
  anyhow::ensure!(
    config.source.timeout_ms > 0,
    "source.timeout_ms must be positive"
  );
  anyhow::ensure!(
    config.source.max_requests_per_second > 0,
    "source.max_requests_per_second must be positive"
  );
  if config.source.kind == SourceKind::Http {
    anyhow::ensure!(
      config.source.url.as_deref().is_some_and(|u| !u.is_empty()),
      "source.url is required for the http source"
    );
  }

  // Oracle validation
  config.owner_address()?;

  // API validation
  config
    .api
    .bind_address
    .parse::<SocketAddr>()
    .with_context(|| format!("Invalid api.bind_address: {}", config.api.bind_address))?;

  Ok(())
}
