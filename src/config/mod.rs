//! Configuration Module - TOML-based Feed Service Configuration
//!
//! Loads and validates configuration from `config.toml` (path
//! overridable with `PORT_EXCHANGE_CONFIG`). Tracked ports, the data
//! source and the oracle owner are externalized here; nothing about
//! them is hardcoded in the domain layer.

pub mod loader;

use std::collections::HashMap;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::oracle::PortCode;
use crate::usecases::feed_service::TriggerPolicy;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Service identity and logging.
  #[serde(default)]
  pub service: ServiceConfig,
  /// Feed cycle schedule and tracked ports.
  #[serde(default)]
  pub feed: FeedConfig,
  /// External performance data source.
  #[serde(default)]
  pub source: SourceConfig,
  /// Oracle store ownership and persistence.
  #[serde(default)]
  pub oracle: OracleConfig,
  /// Admin HTTP server.
  #[serde(default)]
  pub api: ApiConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  #[serde(default = "default_service_name")]
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// Feed cycle configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
  /// Seconds between scheduled cycles.
  #[serde(default = "default_interval_seconds")]
  pub interval_seconds: u64,
  /// Behavior of manual triggers while a cycle runs.
  #[serde(default)]
  pub trigger_policy: TriggerPolicy,
  /// Tracked ports, published in this order.
  #[serde(default = "default_ports")]
  pub ports: Vec<PortConfig>,
}

/// One tracked port.
#[derive(Debug, Clone, Deserialize)]
pub struct PortConfig {
  /// Port code, e.g. `SINGAPORE`.
  pub code: String,
  /// Simulator base performance in basis points.
  pub base_performance: Option<u32>,
}

/// Which performance source to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
  #[default]
  Simulated,
  Http,
}

/// Performance source configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
  #[serde(default)]
  pub kind: SourceKind,
  /// Provider base URL (required for `http`).
  pub url: Option<String>,
  /// Request timeout in milliseconds.
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
  /// Request budget for the provider.
  #[serde(default = "default_max_rps")]
  pub max_requests_per_second: u32,
  /// Fixed simulator seed for reproducible runs.
  pub seed: Option<u64>,
}

/// Oracle store configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OracleConfig {
  /// Owner address; defaults to the feeder identity.
  pub owner: Option<String>,
  /// Directory for `oracle_state.json`; no persistence when unset.
  pub data_dir: Option<String>,
}

/// Admin server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Admin server bind address.
  #[serde(default = "default_bind_address")]
  pub bind_address: String,
  /// Serve `/metrics`.
  #[serde(default = "default_true")]
  pub metrics_enabled: bool,
}

impl AppConfig {
  /// Tracked port codes, in configured order.
  pub fn port_codes(&self) -> Result<Vec<PortCode>> {
    self
      .feed
      .ports
      .iter()
      .map(|p| PortCode::new(p.code.as_str()).with_context(|| format!("Invalid port code: {}", p.code)))
      .collect()
  }

  /// Simulator base performance per port (only ports that set one).
  pub fn base_performances(&self) -> Result<HashMap<PortCode, u32>> {
    let mut bases = HashMap::new();
    for port in &self.feed.ports {
      if let Some(base) = port.base_performance {
        let code = PortCode::new(port.code.as_str())
          .with_context(|| format!("Invalid port code: {}", port.code))?;
        bases.insert(code, base);
      }
    }
    Ok(bases)
  }

  /// Parsed oracle owner, if configured.
  pub fn owner_address(&self) -> Result<Option<Address>> {
    self
      .oracle
      .owner
      .as_deref()
      .map(|raw| {
        raw
          .trim()
          .parse::<Address>()
          .with_context(|| format!("Invalid oracle.owner address: {raw}"))
      })
      .transpose()
  }
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      name: default_service_name(),
      log_level: default_log_level(),
    }
  }
}

impl Default for FeedConfig {
  fn default() -> Self {
    Self {
      interval_seconds: default_interval_seconds(),
      trigger_policy: TriggerPolicy::default(),
      ports: default_ports(),
    }
  }
}

impl Default for SourceConfig {
  fn default() -> Self {
    Self {
      kind: SourceKind::default(),
      url: None,
      timeout_ms: default_timeout_ms(),
      max_requests_per_second: default_max_rps(),
      seed: None,
    }
  }
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      bind_address: default_bind_address(),
      metrics_enabled: true,
    }
  }
}

// Default value functions for serde

fn default_service_name() -> String {
  "port-oracle-feed".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_interval_seconds() -> u64 {
  600
}

fn default_ports() -> Vec<PortConfig> {
  [
    ("SINGAPORE", 7_500),
    ("DUBAI", 7_000),
    ("ROTTERDAM", 6_800),
    ("SHANGHAI", 7_200),
    ("LOS_ANGELES", 6_500),
  ]
  .into_iter()
  .map(|(code, base)| PortConfig {
    code: code.to_string(),
    base_performance: Some(base),
  })
  .collect()
}

fn default_timeout_ms() -> u64 {
  5_000
}

fn default_max_rps() -> u32 {
  5
}

fn default_bind_address() -> String {
  "0.0.0.0:3001".to_string()
}
