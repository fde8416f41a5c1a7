//! Feeder Identity - Process-scoped Oracle Write Credential
//!
//! The address the feed service writes as. Loaded once at startup from
//! `FEEDER_ADDRESS` (falling back to the configured oracle owner) and
//! shared behind an `Arc` for the life of the process.

use alloy::primitives::Address;
use anyhow::{Context, Result};

/// Environment variable holding the feeder address.
pub const FEEDER_ADDRESS_ENV: &str = "FEEDER_ADDRESS";

/// Identity used to authorize oracle writes. Never rotated mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeederIdentity {
    address: Address,
}

impl FeederIdentity {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// Load from `FEEDER_ADDRESS`, or use `fallback` when it is unset.
    pub fn from_env(fallback: Option<Address>) -> Result<Self> {
        match std::env::var(FEEDER_ADDRESS_ENV) {
            Ok(raw) => Self::parse(&raw),
            Err(_) => fallback
                .map(Self::new)
                .context("FEEDER_ADDRESS not set and no oracle.owner configured"),
        }
    }

    /// Parse a hex address.
    pub fn parse(raw: &str) -> Result<Self> {
        let address = raw
            .trim()
            .parse::<Address>()
            .with_context(|| format!("Invalid feeder address: {raw}"))?;
        Ok(Self::new(address))
    }

    pub fn address(&self) -> Address {
        self.address
    }
}
