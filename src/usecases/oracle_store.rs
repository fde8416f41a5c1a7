//! Oracle Store - Owner-Gated Port Performance Records
//!
//! Single-writer keyed store mapping port codes to their latest
//! performance record. Only the registered owner (the feeder identity)
//! may write; reads never fail and report an inactive default for
//! ports that were never written.
//!
//! Token links associate an asset with a port for presentation only.
//! Nothing in the swap path reads them.

use std::collections::HashMap;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::error::LedgerError;
use crate::domain::oracle::{OracleRecord, PerformanceIndex, PortCode};
use crate::domain::pool::{AccountId, AssetId};

/// Serializable image of the store, written by the snapshot adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleSnapshot {
  /// Owner address at the time of the snapshot (checksummed hex).
  pub owner: String,
  /// Records in activation order.
  pub ports: Vec<PortEntry>,
  /// Token to port associations.
  #[serde(default)]
  pub token_links: Vec<TokenLink>,
  /// Snapshot creation time.
  pub saved_at: DateTime<Utc>,
}

/// One stored port record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortEntry {
  pub port: PortCode,
  pub record: OracleRecord,
}

/// One token to port association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenLink {
  /// Token address (checksummed hex).
  pub token: String,
  pub port: PortCode,
}

/// Keyed store of oracle records with an owner-only write path.
#[derive(Debug, Clone)]
pub struct OracleStore {
  owner: AccountId,
  records: HashMap<PortCode, OracleRecord>,
  /// Ports in the order they were first written.
  active: Vec<PortCode>,
  token_links: HashMap<AssetId, PortCode>,
}

impl OracleStore {
  /// Create an empty store owned by `owner`.
  pub fn new(owner: AccountId) -> Self {
    Self {
      owner,
      records: HashMap::new(),
      active: Vec::new(),
      token_links: HashMap::new(),
    }
  }

  /// Registered owner/feeder identity.
  pub fn owner(&self) -> AccountId {
    self.owner
  }

  // ── Writes ──────────────────────────────────────────────

  /// Upsert the record for `port`, stamped with the current time.
  ///
  /// # Errors
  /// `Authorization` if `caller` is not the owner, `Validation` if
  /// `index` is above 10000. The prior record is untouched on error.
  pub fn update_port_data(
    &mut self,
    port: &PortCode,
    index: u32,
    caller: AccountId,
  ) -> Result<OracleRecord, LedgerError> {
    self.update_port_data_at(port, index, caller, Utc::now())
  }

  /// Upsert with an explicit clock reading.
  ///
  /// `last_updated_at` never moves backwards: a reading older than the
  /// stored timestamp keeps the stored one.
  pub fn update_port_data_at(
    &mut self,
    port: &PortCode,
    index: u32,
    caller: AccountId,
    now: DateTime<Utc>,
  ) -> Result<OracleRecord, LedgerError> {
    self.ensure_owner(caller, "update port data")?;
    let performance_index = PerformanceIndex::new(index)?;

    let previous = self.records.get(port).copied();
    let last_updated_at = match previous {
      Some(prev) if prev.last_updated_at > now => prev.last_updated_at,
      _ => now,
    };
    let record = OracleRecord {
      performance_index,
      last_updated_at,
      active: true,
    };

    if previous.is_none() {
      self.active.push(port.clone());
    }
    self.records.insert(port.clone(), record);

    debug!(
      port = %port,
      index = %performance_index,
      previous = ?previous.map(|r| r.performance_index.value()),
      "Port data updated"
    );
    Ok(record)
  }

  /// Associate `token` with `port` for display purposes.
  ///
  /// Re-linking a token replaces its previous port.
  pub fn link_token_to_port(
    &mut self,
    token: AssetId,
    port: &PortCode,
    caller: AccountId,
  ) -> Result<(), LedgerError> {
    self.ensure_owner(caller, "link token to port")?;
    let previous = self.token_links.insert(token, port.clone());
    info!(%token, port = %port, previous = ?previous.as_ref().map(PortCode::as_str), "Token linked to port");
    Ok(())
  }

  fn ensure_owner(&self, caller: AccountId, action: &'static str) -> Result<(), LedgerError> {
    if caller != self.owner {
      warn!(%caller, action, "Unauthorized oracle write rejected");
      return Err(LedgerError::Authorization {
        caller: caller.to_string(),
        action,
      });
    }
    Ok(())
  }

  // ── Reads ───────────────────────────────────────────────

  /// Stored record for `port`, or the inactive default.
  pub fn get_port_data(&self, port: &PortCode) -> OracleRecord {
    self.records.get(port).copied().unwrap_or_default()
  }

  /// Port linked to `token`, if any.
  pub fn port_for_token(&self, token: AssetId) -> Option<&PortCode> {
    self.token_links.get(&token)
  }

  /// Ports that have been written at least once, in activation order.
  pub fn active_ports(&self) -> &[PortCode] {
    &self.active
  }

  pub fn active_port_count(&self) -> usize {
    self.active.len()
  }

  /// Active port at `position` in activation order.
  pub fn active_port(&self, position: usize) -> Option<&PortCode> {
    self.active.get(position)
  }

  // ── Persistence ─────────────────────────────────────────

  /// Capture the current state.
  pub fn snapshot(&self) -> OracleSnapshot {
    OracleSnapshot {
      owner: self.owner.to_string(),
      ports: self
        .active
        .iter()
        .map(|port| PortEntry {
          port: port.clone(),
          record: self.get_port_data(port),
        })
        .collect(),
      token_links: self
        .token_links
        .iter()
        .map(|(token, port)| TokenLink {
          token: token.to_string(),
          port: port.clone(),
        })
        .collect(),
      saved_at: Utc::now(),
    }
  }

  /// Replace records and links with those of `snapshot`.
  ///
  /// The owner stays the one this store was constructed with; a
  /// snapshot written under a different owner is still loaded.
  pub fn restore(&mut self, snapshot: OracleSnapshot) -> Result<()> {
    let mut token_links = HashMap::with_capacity(snapshot.token_links.len());
    for link in snapshot.token_links {
      let token: Address = link
        .token
        .parse()
        .with_context(|| format!("Invalid token address in snapshot: {}", link.token))?;
      token_links.insert(token, link.port);
    }

    if snapshot.owner.parse::<Address>().ok() != Some(self.owner) {
      warn!(
        snapshot_owner = %snapshot.owner,
        owner = %self.owner,
        "Oracle snapshot was written under a different owner"
      );
    }

    self.records.clear();
    self.active.clear();
    for entry in snapshot.ports {
      if self.records.insert(entry.port.clone(), entry.record).is_none() {
        self.active.push(entry.port);
      }
    }
    self.token_links = token_links;

    info!(
      ports = self.active.len(),
      token_links = self.token_links.len(),
      saved_at = %snapshot.saved_at,
      "Oracle store restored"
    );
    Ok(())
  }
}
