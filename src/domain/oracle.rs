//! Port performance oracle types.
//!
//! Performance is expressed in basis points of a percentage
//! (0 = 0%, 10 000 = 100%). Values are validated where they enter
//! the core so nothing out of range is ever stored.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::error::LedgerError;

/// Maximum length of a port code (fits a bytes32 slot).
pub const MAX_PORT_CODE_LEN: usize = 32;

/// Validated port identifier such as `SINGAPORE` or `LOS_ANGELES`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PortCode(String);

impl PortCode {
    /// Validate and wrap a port code.
    ///
    /// Accepts 1–32 ASCII letters, digits or underscores.
    pub fn new(code: impl Into<String>) -> Result<Self, LedgerError> {
        let code = code.into();
        if code.is_empty() || code.len() > MAX_PORT_CODE_LEN {
            return Err(LedgerError::validation(format!(
                "port code must be 1-{MAX_PORT_CODE_LEN} characters, got {:?}",
                code
            )));
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(LedgerError::validation(format!(
                "port code {code:?} may only contain letters, digits and underscores"
            )));
        }
        Ok(Self(code))
    }

    /// Borrow the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PortCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PortCode {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PortCode> for String {
    fn from(code: PortCode) -> Self {
        code.0
    }
}

/// Performance index in basis points, always within [0, 10 000].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct PerformanceIndex(u16);

impl PerformanceIndex {
    /// Upper bound (100%).
    pub const MAX: u32 = 10_000;

    /// Validate a raw basis-point value.
    ///
    /// # Errors
    /// `Validation` when `bps > 10_000`.
    pub fn new(bps: u32) -> Result<Self, LedgerError> {
        if bps > Self::MAX {
            return Err(LedgerError::validation(format!(
                "performance index {bps} outside [0, {}]",
                Self::MAX
            )));
        }
        Ok(Self(bps as u16))
    }

    /// Raw basis points.
    pub fn value(&self) -> u32 {
        u32::from(self.0)
    }

    /// Performance as a percentage (basis points / 100).
    pub fn percent(&self) -> Decimal {
        Decimal::new(i64::from(self.0), 2)
    }

    /// Display label with one decimal place, e.g. `"75.0%"`.
    pub fn percent_label(&self) -> String {
        let rounded = self
            .percent()
            .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
        format!("{rounded:.1}%")
    }
}

impl TryFrom<u32> for PerformanceIndex {
    type Error = LedgerError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PerformanceIndex> for u32 {
    fn from(index: PerformanceIndex) -> Self {
        index.value()
    }
}

impl fmt::Display for PerformanceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}bp", self.0)
    }
}

/// Stored performance record for one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRecord {
    /// Latest performance index.
    pub performance_index: PerformanceIndex,
    /// Time of the latest write; never moves backwards.
    pub last_updated_at: DateTime<Utc>,
    /// Set on the first successful write.
    pub active: bool,
}

impl OracleRecord {
    /// Default record reported for ports that were never written.
    pub fn inactive() -> Self {
        Self {
            performance_index: PerformanceIndex::default(),
            last_updated_at: DateTime::<Utc>::UNIX_EPOCH,
            active: false,
        }
    }
}

impl Default for OracleRecord {
    fn default() -> Self {
        Self::inactive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_index_bounds() {
        assert!(PerformanceIndex::new(0).is_ok());
        assert!(PerformanceIndex::new(10_000).is_ok());
        assert!(matches!(
            PerformanceIndex::new(10_001),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_percent_rendering() {
        let idx = PerformanceIndex::new(7500).unwrap();
        assert_eq!(idx.percent(), dec!(75.00));
        assert_eq!(idx.percent_label(), "75.0%");
        assert_eq!(PerformanceIndex::new(6855).unwrap().percent_label(), "68.6%");
        assert_eq!(PerformanceIndex::default().percent_label(), "0.0%");
    }

    #[test]
    fn test_port_code_validation() {
        assert!(PortCode::new("LOS_ANGELES").is_ok());
        assert!(PortCode::new("TestPort").is_ok());
        assert!(PortCode::new("").is_err());
        assert!(PortCode::new("LOS ANGELES").is_err());
        assert!(PortCode::new("X".repeat(33)).is_err());
    }

    #[test]
    fn test_port_code_keeps_case() {
        let mixed = PortCode::new("Dubai").unwrap();
        assert_eq!(mixed.as_str(), "Dubai");
        assert_ne!(mixed, PortCode::new("DUBAI").unwrap());
    }

    #[test]
    fn test_inactive_record() {
        let rec = OracleRecord::inactive();
        assert!(!rec.active);
        assert_eq!(rec.performance_index.value(), 0);
        assert_eq!(rec.last_updated_at.timestamp(), 0);
    }

    #[test]
    fn test_record_serde_rejects_out_of_range_index() {
        let json = r#"{"performance_index":10001,"last_updated_at":"2024-01-01T00:00:00Z","active":true}"#;
        assert!(serde_json::from_str::<OracleRecord>(json).is_err());
    }
}
