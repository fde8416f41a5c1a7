//! Simulated Performance Source - Randomized Port Performance Data
//!
//! Stands in for a real port-statistics provider. Each fetch returns
//! the port's base performance plus a uniform variation, clamped to a
//! plausible operating band.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::domain::oracle::PortCode;
use crate::ports::performance_source::PerformanceSource;

/// Base used for ports without a configured base performance.
pub const DEFAULT_BASE_PERFORMANCE: u32 = 5_000;
/// Half-width of the random variation, in basis points.
pub const VARIATION_BPS: i64 = 500;
/// Lowest value ever produced.
pub const MIN_PERFORMANCE: u32 = 1_000;
/// Highest value ever produced.
pub const MAX_PERFORMANCE: u32 = 9_500;

/// Random-walk-free simulator: every fetch is an independent draw.
pub struct SimulatedSource {
    bases: HashMap<PortCode, u32>,
    rng: Mutex<StdRng>,
}

impl SimulatedSource {
    /// Create a simulator seeded from OS entropy.
    pub fn new(bases: HashMap<PortCode, u32>) -> Self {
        Self {
            bases,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Create a simulator with a fixed seed (reproducible runs).
    pub fn with_seed(bases: HashMap<PortCode, u32>, seed: u64) -> Self {
        Self {
            bases,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Base performance used for `port`.
    pub fn base_for(&self, port: &PortCode) -> u32 {
        self.bases
            .get(port)
            .copied()
            .unwrap_or(DEFAULT_BASE_PERFORMANCE)
    }

    fn draw_variation(&self) -> i64 {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen_range(-VARIATION_BPS..VARIATION_BPS)
    }
}

#[async_trait]
impl PerformanceSource for SimulatedSource {
    async fn fetch_index(&self, port: &PortCode) -> anyhow::Result<u32> {
        let base = self.base_for(port);
        let raw = i64::from(base) + self.draw_variation();
        let value = raw.clamp(i64::from(MIN_PERFORMANCE), i64::from(MAX_PERFORMANCE)) as u32;
        debug!(port = %port, base, value, "Simulated performance drawn");
        Ok(value)
    }

    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}
