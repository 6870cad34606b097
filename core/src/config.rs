//! Engine configuration — every tunable threshold in one place.
//!
//! Defaults match the documented detection constants. A deployment may
//! override them from a JSON file via `EngineConfig::load`. Tolerances
//! that are part of a detector's definition (cluster fraction, deviation
//! ratios) stay as consts in their modules.

use crate::model::RiskLevel;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Reporting threshold floor for structuring detection (currency units).
    pub structuring_threshold: f64,
    /// Suppress a new alert when the account already has one younger than this.
    pub dedup_window_secs: i64,
    /// Maximum edge depth for circular-flow traversal.
    pub max_path_depth: usize,
    /// Distinct senders required before an inflow fan-in counts as smurfing.
    pub smurfing_min_senders: usize,
    /// Inflow lookback for smurfing detection.
    pub smurfing_window_hours: i64,
    /// Maximum inflow-to-outflow gap for a layering cycle.
    pub layering_window_mins: i64,
    /// Relative amount tolerance for a layering cycle match.
    pub layering_amount_tolerance: f64,
    /// Inflow-to-outflow gap that counts as a rapid redistribution.
    pub rapid_redistribution_window_hours: i64,
    /// Distinct senders AND receivers required for a hub signal.
    pub hub_min_counterparties: usize,
    /// Transactions before this UTC hour are in the unusual window [0, end).
    pub unusual_hours_end: u32,
    /// Score weight per suspicious transaction.
    pub weight_suspicious_tx: u32,
    /// Score weight per confirmed pattern.
    pub weight_pattern: u32,
    /// Score weight per network signal.
    pub weight_network_signal: u32,
    /// Flat bonus when network analysis concludes probable laundering.
    pub probable_ml_bonus: u32,
    /// Score floor of the Suspicious band (and of alert generation).
    pub suspicious_band: u32,
    /// Score floor of the HighRisk band.
    pub high_risk_band: u32,
    /// Score floor of the ProbableML band.
    pub probable_ml_band: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            structuring_threshold: 10_000.0,
            dedup_window_secs: 3600,
            max_path_depth: 5,
            smurfing_min_senders: 6,
            smurfing_window_hours: 48,
            layering_window_mins: 120,
            layering_amount_tolerance: 0.10,
            rapid_redistribution_window_hours: 24,
            hub_min_counterparties: 5,
            unusual_hours_end: 5,
            weight_suspicious_tx: 10,
            weight_pattern: 20,
            weight_network_signal: 30,
            probable_ml_bonus: 20,
            suspicious_band: 30,
            high_risk_band: 60,
            probable_ml_band: 80,
        }
    }
}

impl EngineConfig {
    /// Load overrides from a JSON file. Missing fields keep their defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Discretize a score into its risk band.
    pub fn band(&self, score: u32) -> RiskLevel {
        if score >= self.probable_ml_band {
            RiskLevel::ProbableML
        } else if score >= self.high_risk_band {
            RiskLevel::HighRisk
        } else if score >= self.suspicious_band {
            RiskLevel::Suspicious
        } else {
            RiskLevel::Normal
        }
    }
}
