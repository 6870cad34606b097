//! Pattern — time-windowed laundering-pattern matchers.
//!
//! Four detectors, each returning a structured detection or nothing:
//!   1. Smurfing: many distinct senders funding one account
//!   2. Layering: rapid in-out cycles of near-equal amounts
//!   3. Structuring: repeated outflows just under a reporting threshold
//!   4. Income mismatch: recent inflows far above the account's baseline
//!
//! All detectors are pure functions of (account, transactions, baseline,
//! now); thresholds come from EngineConfig, definitional tolerances from
//! the consts below.

use crate::{
    baseline::Baseline,
    config::EngineConfig,
    model::{Severity, Transaction},
    types::TxId,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ── Constants ────────────────────────────────────────────────────────────────

const SMURFING_CLUSTER_TOLERANCE: f64 = 0.20; // ±20% of the mean inflow
const SMURFING_CLUSTER_FRACTION: f64 = 0.60;
const LAYERING_MIN_CYCLES: usize = 3;
const STRUCTURING_BAND_LOW: f64 = 0.85; // of the effective threshold
const STRUCTURING_BAND_HIGH: f64 = 0.99;
const STRUCTURING_MIN_COUNT: usize = 3;
const STRUCTURING_MIN_DAYS: usize = 2;
const STRUCTURING_P90_MARGIN: f64 = 1.1;
const INCOME_MISMATCH_MIN_AGE_DAYS: i64 = 7;
const INCOME_MISMATCH_WINDOW_DAYS: i64 = 7;
const INCOME_MISMATCH_RATIO: f64 = 3.0;
const INCOME_MISMATCH_RATIO_HIGH: f64 = 5.0;

// ── Data structures ──────────────────────────────────────────────────────────

/// One matched layering cycle: an inflow answered by a near-equal outflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayeringCycle {
    pub inflow_tx: TxId,
    pub outflow_tx: TxId,
    pub inflow_amount: f64,
    pub outflow_amount: f64,
    pub elapsed_mins: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum PatternDetection {
    Smurfing {
        unique_senders: usize,
        inflow_count: usize,
        total_amount: f64,
        mean_amount: f64,
        clustered: bool,
    },
    Layering {
        cycle_count: usize,
        cycles: Vec<LayeringCycle>,
    },
    Structuring {
        count: usize,
        /// Effective threshold T the band was derived from.
        threshold: f64,
        average_amount: f64,
        distinct_days: usize,
    },
    IncomeMismatch {
        recent_daily_avg: f64,
        baseline_daily_avg: f64,
        ratio: f64,
    },
}

impl PatternDetection {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Smurfing { .. } => "smurfing",
            Self::Layering { .. } => "layering",
            Self::Structuring { .. } => "structuring",
            Self::IncomeMismatch { .. } => "income_mismatch",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Smurfing { .. } | Self::Layering { .. } | Self::Structuring { .. } => {
                Severity::High
            }
            Self::IncomeMismatch { ratio, .. } => {
                if *ratio > INCOME_MISMATCH_RATIO_HIGH {
                    Severity::High
                } else {
                    Severity::Medium
                }
            }
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::Smurfing {
                unique_senders,
                inflow_count,
                total_amount,
                clustered,
                ..
            } => format!(
                "{unique_senders} distinct senders funded the account with {inflow_count} inflows totaling ${total_amount:.2}{}",
                if *clustered { " in clustered amounts" } else { "" }
            ),
            Self::Layering { cycle_count, .. } => format!(
                "{cycle_count} rapid in-out cycles of near-equal amounts"
            ),
            Self::Structuring {
                count,
                threshold,
                average_amount,
                distinct_days,
            } => format!(
                "{count} outflows averaging ${average_amount:.2} just under the ${threshold:.0} threshold across {distinct_days} days"
            ),
            Self::IncomeMismatch {
                recent_daily_avg,
                baseline_daily_avg,
                ratio,
            } => format!(
                "recent inflows of ${recent_daily_avg:.2}/day are {ratio:.1}x the baseline ${baseline_daily_avg:.2}/day"
            ),
        }
    }
}

// ── Engine ───────────────────────────────────────────────────────────────────

pub struct PatternEngine {
    cfg: EngineConfig,
}

impl PatternEngine {
    pub fn new(cfg: EngineConfig) -> Self {
        Self { cfg }
    }

    /// Run all four detectors. Order is fixed and documented.
    pub fn detect_all(
        &self,
        account: &str,
        txs: &[Transaction],
        baseline: &Baseline,
        now: DateTime<Utc>,
    ) -> Vec<PatternDetection> {
        let mut detections = Vec::new();
        if let Some(d) = self.detect_smurfing(account, txs, now) {
            detections.push(d);
        }
        if let Some(d) = self.detect_layering(account, txs) {
            detections.push(d);
        }
        if let Some(d) = self.detect_structuring(account, txs, baseline) {
            detections.push(d);
        }
        if let Some(d) = self.detect_income_mismatch(account, txs, baseline, now) {
            detections.push(d);
        }
        for d in &detections {
            log::info!("pattern {} detected for {account}: {}", d.kind(), d.description());
        }
        detections
    }

    /// Smurfing: many-to-one fan-in over the recent inflow window.
    pub fn detect_smurfing(
        &self,
        account: &str,
        txs: &[Transaction],
        now: DateTime<Utc>,
    ) -> Option<PatternDetection> {
        let window_start = now - Duration::hours(self.cfg.smurfing_window_hours);
        let inflows: Vec<&Transaction> = txs
            .iter()
            .filter(|t| t.receiver == account && t.timestamp > window_start)
            .collect();
        if inflows.is_empty() {
            return None;
        }

        let unique_senders: HashSet<&str> = inflows.iter().map(|t| t.sender.as_str()).collect();
        if unique_senders.len() < self.cfg.smurfing_min_senders {
            return None;
        }

        let total_amount: f64 = inflows.iter().map(|t| t.amount).sum();
        let mean_amount = total_amount / inflows.len() as f64;
        let clustered_count = inflows
            .iter()
            .filter(|t| (t.amount - mean_amount).abs() <= SMURFING_CLUSTER_TOLERANCE * mean_amount)
            .count();
        let clustered =
            clustered_count as f64 / inflows.len() as f64 >= SMURFING_CLUSTER_FRACTION;

        Some(PatternDetection::Smurfing {
            unique_senders: unique_senders.len(),
            inflow_count: inflows.len(),
            total_amount,
            mean_amount,
            clustered,
        })
    }

    /// Layering: greedy first-match of each inflow to a later near-equal
    /// outflow inside the layering window. An outflow may answer more than
    /// one inflow; the resulting overcount is accepted behavior.
    pub fn detect_layering(&self, account: &str, txs: &[Transaction]) -> Option<PatternDetection> {
        let mut inflows: Vec<&Transaction> =
            txs.iter().filter(|t| t.receiver == account).collect();
        let mut outflows: Vec<&Transaction> =
            txs.iter().filter(|t| t.sender == account).collect();
        inflows.sort_by_key(|t| t.timestamp);
        outflows.sort_by_key(|t| t.timestamp);

        let window = Duration::minutes(self.cfg.layering_window_mins);
        let mut cycles = Vec::new();
        for inflow in &inflows {
            let matched = outflows.iter().find(|o| {
                o.timestamp > inflow.timestamp
                    && o.timestamp - inflow.timestamp < window
                    && (o.amount - inflow.amount).abs() / inflow.amount
                        < self.cfg.layering_amount_tolerance
            });
            if let Some(outflow) = matched {
                cycles.push(LayeringCycle {
                    inflow_tx: inflow.id.clone(),
                    outflow_tx: outflow.id.clone(),
                    inflow_amount: inflow.amount,
                    outflow_amount: outflow.amount,
                    elapsed_mins: (outflow.timestamp - inflow.timestamp).num_minutes(),
                });
            }
        }

        if cycles.len() < LAYERING_MIN_CYCLES {
            return None;
        }
        Some(PatternDetection::Layering {
            cycle_count: cycles.len(),
            cycles,
        })
    }

    /// Structuring: outflows held just under the effective reporting
    /// threshold, spread over multiple UTC calendar days.
    pub fn detect_structuring(
        &self,
        account: &str,
        txs: &[Transaction],
        baseline: &Baseline,
    ) -> Option<PatternDetection> {
        let p90 = baseline.typical_amount_range.1;
        let threshold = (STRUCTURING_P90_MARGIN * p90).max(self.cfg.structuring_threshold);
        let band = (STRUCTURING_BAND_LOW * threshold)..=(STRUCTURING_BAND_HIGH * threshold);

        let in_band: Vec<&Transaction> = txs
            .iter()
            .filter(|t| t.sender == account && band.contains(&t.amount))
            .collect();
        if in_band.len() < STRUCTURING_MIN_COUNT {
            return None;
        }

        let days: HashSet<NaiveDate> = in_band.iter().map(|t| t.timestamp.date_naive()).collect();
        if days.len() < STRUCTURING_MIN_DAYS {
            return None;
        }

        let average_amount =
            in_band.iter().map(|t| t.amount).sum::<f64>() / in_band.len() as f64;
        Some(PatternDetection::Structuring {
            count: in_band.len(),
            threshold,
            average_amount,
            distinct_days: days.len(),
        })
    }

    /// Income mismatch: recent daily inflows far above the account's own
    /// baseline. Needs a week of history; a zero-inflow baseline never
    /// divides and never detects.
    pub fn detect_income_mismatch(
        &self,
        account: &str,
        txs: &[Transaction],
        baseline: &Baseline,
        now: DateTime<Utc>,
    ) -> Option<PatternDetection> {
        if baseline.account_age_days < INCOME_MISMATCH_MIN_AGE_DAYS {
            return None;
        }
        if baseline.avg_daily_inflow <= 0.0 {
            return None;
        }

        let window_start = now - Duration::days(INCOME_MISMATCH_WINDOW_DAYS);
        let recent_inflow: f64 = txs
            .iter()
            .filter(|t| t.receiver == account && t.timestamp > window_start)
            .map(|t| t.amount)
            .sum();
        let recent_daily_avg = recent_inflow / INCOME_MISMATCH_WINDOW_DAYS as f64;

        let ratio = recent_daily_avg / baseline.avg_daily_inflow;
        if ratio <= INCOME_MISMATCH_RATIO {
            return None;
        }
        Some(PatternDetection::IncomeMismatch {
            recent_daily_avg,
            baseline_daily_avg: baseline.avg_daily_inflow,
            ratio,
        })
    }
}
