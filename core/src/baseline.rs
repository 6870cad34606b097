//! Baseline — per-account behavioral statistics and deviation tests.
//!
//! A baseline is derived, never persisted: it is recomputed from the full
//! transaction history on every evaluation. An account with no history
//! gets the all-zero default baseline (age 0).

use crate::{
    model::{Severity, Transaction},
    types::AccountId,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ── Constants ────────────────────────────────────────────────────────────────

const AMOUNT_DEVIATION_RATIO: f64 = 3.0; // outflow vs daily average
const AMOUNT_DEVIATION_RATIO_HIGH: f64 = 5.0;
const RANGE_DEVIATION_FACTOR: f64 = 1.5; // vs p90 of typical range

// ── Data structures ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub account_id: AccountId,
    pub avg_daily_inflow: f64,
    pub avg_daily_outflow: f64,
    pub avg_tx_frequency: f64,
    pub avg_unique_senders: f64,
    pub avg_unique_receivers: f64,
    /// (p10, p90) over all amounts touching the account.
    pub typical_amount_range: (f64, f64),
    pub account_age_days: i64,
    pub total_transactions: usize,
}

impl Baseline {
    /// Baseline for an account with no transaction history.
    pub fn default_for(account_id: impl Into<AccountId>) -> Self {
        Self {
            account_id: account_id.into(),
            avg_daily_inflow: 0.0,
            avg_daily_outflow: 0.0,
            avg_tx_frequency: 0.0,
            avg_unique_senders: 0.0,
            avg_unique_receivers: 0.0,
            typical_amount_range: (0.0, 0.0),
            account_age_days: 0,
            total_transactions: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviationKind {
    AmountDeviation,
    FirstTransaction,
    RangeDeviation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deviation {
    pub kind: DeviationKind,
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviationCheck {
    pub has_deviation: bool,
    pub deviations: Vec<Deviation>,
}

// ── Engine ───────────────────────────────────────────────────────────────────

/// Stateless: every call recomputes from the transactions it is given.
#[derive(Default)]
pub struct BaselineEngine;

impl BaselineEngine {
    pub fn new() -> Self {
        Self
    }

    /// Compute the behavioral baseline for `account` from `txs`.
    pub fn compute(&self, account: &str, txs: &[Transaction], now: DateTime<Utc>) -> Baseline {
        let touching: Vec<&Transaction> = txs.iter().filter(|t| t.touches(account)).collect();
        if touching.is_empty() {
            return Baseline::default_for(account);
        }

        let first_ts = touching
            .iter()
            .map(|t| t.timestamp)
            .min()
            .unwrap_or(now);
        let age_days = (now - first_ts).num_days().max(1);
        let age = age_days as f64;

        let mut inflow = 0.0;
        let mut outflow = 0.0;
        let mut senders: HashSet<&str> = HashSet::new();
        let mut receivers: HashSet<&str> = HashSet::new();
        for t in &touching {
            if t.receiver == account {
                inflow += t.amount;
                senders.insert(t.sender.as_str());
            }
            if t.sender == account {
                outflow += t.amount;
                receivers.insert(t.receiver.as_str());
            }
        }

        let mut amounts: Vec<f64> = touching.iter().map(|t| t.amount).collect();
        amounts.sort_by(f64::total_cmp);
        let n = amounts.len();
        let p10 = amounts[(((n as f64) * 0.1).floor() as usize).min(n - 1)];
        let p90 = amounts[(((n as f64) * 0.9).floor() as usize).min(n - 1)];

        let baseline = Baseline {
            account_id: account.to_string(),
            avg_daily_inflow: inflow / age,
            avg_daily_outflow: outflow / age,
            avg_tx_frequency: touching.len() as f64 / age,
            avg_unique_senders: senders.len() as f64 / age,
            avg_unique_receivers: receivers.len() as f64 / age,
            typical_amount_range: (p10, p90),
            account_age_days: age_days,
            total_transactions: touching.len(),
        };
        log::debug!(
            "baseline {account}: {} txs over {} days, in/day {:.2}, out/day {:.2}",
            baseline.total_transactions,
            baseline.account_age_days,
            baseline.avg_daily_inflow,
            baseline.avg_daily_outflow,
        );
        baseline
    }

    /// Test a single transaction against the account's baseline.
    ///
    /// A zero outflow baseline never divides: it reports first_transaction
    /// instead of an amount deviation.
    pub fn check_deviation(&self, tx: &Transaction, baseline: &Baseline) -> DeviationCheck {
        let mut deviations = Vec::new();

        if tx.sender == baseline.account_id {
            if baseline.avg_daily_outflow > 0.0 {
                let ratio = tx.amount / baseline.avg_daily_outflow;
                if ratio > AMOUNT_DEVIATION_RATIO {
                    let severity = if ratio > AMOUNT_DEVIATION_RATIO_HIGH {
                        Severity::High
                    } else {
                        Severity::Medium
                    };
                    deviations.push(Deviation {
                        kind: DeviationKind::AmountDeviation,
                        severity,
                        description: format!(
                            "outflow ${:.2} is {:.1}x the daily average ${:.2}",
                            tx.amount, ratio, baseline.avg_daily_outflow
                        ),
                    });
                }
            } else if tx.amount > 0.0 {
                deviations.push(Deviation {
                    kind: DeviationKind::FirstTransaction,
                    severity: Severity::Medium,
                    description: format!(
                        "first outgoing transaction of ${:.2} for an account with no outflow history",
                        tx.amount
                    ),
                });
            }
        }

        let p90 = baseline.typical_amount_range.1;
        if p90 > 0.0 && tx.amount > RANGE_DEVIATION_FACTOR * p90 {
            deviations.push(Deviation {
                kind: DeviationKind::RangeDeviation,
                severity: Severity::Medium,
                description: format!(
                    "amount ${:.2} exceeds {:.1}x the typical p90 ${:.2}",
                    tx.amount, RANGE_DEVIATION_FACTOR, p90
                ),
            });
        }

        DeviationCheck {
            has_deviation: !deviations.is_empty(),
            deviations,
        }
    }

    /// Transactions touching `account` within the last `hours_back` hours.
    pub fn recent_activity<'a>(
        &self,
        account: &str,
        txs: &'a [Transaction],
        hours_back: i64,
        now: DateTime<Utc>,
    ) -> Vec<&'a Transaction> {
        let cutoff = now - Duration::hours(hours_back);
        txs.iter()
            .filter(|t| t.touches(account) && t.timestamp > cutoff)
            .collect()
    }
}
