//! Evidence — per-account evaluation, scoring, risk classification.
//!
//! Evaluation pipeline for one account:
//!   1. recompute the baseline from the full history
//!   2. collect suspicious-transaction entries (five kinds)
//!   3. run the pattern matchers
//!   4. run the network analysis
//!   5. reduce to a capped weighted score and band it
//!
//! Evaluation has no side effects; `update_evidence` persists the result.

use crate::{
    baseline::{Baseline, BaselineEngine},
    config::EngineConfig,
    error::AmlResult,
    model::{AccountEvidence, RiskLevel, Transaction},
    network::{NetworkAnalysis, NetworkEngine},
    pattern::{PatternDetection, PatternEngine},
    store::Store,
    types::{AccountId, TxId},
};
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

// ── Constants ────────────────────────────────────────────────────────────────

const FREQUENCY_SPIKE_FACTOR: f64 = 3.0; // vs avg daily frequency
const SENDER_SPIKE_FACTOR: f64 = 2.0; // vs avg daily unique senders
const SIMILAR_VALUE_TOLERANCE: f64 = 0.05;
const SIMILAR_VALUE_MIN_COUNT: usize = 3; // inclusive of the transaction itself
const SIMILAR_VALUE_WINDOW_HOURS: i64 = 24;
const DAYTIME_HISTORY_FRACTION: f64 = 0.80;

// ── Data structures ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspiciousKind {
    BaselineDeviation,
    FrequencySpike,
    SenderCountSpike,
    SimilarValueRepeat,
    UnusualTiming,
}

impl SuspiciousKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BaselineDeviation => "baseline_deviation",
            Self::FrequencySpike => "frequency_spike",
            Self::SenderCountSpike => "sender_count_spike",
            Self::SimilarValueRepeat => "similar_value_repeat",
            Self::UnusualTiming => "unusual_timing",
        }
    }
}

/// One suspicious-transaction entry. A transaction may appear under
/// several kinds; each entry scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspiciousTransaction {
    pub tx_id: TxId,
    pub kind: SuspiciousKind,
    pub description: String,
    pub transaction: Transaction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub account_id: AccountId,
    pub score: u32,
    pub risk_level: RiskLevel,
    pub baseline: Baseline,
    pub suspicious: Vec<SuspiciousTransaction>,
    pub patterns: Vec<PatternDetection>,
    pub network: NetworkAnalysis,
    pub evaluated_at: DateTime<Utc>,
}

// ── Engine ───────────────────────────────────────────────────────────────────

pub struct EvidenceEngine {
    cfg: EngineConfig,
    baseline: BaselineEngine,
    patterns: PatternEngine,
    network: NetworkEngine,
}

impl EvidenceEngine {
    pub fn new(cfg: EngineConfig) -> Self {
        Self {
            baseline: BaselineEngine::new(),
            patterns: PatternEngine::new(cfg.clone()),
            network: NetworkEngine::new(cfg.clone()),
            cfg,
        }
    }

    /// Evaluate one account against the store's transaction history.
    pub fn evaluate(
        &self,
        account: &str,
        store: &dyn Store,
        now: DateTime<Utc>,
    ) -> AmlResult<Evaluation> {
        let txs = store.list_transactions()?;
        self.evaluate_with(account, &txs, store, now)
    }

    pub(crate) fn evaluate_with(
        &self,
        account: &str,
        txs: &[Transaction],
        store: &dyn Store,
        now: DateTime<Utc>,
    ) -> AmlResult<Evaluation> {
        let baseline = self.baseline.compute(account, txs, now);
        let suspicious = self.find_suspicious(account, txs, &baseline);
        let patterns = self.patterns.detect_all(account, txs, &baseline, now);
        let network = self.network.analyze(account, txs, store)?;

        let raw = self.cfg.weight_suspicious_tx * suspicious.len() as u32
            + self.cfg.weight_pattern * patterns.len() as u32
            + self.cfg.weight_network_signal * network.signals.len() as u32
            + if network.is_probable_ml {
                self.cfg.probable_ml_bonus
            } else {
                0
            };
        let score = raw.min(100);
        let risk_level = self.cfg.band(score);

        log::debug!(
            "evaluated {account}: score {score} ({} suspicious, {} patterns, {} signals)",
            suspicious.len(),
            patterns.len(),
            network.signals.len()
        );
        Ok(Evaluation {
            account_id: account.to_string(),
            score,
            risk_level,
            baseline,
            suspicious,
            patterns,
            network,
            evaluated_at: now,
        })
    }

    /// Scan every transaction touching the account for the five
    /// suspicious-entry kinds. Daily counts use the UTC civil date of the
    /// transaction under test, so historical spike days stay detectable.
    pub fn find_suspicious(
        &self,
        account: &str,
        txs: &[Transaction],
        baseline: &Baseline,
    ) -> Vec<SuspiciousTransaction> {
        let touching: Vec<&Transaction> = txs.iter().filter(|t| t.touches(account)).collect();
        if touching.is_empty() {
            return Vec::new();
        }

        let mut count_by_date: HashMap<NaiveDate, usize> = HashMap::new();
        let mut senders_by_date: HashMap<NaiveDate, HashSet<&str>> = HashMap::new();
        let mut daytime = 0usize;
        for t in &touching {
            let date = t.timestamp.date_naive();
            *count_by_date.entry(date).or_default() += 1;
            if t.receiver == account {
                senders_by_date
                    .entry(date)
                    .or_default()
                    .insert(t.sender.as_str());
            }
            if t.timestamp.hour() >= self.cfg.unusual_hours_end {
                daytime += 1;
            }
        }
        let daytime_fraction = daytime as f64 / touching.len() as f64;

        let mut found = Vec::new();
        for t in &touching {
            let date = t.timestamp.date_naive();

            if t.sender == account {
                let check = self.baseline.check_deviation(t, baseline);
                if check.has_deviation {
                    let details: Vec<String> = check
                        .deviations
                        .iter()
                        .map(|d| d.description.clone())
                        .collect();
                    found.push(self.entry(
                        t,
                        SuspiciousKind::BaselineDeviation,
                        details.join("; "),
                    ));
                }
            }

            if baseline.avg_tx_frequency > 0.0 {
                let day_count = count_by_date.get(&date).copied().unwrap_or(0);
                if day_count as f64 > FREQUENCY_SPIKE_FACTOR * baseline.avg_tx_frequency {
                    found.push(self.entry(
                        t,
                        SuspiciousKind::FrequencySpike,
                        format!(
                            "{} transactions on {} against a daily average of {:.2}",
                            day_count, date, baseline.avg_tx_frequency
                        ),
                    ));
                }
            }

            if t.receiver == account && baseline.avg_unique_senders > 0.0 {
                let day_senders = senders_by_date.get(&date).map_or(0, |s| s.len());
                if day_senders as f64 > SENDER_SPIKE_FACTOR * baseline.avg_unique_senders {
                    found.push(self.entry(
                        t,
                        SuspiciousKind::SenderCountSpike,
                        format!(
                            "{} distinct senders on {} against a daily average of {:.2}",
                            day_senders, date, baseline.avg_unique_senders
                        ),
                    ));
                }
            }

            let window_start = t.timestamp - chrono::Duration::hours(SIMILAR_VALUE_WINDOW_HOURS);
            let similar = touching
                .iter()
                .filter(|u| {
                    u.timestamp > window_start
                        && u.timestamp <= t.timestamp
                        && (u.amount - t.amount).abs() / t.amount < SIMILAR_VALUE_TOLERANCE
                })
                .count();
            if similar >= SIMILAR_VALUE_MIN_COUNT {
                found.push(self.entry(
                    t,
                    SuspiciousKind::SimilarValueRepeat,
                    format!(
                        "{} near-identical amounts around ${:.2} inside 24h",
                        similar, t.amount
                    ),
                ));
            }

            if t.timestamp.hour() < self.cfg.unusual_hours_end
                && daytime_fraction > DAYTIME_HISTORY_FRACTION
            {
                found.push(self.entry(
                    t,
                    SuspiciousKind::UnusualTiming,
                    format!(
                        "transaction at {:02}:00 UTC for an account active {:.0}% in daytime",
                        t.timestamp.hour(),
                        daytime_fraction * 100.0
                    ),
                ));
            }
        }
        found
    }

    fn entry(
        &self,
        t: &Transaction,
        kind: SuspiciousKind,
        description: String,
    ) -> SuspiciousTransaction {
        SuspiciousTransaction {
            tx_id: t.id.clone(),
            kind,
            description,
            transaction: (*t).clone(),
        }
    }

    /// Persist the evaluation's evidence record, overwriting any previous
    /// record for the account.
    pub fn update_evidence(
        &self,
        evaluation: &Evaluation,
        store: &mut dyn Store,
    ) -> AmlResult<()> {
        let record = AccountEvidence {
            score: evaluation.score,
            risk_level: evaluation.risk_level,
            suspicious_transactions: evaluation.suspicious.len(),
            confirmed_patterns: evaluation.patterns.len(),
            network_signals: evaluation.network.signals.len(),
            is_probable_ml: evaluation.network.is_probable_ml,
            last_updated: evaluation.evaluated_at,
        };
        store.put_evidence(&evaluation.account_id, &record)
    }

    /// Evaluate and persist every account seen in the transaction history,
    /// in sorted account order.
    pub fn evaluate_all(
        &self,
        store: &mut dyn Store,
        now: DateTime<Utc>,
    ) -> AmlResult<Vec<Evaluation>> {
        let txs = store.list_transactions()?;
        let accounts: BTreeSet<AccountId> = txs
            .iter()
            .flat_map(|t| [t.sender.clone(), t.receiver.clone()])
            .collect();

        let mut evaluations = Vec::with_capacity(accounts.len());
        for account in &accounts {
            let evaluation = self.evaluate_with(account, &txs, &*store, now)?;
            self.update_evidence(&evaluation, &mut *store)?;
            evaluations.push(evaluation);
        }
        Ok(evaluations)
    }

    /// Persisted evidence in the flagged bands, highest score first.
    pub fn high_risk_accounts(
        &self,
        store: &dyn Store,
    ) -> AmlResult<Vec<(AccountId, AccountEvidence)>> {
        let mut flagged: Vec<(AccountId, AccountEvidence)> = store
            .all_evidence()?
            .into_iter()
            .filter(|(_, ev)| ev.risk_level.is_flagged())
            .collect();
        flagged.sort_by(|a, b| b.1.score.cmp(&a.1.score).then_with(|| a.0.cmp(&b.0)));
        Ok(flagged)
    }
}
