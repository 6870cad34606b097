//! Pipeline — the composition root and per-transaction orchestrator.
//!
//! EXECUTION ORDER for one ingested transaction (fixed, documented):
//!   1. validate the transaction; reject without touching the store
//!   2. persist it
//!   3. for sender, then receiver: evaluate, persist evidence, and alert
//!      when the score reaches the Suspicious band
//!
//! Steps 2-3 run inside one store unit: a store failure rolls the whole
//! call back, so a failed `process` leaves the system unchanged.

use crate::{
    alert::AlertEngine,
    clock::EngineClock,
    config::EngineConfig,
    error::{AmlError, AmlResult},
    evidence::EvidenceEngine,
    model::{RiskLevel, Transaction},
    store::Store,
    types::{AccountId, TxId},
};
use serde::Serialize;

// ── Results ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountOutcome {
    pub account_id: AccountId,
    pub score: u32,
    pub risk_level: RiskLevel,
    pub alert_generated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessOutcome {
    pub tx_id: TxId,
    pub accounts: Vec<AccountOutcome>,
    pub highest_risk: AccountId,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BandCounts {
    pub normal: usize,
    pub suspicious: usize,
    pub high_risk: usize,
    pub probable_ml: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub transactions: usize,
    pub accounts_evaluated: usize,
    pub bands: BandCounts,
    pub alerts_created: usize,
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

pub struct AmlPipeline {
    cfg: EngineConfig,
    clock: EngineClock,
    store: Box<dyn Store>,
    evidence: EvidenceEngine,
    alerts: AlertEngine,
}

impl AmlPipeline {
    pub fn new(store: Box<dyn Store>, cfg: EngineConfig, clock: EngineClock) -> Self {
        Self {
            evidence: EvidenceEngine::new(cfg.clone()),
            alerts: AlertEngine::new(cfg.clone()),
            cfg,
            clock,
            store,
        }
    }

    /// Read access to the underlying store, for queries and tooling.
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn evidence(&self) -> &EvidenceEngine {
        &self.evidence
    }

    /// Pin the clock. Used by tests and replay tooling.
    pub fn set_time(&mut self, at: chrono::DateTime<chrono::Utc>) {
        self.clock.set(at);
    }

    /// Ingest one transaction and evaluate both parties.
    pub fn process(&mut self, tx: &Transaction) -> AmlResult<ProcessOutcome> {
        validate(tx)?;
        let now = self.clock.now();

        self.store.begin_unit()?;
        match self.process_inner(tx, now) {
            Ok(outcome) => {
                self.store.commit_unit()?;
                Ok(outcome)
            }
            Err(e) => {
                // Best effort: the unit dies either way.
                let _ = self.store.rollback_unit();
                Err(e)
            }
        }
    }

    fn process_inner(
        &mut self,
        tx: &Transaction,
        now: chrono::DateTime<chrono::Utc>,
    ) -> AmlResult<ProcessOutcome> {
        self.store.add_transaction(tx)?;

        let mut accounts = Vec::with_capacity(2);
        for account in [tx.sender.as_str(), tx.receiver.as_str()] {
            let evaluation = self.evidence.evaluate(account, self.store.as_ref(), now)?;
            self.evidence
                .update_evidence(&evaluation, self.store.as_mut())?;

            let alert = if evaluation.score >= self.cfg.suspicious_band {
                self.alerts
                    .create_and_save(account, &self.evidence, self.store.as_mut(), now)?
            } else {
                None
            };

            accounts.push(AccountOutcome {
                account_id: account.to_string(),
                score: evaluation.score,
                risk_level: evaluation.risk_level,
                alert_generated: alert.is_some(),
            });
        }

        // First strictly-highest score wins, so ties go to the sender.
        let mut highest = &accounts[0];
        for outcome in &accounts[1..] {
            if outcome.score > highest.score {
                highest = outcome;
            }
        }
        let highest_risk = highest.account_id.clone();

        Ok(ProcessOutcome {
            tx_id: tx.id.clone(),
            accounts,
            highest_risk,
        })
    }

    /// Re-evaluate every known account and alert on all that qualify.
    pub fn full_analysis(&mut self) -> AmlResult<AnalysisReport> {
        let now = self.clock.now();
        let evaluations = self.evidence.evaluate_all(self.store.as_mut(), now)?;

        let mut bands = BandCounts::default();
        let mut alerts_created = 0;
        for evaluation in &evaluations {
            match evaluation.risk_level {
                RiskLevel::Normal => bands.normal += 1,
                RiskLevel::Suspicious => bands.suspicious += 1,
                RiskLevel::HighRisk => bands.high_risk += 1,
                RiskLevel::ProbableML => bands.probable_ml += 1,
            }
            if evaluation.score >= self.cfg.suspicious_band {
                let created = self.alerts.create_and_save(
                    &evaluation.account_id,
                    &self.evidence,
                    self.store.as_mut(),
                    now,
                )?;
                if created.is_some() {
                    alerts_created += 1;
                }
            }
        }

        let report = AnalysisReport {
            transactions: self.store.list_transactions()?.len(),
            accounts_evaluated: evaluations.len(),
            bands,
            alerts_created,
        };
        log::info!(
            "full analysis: {} accounts, {} suspicious, {} high risk, {} probable ML, {} alerts",
            report.accounts_evaluated,
            report.bands.suspicious,
            report.bands.high_risk,
            report.bands.probable_ml,
            report.alerts_created
        );
        Ok(report)
    }
}

/// Entry gate: reject malformed transactions before the store sees them.
fn validate(tx: &Transaction) -> AmlResult<()> {
    if tx.id.trim().is_empty() {
        return Err(invalid("transaction id is empty"));
    }
    if tx.sender.trim().is_empty() || tx.receiver.trim().is_empty() {
        return Err(invalid("sender and receiver are required"));
    }
    if tx.sender == tx.receiver {
        return Err(invalid("sender and receiver are the same account"));
    }
    if !(tx.amount > 0.0) {
        return Err(invalid("amount must be positive"));
    }
    Ok(())
}

fn invalid(reason: &str) -> AmlError {
    AmlError::InvalidTransaction {
        reason: reason.to_string(),
    }
}
