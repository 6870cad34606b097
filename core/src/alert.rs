//! Alert — explainable alert construction, deduplication, persistence.
//!
//! An alert is the forensic artifact: the score says how bad, the
//! breakdown says why. Alerts exist only for accounts at or above the
//! Suspicious band, and an account gets at most one alert per dedup
//! window.

use crate::{
    config::EngineConfig,
    error::AmlResult,
    evidence::{Evaluation, EvidenceEngine},
    model::{AlertStatus, RiskLevel, Severity},
    network::NetworkSignal,
    pattern::PatternDetection,
    store::Store,
    types::AccountId,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ── Data structures ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: TimelineEventKind,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventKind {
    SuspiciousTransaction,
    PatternDetected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBreakdown {
    pub suspicious_transactions: usize,
    pub confirmed_patterns: usize,
    pub network_signals: usize,
    pub is_probable_ml: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub account_id: AccountId,
    pub severity: Severity,
    pub risk_level: RiskLevel,
    pub score: u32,
    pub timestamp: DateTime<Utc>,
    pub status: AlertStatus,
    /// One line: account id plus the counts that drove the score.
    pub summary: String,
    /// Multi-line account profile from the baseline.
    pub behavior_summary: String,
    pub detected_patterns: Vec<PatternDetection>,
    pub timeline: Vec<TimelineEvent>,
    pub network_relationships: Vec<NetworkSignal>,
    pub evidence_breakdown: EvidenceBreakdown,
    pub recommendations: Vec<String>,
    /// Populated by the analyst workflow, never by the engine.
    pub analyst_comments: Option<String>,
}

/// Partial update applied by the analyst workflow via `Store::update_alert`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertPatch {
    pub status: Option<AlertStatus>,
    pub analyst_comments: Option<String>,
}

impl AlertPatch {
    pub fn apply(&self, alert: &mut Alert) {
        if let Some(status) = self.status {
            alert.status = status;
        }
        if let Some(comments) = &self.analyst_comments {
            alert.analyst_comments = Some(comments.clone());
        }
    }
}

// ── Engine ───────────────────────────────────────────────────────────────────

pub struct AlertEngine {
    cfg: EngineConfig,
}

impl AlertEngine {
    pub fn new(cfg: EngineConfig) -> Self {
        Self { cfg }
    }

    /// Build an alert from an evaluation. Returns None below the
    /// Suspicious band.
    pub fn generate(&self, evaluation: &Evaluation, now: DateTime<Utc>) -> Option<Alert> {
        if evaluation.score < self.cfg.suspicious_band {
            return None;
        }

        let mut timeline: Vec<TimelineEvent> = evaluation
            .suspicious
            .iter()
            .map(|s| TimelineEvent {
                timestamp: s.transaction.timestamp,
                kind: TimelineEventKind::SuspiciousTransaction,
                description: s.description.clone(),
            })
            .collect();
        timeline.extend(evaluation.patterns.iter().map(|p| TimelineEvent {
            timestamp: now,
            kind: TimelineEventKind::PatternDetected,
            description: format!("{} pattern detected: {}", p.kind(), p.description()),
        }));
        timeline.sort_by_key(|e| e.timestamp);

        Some(Alert {
            id: format!("ALERT-{}", now.timestamp_millis()),
            account_id: evaluation.account_id.clone(),
            severity: evaluation.risk_level.severity(),
            risk_level: evaluation.risk_level,
            score: evaluation.score,
            timestamp: now,
            status: AlertStatus::Open,
            summary: self.summary_line(evaluation),
            behavior_summary: self.behavior_summary(evaluation),
            detected_patterns: evaluation.patterns.clone(),
            timeline,
            network_relationships: evaluation.network.signals.clone(),
            evidence_breakdown: EvidenceBreakdown {
                suspicious_transactions: evaluation.suspicious.len(),
                confirmed_patterns: evaluation.patterns.len(),
                network_signals: evaluation.network.signals.len(),
                is_probable_ml: evaluation.network.is_probable_ml,
            },
            recommendations: self.recommendations(evaluation.risk_level),
            analyst_comments: None,
        })
    }

    /// Evaluate, generate, dedup against the account's recent alerts,
    /// persist, and write the audit entry. Returns None when the score is
    /// below the band or a recent alert already covers the account.
    pub fn create_and_save(
        &self,
        account: &str,
        evidence: &EvidenceEngine,
        store: &mut dyn Store,
        now: DateTime<Utc>,
    ) -> AmlResult<Option<Alert>> {
        let evaluation = evidence.evaluate(account, &*store, now)?;
        let Some(alert) = self.generate(&evaluation, now) else {
            return Ok(None);
        };

        let cutoff = now - Duration::seconds(self.cfg.dedup_window_secs);
        let duplicate = store
            .list_alerts()?
            .iter()
            .any(|a| a.account_id == account && a.timestamp > cutoff);
        if duplicate {
            log::debug!("alert for {account} suppressed: one exists inside the dedup window");
            return Ok(None);
        }

        store.append_alert(&alert)?;
        store.log_audit(
            "system",
            "create_alert",
            &format!(
                "{} alert for account {}: {}",
                alert.severity.as_str().to_uppercase(),
                account,
                alert.summary
            ),
        )?;
        log::warn!(
            "{} alert {} for account {} (score {})",
            alert.severity.as_str(),
            alert.id,
            account,
            alert.score
        );
        Ok(Some(alert))
    }

    fn summary_line(&self, evaluation: &Evaluation) -> String {
        let mut facts = vec![format!(
            "{} suspicious transactions",
            evaluation.suspicious.len()
        )];
        if evaluation.patterns.is_empty() {
            facts.push("no confirmed patterns".to_string());
        } else {
            let kinds: Vec<&str> = evaluation.patterns.iter().map(|p| p.kind()).collect();
            facts.push(format!("patterns: {}", kinds.join("/")));
        }
        facts.push(format!(
            "{} network signals",
            evaluation.network.signals.len()
        ));
        format!("{}: {}", evaluation.account_id, facts.join(", "))
    }

    fn behavior_summary(&self, evaluation: &Evaluation) -> String {
        let b = &evaluation.baseline;
        let (p10, p90) = b.typical_amount_range;
        [
            format!(
                "Account {} is {} days old with {} transactions on record.",
                b.account_id, b.account_age_days, b.total_transactions
            ),
            format!(
                "Average daily inflow ${:.2}, outflow ${:.2}, {:.2} transactions/day.",
                b.avg_daily_inflow, b.avg_daily_outflow, b.avg_tx_frequency
            ),
            format!(
                "Typical amount range ${:.2} to ${:.2} (p10-p90).",
                p10, p90
            ),
            format!(
                "Average unique counterparties/day: {:.2} senders, {:.2} receivers.",
                b.avg_unique_senders, b.avg_unique_receivers
            ),
        ]
        .join("\n")
    }

    fn recommendations(&self, risk_level: RiskLevel) -> Vec<String> {
        match risk_level {
            RiskLevel::ProbableML => vec![
                "File a Suspicious Activity Report".to_string(),
                "Escalate to the compliance officer immediately".to_string(),
                "Consider freezing the account pending investigation".to_string(),
            ],
            RiskLevel::HighRisk => vec![
                "Apply enhanced due diligence".to_string(),
                "Schedule a compliance review".to_string(),
                "Monitor account activity closely".to_string(),
            ],
            RiskLevel::Suspicious => vec![
                "Continue monitoring account activity".to_string(),
                "Document findings for the case file".to_string(),
                "Escalate if further evidence accumulates".to_string(),
            ],
            RiskLevel::Normal => Vec::new(),
        }
    }
}
