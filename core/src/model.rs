//! Shared domain records: transactions, risk tiers, persisted evidence.
//!
//! Everything here is a plain value. Transactions are immutable once
//! ingested; evidence records are overwritten per account on every
//! re-evaluation; audit records are append-only.

use crate::types::{AccountId, TxId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Transaction ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    pub sender: AccountId,
    pub receiver: AccountId,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
    // Pass-through fields. The detectors never read them.
    #[serde(default)]
    pub bank_account: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl Transaction {
    pub fn new(
        id: impl Into<TxId>,
        sender: impl Into<AccountId>,
        receiver: impl Into<AccountId>,
        amount: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
            timestamp,
            bank_account: None,
            currency: None,
            country: None,
        }
    }

    /// Does this transaction involve `account` on either side?
    pub fn touches(&self, account: &str) -> bool {
        self.sender == account || self.receiver == account
    }
}

// ── Risk tiers ───────────────────────────────────────────────────────────────

/// Risk band an account's score falls into. Ordering follows severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Normal,
    Suspicious,
    HighRisk,
    ProbableML,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Suspicious => "suspicious",
            Self::HighRisk => "high_risk",
            Self::ProbableML => "probable_ml",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "normal" => Some(Self::Normal),
            "suspicious" => Some(Self::Suspicious),
            "high_risk" => Some(Self::HighRisk),
            "probable_ml" => Some(Self::ProbableML),
            _ => None,
        }
    }

    /// Alert severity for an account in this band.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Normal => Severity::Low,
            Self::Suspicious => Severity::Medium,
            Self::HighRisk => Severity::High,
            Self::ProbableML => Severity::Critical,
        }
    }

    /// Flagged for network purposes: counterparties in these bands taint
    /// the accounts they trade with.
    pub fn is_flagged(&self) -> bool {
        matches!(self, Self::HighRisk | Self::ProbableML)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Open,
    Closed,
    SarFiled,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::SarFiled => "sar_filed",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            "sar_filed" => Some(Self::SarFiled),
            _ => None,
        }
    }
}

// ── Persisted evidence ───────────────────────────────────────────────────────

/// Per-account evidence record. Overwritten on every re-evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountEvidence {
    pub score: u32,
    pub risk_level: RiskLevel,
    pub suspicious_transactions: usize,
    pub confirmed_patterns: usize,
    pub network_signals: usize,
    pub is_probable_ml: bool,
    pub last_updated: DateTime<Utc>,
}

// ── Audit ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub action: String,
    pub details: String,
}
