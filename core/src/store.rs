//! Persistence layer.
//!
//! RULE: Only this module talks to the database. Detection components call
//! store methods — they never execute SQL directly.
//!
//! The `Store` trait is the narrow contract the engine consumes. Two
//! implementations ship: `MemoryStore` for tests and embedded use, and
//! `SqliteStore` for durable deployments. Transaction and alert lists are
//! observed newest-first; account evidence is a keyed mapping.
//!
//! The unit-of-work methods make one `process()` call atomic: everything
//! between `begin_unit` and `commit_unit` either lands together or is
//! rolled back together.

use crate::{
    alert::{Alert, AlertPatch},
    error::{AmlError, AmlResult},
    model::{AccountEvidence, AlertStatus, AuditRecord, RiskLevel, Severity, Transaction},
    types::AccountId,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;

// ── Contract ─────────────────────────────────────────────────────────────────

pub trait Store {
    /// Prepend to the transaction list.
    fn add_transaction(&mut self, tx: &Transaction) -> AmlResult<()>;
    /// All transactions, newest first.
    fn list_transactions(&self) -> AmlResult<Vec<Transaction>>;
    /// Overwrite a transaction by id.
    fn update_transaction(&mut self, tx: &Transaction) -> AmlResult<()>;

    fn get_evidence(&self, account_id: &str) -> AmlResult<Option<AccountEvidence>>;
    fn put_evidence(&mut self, account_id: &str, evidence: &AccountEvidence) -> AmlResult<()>;
    /// Every persisted evidence record, ordered by account id.
    fn all_evidence(&self) -> AmlResult<Vec<(AccountId, AccountEvidence)>>;

    /// All alerts, newest first.
    fn list_alerts(&self) -> AmlResult<Vec<Alert>>;
    fn append_alert(&mut self, alert: &Alert) -> AmlResult<()>;
    fn update_alert(&mut self, alert_id: &str, patch: &AlertPatch) -> AmlResult<()>;

    /// Append a timestamped audit record. Ids are random opaque.
    fn log_audit(&mut self, user: &str, action: &str, details: &str) -> AmlResult<()>;
    /// All audit records, newest first.
    fn list_audit(&self) -> AmlResult<Vec<AuditRecord>>;

    fn begin_unit(&mut self) -> AmlResult<()>;
    fn commit_unit(&mut self) -> AmlResult<()>;
    fn rollback_unit(&mut self) -> AmlResult<()>;
}

fn parse_ts(raw: &str) -> AmlResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

fn parse_risk(code: &str) -> AmlResult<RiskLevel> {
    RiskLevel::parse(code).ok_or_else(|| AmlError::UnknownCode {
        kind: "risk_level",
        code: code.to_string(),
    })
}

// ── MemoryStore ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct MemoryState {
    transactions: Vec<Transaction>,
    evidence: HashMap<AccountId, AccountEvidence>,
    alerts: Vec<Alert>,
    audit: Vec<AuditRecord>,
}

/// In-memory store. Prepend semantics are literal: index 0 is newest.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: MemoryState,
    checkpoint: Option<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn add_transaction(&mut self, tx: &Transaction) -> AmlResult<()> {
        self.state.transactions.insert(0, tx.clone());
        Ok(())
    }

    fn list_transactions(&self) -> AmlResult<Vec<Transaction>> {
        Ok(self.state.transactions.clone())
    }

    fn update_transaction(&mut self, tx: &Transaction) -> AmlResult<()> {
        match self.state.transactions.iter_mut().find(|t| t.id == tx.id) {
            Some(slot) => {
                *slot = tx.clone();
                Ok(())
            }
            None => Err(AmlError::NotFound {
                kind: "transaction",
                id: tx.id.clone(),
            }),
        }
    }

    fn get_evidence(&self, account_id: &str) -> AmlResult<Option<AccountEvidence>> {
        Ok(self.state.evidence.get(account_id).cloned())
    }

    fn put_evidence(&mut self, account_id: &str, evidence: &AccountEvidence) -> AmlResult<()> {
        self.state
            .evidence
            .insert(account_id.to_string(), evidence.clone());
        Ok(())
    }

    fn all_evidence(&self) -> AmlResult<Vec<(AccountId, AccountEvidence)>> {
        let mut records: Vec<(AccountId, AccountEvidence)> = self
            .state
            .evidence
            .iter()
            .map(|(id, ev)| (id.clone(), ev.clone()))
            .collect();
        records.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(records)
    }

    fn list_alerts(&self) -> AmlResult<Vec<Alert>> {
        Ok(self.state.alerts.clone())
    }

    fn append_alert(&mut self, alert: &Alert) -> AmlResult<()> {
        self.state.alerts.insert(0, alert.clone());
        Ok(())
    }

    fn update_alert(&mut self, alert_id: &str, patch: &AlertPatch) -> AmlResult<()> {
        match self.state.alerts.iter_mut().find(|a| a.id == alert_id) {
            Some(alert) => {
                patch.apply(alert);
                Ok(())
            }
            None => Err(AmlError::NotFound {
                kind: "alert",
                id: alert_id.to_string(),
            }),
        }
    }

    fn log_audit(&mut self, user: &str, action: &str, details: &str) -> AmlResult<()> {
        self.state.audit.insert(
            0,
            AuditRecord {
                id: uuid::Uuid::new_v4().to_string(),
                timestamp: Utc::now(),
                user: user.to_string(),
                action: action.to_string(),
                details: details.to_string(),
            },
        );
        Ok(())
    }

    fn list_audit(&self) -> AmlResult<Vec<AuditRecord>> {
        Ok(self.state.audit.clone())
    }

    fn begin_unit(&mut self) -> AmlResult<()> {
        self.checkpoint = Some(self.state.clone());
        Ok(())
    }

    fn commit_unit(&mut self) -> AmlResult<()> {
        self.checkpoint = None;
        Ok(())
    }

    fn rollback_unit(&mut self) -> AmlResult<()> {
        if let Some(saved) = self.checkpoint.take() {
            self.state = saved;
        }
        Ok(())
    }
}

// ── SqliteStore ──────────────────────────────────────────────────────────────

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &str) -> AmlResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only matters for real files; :memory: ignores it.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> AmlResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply the schema.
    pub fn migrate(&self) -> AmlResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_core.sql"))?;
        Ok(())
    }
}

impl Store for SqliteStore {
    fn add_transaction(&mut self, tx: &Transaction) -> AmlResult<()> {
        self.conn.execute(
            "INSERT INTO transactions (tx_id, sender, receiver, amount, ts, bank_account, currency, country)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                tx.id,
                tx.sender,
                tx.receiver,
                tx.amount,
                tx.timestamp.to_rfc3339(),
                tx.bank_account,
                tx.currency,
                tx.country,
            ],
        )?;
        Ok(())
    }

    fn list_transactions(&self) -> AmlResult<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(
            "SELECT tx_id, sender, receiver, amount, ts, bank_account, currency, country
             FROM transactions ORDER BY seq DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, sender, receiver, amount, ts, bank_account, currency, country)| {
                Ok(Transaction {
                    id,
                    sender,
                    receiver,
                    amount,
                    timestamp: parse_ts(&ts)?,
                    bank_account,
                    currency,
                    country,
                })
            })
            .collect()
    }

    fn update_transaction(&mut self, tx: &Transaction) -> AmlResult<()> {
        let changed = self.conn.execute(
            "UPDATE transactions
             SET sender = ?2, receiver = ?3, amount = ?4, ts = ?5,
                 bank_account = ?6, currency = ?7, country = ?8
             WHERE tx_id = ?1",
            params![
                tx.id,
                tx.sender,
                tx.receiver,
                tx.amount,
                tx.timestamp.to_rfc3339(),
                tx.bank_account,
                tx.currency,
                tx.country,
            ],
        )?;
        if changed == 0 {
            return Err(AmlError::NotFound {
                kind: "transaction",
                id: tx.id.clone(),
            });
        }
        Ok(())
    }

    fn get_evidence(&self, account_id: &str) -> AmlResult<Option<AccountEvidence>> {
        let row = self
            .conn
            .query_row(
                "SELECT score, risk_level, suspicious_transactions, confirmed_patterns,
                        network_signals, is_probable_ml, last_updated
                 FROM account_evidence WHERE account_id = ?1",
                params![account_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, bool>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((score, risk, sus, pat, net, probable, updated)) => Ok(Some(AccountEvidence {
                score: score as u32,
                risk_level: parse_risk(&risk)?,
                suspicious_transactions: sus as usize,
                confirmed_patterns: pat as usize,
                network_signals: net as usize,
                is_probable_ml: probable,
                last_updated: parse_ts(&updated)?,
            })),
        }
    }

    fn put_evidence(&mut self, account_id: &str, evidence: &AccountEvidence) -> AmlResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO account_evidence
             (account_id, score, risk_level, suspicious_transactions, confirmed_patterns,
              network_signals, is_probable_ml, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                account_id,
                evidence.score as i64,
                evidence.risk_level.as_str(),
                evidence.suspicious_transactions as i64,
                evidence.confirmed_patterns as i64,
                evidence.network_signals as i64,
                evidence.is_probable_ml,
                evidence.last_updated.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn all_evidence(&self) -> AmlResult<Vec<(AccountId, AccountEvidence)>> {
        let mut stmt = self.conn.prepare(
            "SELECT account_id, score, risk_level, suspicious_transactions, confirmed_patterns,
                    network_signals, is_probable_ml, last_updated
             FROM account_evidence ORDER BY account_id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, bool>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, score, risk, sus, pat, net, probable, updated)| {
                Ok((
                    id,
                    AccountEvidence {
                        score: score as u32,
                        risk_level: parse_risk(&risk)?,
                        suspicious_transactions: sus as usize,
                        confirmed_patterns: pat as usize,
                        network_signals: net as usize,
                        is_probable_ml: probable,
                        last_updated: parse_ts(&updated)?,
                    },
                ))
            })
            .collect()
    }

    fn list_alerts(&self) -> AmlResult<Vec<Alert>> {
        let mut stmt = self.conn.prepare(
            "SELECT alert_id, account_id, severity, risk_level, score, ts, status, summary,
                    behavior_summary, detected_patterns, timeline, network_relationships,
                    evidence_breakdown, recommendations, analyst_comments
             FROM alerts ORDER BY seq DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RawAlertRow {
                    alert_id: row.get(0)?,
                    account_id: row.get(1)?,
                    severity: row.get(2)?,
                    risk_level: row.get(3)?,
                    score: row.get(4)?,
                    ts: row.get(5)?,
                    status: row.get(6)?,
                    summary: row.get(7)?,
                    behavior_summary: row.get(8)?,
                    detected_patterns: row.get(9)?,
                    timeline: row.get(10)?,
                    network_relationships: row.get(11)?,
                    evidence_breakdown: row.get(12)?,
                    recommendations: row.get(13)?,
                    analyst_comments: row.get(14)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(RawAlertRow::into_alert).collect()
    }

    fn append_alert(&mut self, alert: &Alert) -> AmlResult<()> {
        self.conn.execute(
            "INSERT INTO alerts
             (alert_id, account_id, severity, risk_level, score, ts, status, summary,
              behavior_summary, detected_patterns, timeline, network_relationships,
              evidence_breakdown, recommendations, analyst_comments)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                alert.id,
                alert.account_id,
                alert.severity.as_str(),
                alert.risk_level.as_str(),
                alert.score as i64,
                alert.timestamp.to_rfc3339(),
                alert.status.as_str(),
                alert.summary,
                alert.behavior_summary,
                serde_json::to_string(&alert.detected_patterns)?,
                serde_json::to_string(&alert.timeline)?,
                serde_json::to_string(&alert.network_relationships)?,
                serde_json::to_string(&alert.evidence_breakdown)?,
                serde_json::to_string(&alert.recommendations)?,
                alert.analyst_comments,
            ],
        )?;
        Ok(())
    }

    fn update_alert(&mut self, alert_id: &str, patch: &AlertPatch) -> AmlResult<()> {
        let changed = self.conn.execute(
            "UPDATE alerts
             SET status = COALESCE(?2, status),
                 analyst_comments = COALESCE(?3, analyst_comments)
             WHERE alert_id = ?1",
            params![
                alert_id,
                patch.status.map(|s| s.as_str()),
                patch.analyst_comments,
            ],
        )?;
        if changed == 0 {
            return Err(AmlError::NotFound {
                kind: "alert",
                id: alert_id.to_string(),
            });
        }
        Ok(())
    }

    fn log_audit(&mut self, user: &str, action: &str, details: &str) -> AmlResult<()> {
        self.conn.execute(
            "INSERT INTO audit_log (audit_id, ts, user, action, details)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                uuid::Uuid::new_v4().to_string(),
                Utc::now().to_rfc3339(),
                user,
                action,
                details,
            ],
        )?;
        Ok(())
    }

    fn list_audit(&self) -> AmlResult<Vec<AuditRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT audit_id, ts, user, action, details FROM audit_log ORDER BY seq DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, ts, user, action, details)| {
                Ok(AuditRecord {
                    id,
                    timestamp: parse_ts(&ts)?,
                    user,
                    action,
                    details,
                })
            })
            .collect()
    }

    fn begin_unit(&mut self) -> AmlResult<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        Ok(())
    }

    fn commit_unit(&mut self) -> AmlResult<()> {
        self.conn.execute_batch("COMMIT;")?;
        Ok(())
    }

    fn rollback_unit(&mut self) -> AmlResult<()> {
        self.conn.execute_batch("ROLLBACK;")?;
        Ok(())
    }
}

struct RawAlertRow {
    alert_id: String,
    account_id: String,
    severity: String,
    risk_level: String,
    score: i64,
    ts: String,
    status: String,
    summary: String,
    behavior_summary: String,
    detected_patterns: String,
    timeline: String,
    network_relationships: String,
    evidence_breakdown: String,
    recommendations: String,
    analyst_comments: Option<String>,
}

impl RawAlertRow {
    fn into_alert(self) -> AmlResult<Alert> {
        Ok(Alert {
            id: self.alert_id,
            account_id: self.account_id,
            severity: Severity::parse(&self.severity).ok_or_else(|| AmlError::UnknownCode {
                kind: "severity",
                code: self.severity.clone(),
            })?,
            risk_level: parse_risk(&self.risk_level)?,
            score: self.score as u32,
            timestamp: parse_ts(&self.ts)?,
            status: AlertStatus::parse(&self.status).ok_or_else(|| AmlError::UnknownCode {
                kind: "alert_status",
                code: self.status.clone(),
            })?,
            summary: self.summary,
            behavior_summary: self.behavior_summary,
            detected_patterns: serde_json::from_str(&self.detected_patterns)?,
            timeline: serde_json::from_str(&self.timeline)?,
            network_relationships: serde_json::from_str(&self.network_relationships)?,
            evidence_breakdown: serde_json::from_str(&self.evidence_breakdown)?,
            recommendations: serde_json::from_str(&self.recommendations)?,
            analyst_comments: self.analyst_comments,
        })
    }
}
