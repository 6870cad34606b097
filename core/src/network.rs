//! Network — fund-flow graph analysis.
//!
//! The transaction list implies a directed multigraph: accounts are nodes,
//! transactions are edges. Three detectors:
//!   1. circular_flow — money returning to its origin through a cycle
//!   2. hub_account   — wide fan-in/fan-out with rapid pass-through
//!   3. flagged_links — edges to counterparties already rated high-risk
//!
//! Two or more signals mark the account as probable laundering.

use crate::{
    config::EngineConfig,
    model::{RiskLevel, Severity, Transaction},
    store::Store,
    types::{AccountId, TxId},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// ── Constants ────────────────────────────────────────────────────────────────

const CIRCULAR_MIN_PATH_LEN: usize = 3; // edges
const RAPID_REDISTRIBUTION_MIN: usize = 3;

// ── Data structures ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkDirection {
    Inbound,
    Outbound,
}

/// One transaction tying the account to a flagged counterparty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedLink {
    pub counterparty: AccountId,
    pub counterparty_risk: RiskLevel,
    pub tx_id: TxId,
    pub direction: LinkDirection,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum NetworkSignal {
    CircularFlow {
        /// Account chain, origin first and last.
        path: Vec<AccountId>,
        transaction_ids: Vec<TxId>,
        /// Number of edges in the cycle.
        length: usize,
        total_amount: f64,
    },
    HubAccount {
        unique_senders: usize,
        unique_receivers: usize,
        rapid_redistributions: usize,
    },
    FlaggedLinks {
        counterparties: Vec<AccountId>,
        links: Vec<FlaggedLink>,
    },
}

impl NetworkSignal {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CircularFlow { .. } => "circular_flow",
            Self::HubAccount { .. } => "hub_account",
            Self::FlaggedLinks { .. } => "flagged_links",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::CircularFlow { .. } | Self::HubAccount { .. } => Severity::Critical,
            Self::FlaggedLinks { .. } => Severity::High,
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::CircularFlow {
                path,
                length,
                total_amount,
                ..
            } => format!(
                "funds cycled back through {} in {length} hops (${total_amount:.2} moved)",
                path.join(" -> ")
            ),
            Self::HubAccount {
                unique_senders,
                unique_receivers,
                rapid_redistributions,
            } => format!(
                "hub with {unique_senders} senders and {unique_receivers} receivers, {rapid_redistributions} rapid redistributions"
            ),
            Self::FlaggedLinks {
                counterparties,
                links,
            } => format!(
                "{} transactions with {} flagged counterparties ({})",
                links.len(),
                counterparties.len(),
                counterparties.join(", ")
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkAnalysis {
    pub signals: Vec<NetworkSignal>,
    pub is_probable_ml: bool,
}

// ── Engine ───────────────────────────────────────────────────────────────────

pub struct NetworkEngine {
    cfg: EngineConfig,
}

impl NetworkEngine {
    pub fn new(cfg: EngineConfig) -> Self {
        Self { cfg }
    }

    pub fn analyze(
        &self,
        account: &str,
        txs: &[Transaction],
        store: &dyn Store,
    ) -> crate::error::AmlResult<NetworkAnalysis> {
        let mut signals = Vec::new();
        if let Some(sig) = self.detect_circular_flow(account, txs) {
            signals.push(sig);
        }
        if let Some(sig) = self.detect_hub(account, txs) {
            signals.push(sig);
        }
        if let Some(sig) = self.detect_flagged_links(account, txs, store)? {
            signals.push(sig);
        }
        for sig in &signals {
            log::info!("network signal {} for {account}: {}", sig.kind(), sig.description());
        }
        let is_probable_ml = signals.len() >= 2;
        Ok(NetworkAnalysis {
            signals,
            is_probable_ml,
        })
    }

    /// Depth-bounded DFS from `account`. An edge is traversable once per
    /// path (visited set keyed by transaction, not account), so accounts
    /// may repeat while loops through the same edge cannot. Emits the
    /// longest cycle of length >= 3 returning to the origin.
    pub fn detect_circular_flow(
        &self,
        account: &str,
        txs: &[Transaction],
    ) -> Option<NetworkSignal> {
        let mut adjacency: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, t) in txs.iter().enumerate() {
            adjacency.entry(t.sender.as_str()).or_default().push(i);
        }

        let mut visited = vec![false; txs.len()];
        let mut path: Vec<usize> = Vec::with_capacity(self.cfg.max_path_depth);
        let mut best: Option<Vec<usize>> = None;
        self.walk(account, account, txs, &adjacency, &mut visited, &mut path, &mut best);

        let best = best?;
        let mut chain = vec![account.to_string()];
        chain.extend(best.iter().map(|&i| txs[i].receiver.clone()));
        Some(NetworkSignal::CircularFlow {
            length: best.len(),
            total_amount: best.iter().map(|&i| txs[i].amount).sum(),
            transaction_ids: best.iter().map(|&i| txs[i].id.clone()).collect(),
            path: chain,
        })
    }

    fn walk(
        &self,
        origin: &str,
        current: &str,
        txs: &[Transaction],
        adjacency: &HashMap<&str, Vec<usize>>,
        visited: &mut Vec<bool>,
        path: &mut Vec<usize>,
        best: &mut Option<Vec<usize>>,
    ) {
        if path.len() >= self.cfg.max_path_depth {
            return;
        }
        let Some(edges) = adjacency.get(current) else {
            return;
        };
        for &i in edges {
            if visited[i] {
                continue;
            }
            visited[i] = true;
            path.push(i);

            let next = txs[i].receiver.as_str();
            if next == origin && path.len() >= CIRCULAR_MIN_PATH_LEN {
                let longer = best.as_ref().map_or(true, |b| path.len() > b.len());
                if longer {
                    *best = Some(path.clone());
                }
            }
            self.walk(origin, next, txs, adjacency, visited, path, best);

            path.pop();
            visited[i] = false;
        }
    }

    /// Hub: at least `hub_min_counterparties` distinct senders and
    /// receivers, with enough inflows redistributed inside the rapid
    /// window. An inflow is rapid when some later outflow follows it
    /// within the window; one outflow may be credited to many inflows.
    pub fn detect_hub(&self, account: &str, txs: &[Transaction]) -> Option<NetworkSignal> {
        let inflows: Vec<&Transaction> =
            txs.iter().filter(|t| t.receiver == account).collect();
        let outflows: Vec<&Transaction> =
            txs.iter().filter(|t| t.sender == account).collect();

        let senders: HashSet<&str> = inflows.iter().map(|t| t.sender.as_str()).collect();
        let receivers: HashSet<&str> = outflows.iter().map(|t| t.receiver.as_str()).collect();
        if senders.len() < self.cfg.hub_min_counterparties
            || receivers.len() < self.cfg.hub_min_counterparties
        {
            return None;
        }

        let window = Duration::hours(self.cfg.rapid_redistribution_window_hours);
        let rapid = inflows
            .iter()
            .filter(|inflow| {
                outflows.iter().any(|o| {
                    o.timestamp > inflow.timestamp && o.timestamp - inflow.timestamp < window
                })
            })
            .count();
        if rapid < RAPID_REDISTRIBUTION_MIN {
            return None;
        }

        Some(NetworkSignal::HubAccount {
            unique_senders: senders.len(),
            unique_receivers: receivers.len(),
            rapid_redistributions: rapid,
        })
    }

    /// Edges between `account` and counterparties whose persisted evidence
    /// sits in a flagged band (HighRisk or ProbableML), either direction.
    pub fn detect_flagged_links(
        &self,
        account: &str,
        txs: &[Transaction],
        store: &dyn Store,
    ) -> crate::error::AmlResult<Option<NetworkSignal>> {
        let flagged: HashMap<AccountId, RiskLevel> = store
            .all_evidence()?
            .into_iter()
            .filter(|(_, ev)| ev.risk_level.is_flagged())
            .map(|(id, ev)| (id, ev.risk_level))
            .collect();
        if flagged.is_empty() {
            return Ok(None);
        }

        let mut links = Vec::new();
        for t in txs {
            if t.sender == account {
                if let Some(&risk) = flagged.get(t.receiver.as_str()) {
                    links.push(FlaggedLink {
                        counterparty: t.receiver.clone(),
                        counterparty_risk: risk,
                        tx_id: t.id.clone(),
                        direction: LinkDirection::Outbound,
                        amount: t.amount,
                        timestamp: t.timestamp,
                    });
                }
            } else if t.receiver == account {
                if let Some(&risk) = flagged.get(t.sender.as_str()) {
                    links.push(FlaggedLink {
                        counterparty: t.sender.clone(),
                        counterparty_risk: risk,
                        tx_id: t.id.clone(),
                        direction: LinkDirection::Inbound,
                        amount: t.amount,
                        timestamp: t.timestamp,
                    });
                }
            }
        }
        if links.is_empty() {
            return Ok(None);
        }

        let mut counterparties: Vec<AccountId> =
            links.iter().map(|l| l.counterparty.clone()).collect();
        counterparties.sort();
        counterparties.dedup();
        Ok(Some(NetworkSignal::FlaggedLinks {
            counterparties,
            links,
        }))
    }
}
