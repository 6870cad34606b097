//! Alert generation, deduplication, and the analyst patch workflow.

use aml_core::alert::{AlertEngine, AlertPatch, TimelineEventKind};
use aml_core::config::EngineConfig;
use aml_core::evidence::EvidenceEngine;
use aml_core::model::{AlertStatus, RiskLevel, Severity, Transaction};
use aml_core::store::{MemoryStore, Store};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().expect("valid instant")
}

fn tx(id: &str, sender: &str, receiver: &str, amount: f64, at: DateTime<Utc>) -> Transaction {
    Transaction::new(id, sender, receiver, amount, at)
}

fn engines() -> (EvidenceEngine, AlertEngine) {
    let cfg = EngineConfig::default();
    (EvidenceEngine::new(cfg.clone()), AlertEngine::new(cfg))
}

fn seed_circle(store: &mut MemoryStore) {
    let t0 = base();
    for t in [
        tx("e1", "A", "B", 1000.0, t0),
        tx("e2", "B", "C", 1000.0, t0 + Duration::hours(1)),
        tx("e3", "C", "A", 1000.0, t0 + Duration::hours(2)),
    ] {
        store.add_transaction(&t).expect("seed");
    }
}

#[test]
fn no_alert_below_the_suspicious_band() {
    let mut store = MemoryStore::new();
    store
        .add_transaction(&tx("t1", "A", "B", 100.0, base()))
        .expect("seed");
    let (evidence, alerts) = engines();
    let now = base() + Duration::hours(1);

    let evaluation = evidence.evaluate("A", &store, now).expect("evaluate");
    assert!(evaluation.score < 30);
    assert!(alerts.generate(&evaluation, now).is_none());
}

#[test]
fn alert_carries_the_explainable_breakdown() {
    let mut store = MemoryStore::new();
    seed_circle(&mut store);
    let (evidence, alerts) = engines();
    let now = base() + Duration::hours(3);

    let evaluation = evidence.evaluate("A", &store, now).expect("evaluate");
    let alert = alerts.generate(&evaluation, now).expect("alert");

    assert_eq!(alert.account_id, "A");
    assert_eq!(alert.score, 30);
    assert_eq!(alert.risk_level, RiskLevel::Suspicious);
    assert_eq!(alert.severity, Severity::Medium);
    assert_eq!(alert.status, AlertStatus::Open);
    assert!(alert.id.starts_with("ALERT-"), "id {}", alert.id);
    assert!(alert.summary.starts_with("A:"), "summary {}", alert.summary);
    assert!(alert.summary.contains("1 network signals"));
    assert_eq!(alert.evidence_breakdown.network_signals, 1);
    assert_eq!(alert.network_relationships.len(), 1);
    assert!(alert.behavior_summary.lines().count() >= 3);
    assert!(alert.analyst_comments.is_none());
}

#[test]
fn timeline_is_sorted_with_patterns_at_evaluation_time() {
    let t0 = base();
    let mut store = MemoryStore::new();
    // Smurfing fan-in: suspicious entries at their transaction times plus
    // a pattern event stamped "now".
    for i in 0..7 {
        store
            .add_transaction(&tx(
                &format!("s{i}"),
                &format!("S-{i}"),
                "R",
                5000.0,
                t0 + Duration::hours(i * 4),
            ))
            .expect("seed");
    }
    let (evidence, alerts) = engines();
    let now = t0 + Duration::hours(30);

    let evaluation = evidence.evaluate("R", &store, now).expect("evaluate");
    let alert = alerts.generate(&evaluation, now).expect("alert");

    assert!(!alert.timeline.is_empty());
    for pair in alert.timeline.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp, "timeline out of order");
    }
    let last = alert.timeline.last().expect("events");
    assert_eq!(last.kind, TimelineEventKind::PatternDetected);
    assert_eq!(last.timestamp, now);
}

#[test]
fn recommendations_follow_the_band() {
    let mut store = MemoryStore::new();
    seed_circle(&mut store);
    let (evidence, alerts) = engines();
    let now = base() + Duration::hours(3);

    let evaluation = evidence.evaluate("A", &store, now).expect("evaluate");
    let alert = alerts.generate(&evaluation, now).expect("alert");
    assert_eq!(alert.risk_level, RiskLevel::Suspicious);
    assert!(alert.recommendations[0].contains("monitoring"));

    // ProbableML band: SAR filing leads the list.
    let mut heavy = evaluation.clone();
    heavy.score = 90;
    heavy.risk_level = RiskLevel::ProbableML;
    let heavy_alert = alerts.generate(&heavy, now).expect("alert");
    assert_eq!(heavy_alert.severity, Severity::Critical);
    assert!(heavy_alert.recommendations[0].contains("Suspicious Activity Report"));
    assert!(heavy_alert
        .recommendations
        .iter()
        .any(|r| r.contains("freez")));
}

#[test]
fn severity_maps_from_the_risk_band() {
    assert_eq!(RiskLevel::Normal.severity(), Severity::Low);
    assert_eq!(RiskLevel::Suspicious.severity(), Severity::Medium);
    assert_eq!(RiskLevel::HighRisk.severity(), Severity::High);
    assert_eq!(RiskLevel::ProbableML.severity(), Severity::Critical);
}

#[test]
fn create_and_save_persists_once_inside_the_dedup_window() {
    let mut store = MemoryStore::new();
    seed_circle(&mut store);
    let (evidence, alerts) = engines();
    let now = base() + Duration::hours(3);

    let first = alerts
        .create_and_save("A", &evidence, &mut store, now)
        .expect("first call");
    assert!(first.is_some());

    // Ten minutes later: still inside the window, suppressed.
    let second = alerts
        .create_and_save("A", &evidence, &mut store, now + Duration::minutes(10))
        .expect("second call");
    assert!(second.is_none());

    let stored = store.list_alerts().expect("alerts");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].account_id, "A");
}

#[test]
fn a_new_alert_is_allowed_after_the_window_expires() {
    let mut store = MemoryStore::new();
    seed_circle(&mut store);
    let (evidence, alerts) = engines();
    let now = base() + Duration::hours(3);

    alerts
        .create_and_save("A", &evidence, &mut store, now)
        .expect("first call");
    let later = alerts
        .create_and_save("A", &evidence, &mut store, now + Duration::minutes(61))
        .expect("second call");
    assert!(later.is_some());
    assert_eq!(store.list_alerts().expect("alerts").len(), 2);
}

#[test]
fn alert_creation_writes_an_audit_entry() {
    let mut store = MemoryStore::new();
    seed_circle(&mut store);
    let (evidence, alerts) = engines();
    let now = base() + Duration::hours(3);

    let alert = alerts
        .create_and_save("A", &evidence, &mut store, now)
        .expect("call")
        .expect("alert");

    let audit = store.list_audit().expect("audit");
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].user, "system");
    assert_eq!(audit[0].action, "create_alert");
    assert!(
        audit[0].details.contains("MEDIUM alert for account A:"),
        "details {}",
        audit[0].details
    );
    assert!(audit[0].details.contains(&alert.summary));
    assert!(!audit[0].id.is_empty());
}

#[test]
fn analyst_patch_updates_status_and_comments() {
    let mut store = MemoryStore::new();
    seed_circle(&mut store);
    let (evidence, alerts) = engines();
    let now = base() + Duration::hours(3);

    let alert = alerts
        .create_and_save("A", &evidence, &mut store, now)
        .expect("call")
        .expect("alert");

    let patch = AlertPatch {
        status: Some(AlertStatus::SarFiled),
        analyst_comments: Some("escalated to compliance".to_string()),
    };
    store.update_alert(&alert.id, &patch).expect("patch");

    let stored = &store.list_alerts().expect("alerts")[0];
    assert_eq!(stored.status, AlertStatus::SarFiled);
    assert_eq!(stored.analyst_comments.as_deref(), Some("escalated to compliance"));

    // Unknown id is a typed error.
    assert!(store.update_alert("ALERT-0", &patch).is_err());
}
