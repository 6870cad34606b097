//! Baseline computation and deviation tests.

use aml_core::baseline::{Baseline, BaselineEngine, DeviationKind};
use aml_core::model::{Severity, Transaction};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().expect("valid instant")
}

fn tx(id: &str, sender: &str, receiver: &str, amount: f64, at: DateTime<Utc>) -> Transaction {
    Transaction::new(id, sender, receiver, amount, at)
}

#[test]
fn computes_per_day_statistics() {
    let t0 = base();
    let txs = vec![
        tx("t1", "X", "A", 100.0, t0),
        tx("t2", "Y", "A", 300.0, t0 + Duration::days(1)),
        tx("t3", "A", "Z", 200.0, t0 + Duration::days(2)),
    ];
    let now = t0 + Duration::days(4);

    let b = BaselineEngine::new().compute("A", &txs, now);

    assert_eq!(b.account_age_days, 4);
    assert_eq!(b.total_transactions, 3);
    assert!((b.avg_daily_inflow - 100.0).abs() < 1e-9, "inflow {}", b.avg_daily_inflow);
    assert!((b.avg_daily_outflow - 50.0).abs() < 1e-9, "outflow {}", b.avg_daily_outflow);
    assert!((b.avg_tx_frequency - 0.75).abs() < 1e-9);
    assert!((b.avg_unique_senders - 0.5).abs() < 1e-9);
    assert!((b.avg_unique_receivers - 0.25).abs() < 1e-9);
    assert_eq!(b.typical_amount_range, (100.0, 300.0));
}

#[test]
fn unseen_account_gets_default_baseline() {
    let txs = vec![tx("t1", "X", "A", 100.0, base())];
    let b = BaselineEngine::new().compute("NOBODY", &txs, base() + Duration::days(1));
    assert_eq!(b, Baseline::default_for("NOBODY"));
    assert_eq!(b.account_age_days, 0);
}

#[test]
fn account_age_is_floored_at_one_day() {
    let t0 = base();
    let txs = vec![tx("t1", "X", "A", 100.0, t0)];
    let b = BaselineEngine::new().compute("A", &txs, t0 + Duration::hours(2));
    assert_eq!(b.account_age_days, 1);
    // The per-day averages divide by the floored age.
    assert!((b.avg_daily_inflow - 100.0).abs() < 1e-9);
}

#[test]
fn percentiles_use_floored_indices() {
    let t0 = base();
    let txs: Vec<Transaction> = (0..10)
        .map(|i| {
            tx(
                &format!("t{i}"),
                "X",
                "A",
                (i + 1) as f64 * 100.0,
                t0 + Duration::hours(i),
            )
        })
        .collect();
    let b = BaselineEngine::new().compute("A", &txs, t0 + Duration::days(1));
    // n=10: p10 index 1, p90 index 9.
    assert_eq!(b.typical_amount_range, (200.0, 1000.0));
}

#[test]
fn outflow_far_above_average_is_an_amount_deviation() {
    let engine = BaselineEngine::new();
    let mut baseline = Baseline::default_for("A");
    baseline.avg_daily_outflow = 50.0;

    let medium = engine.check_deviation(&tx("t1", "A", "B", 200.0, base()), &baseline);
    assert!(medium.has_deviation);
    assert_eq!(medium.deviations[0].kind, DeviationKind::AmountDeviation);
    assert_eq!(medium.deviations[0].severity, Severity::Medium);

    let high = engine.check_deviation(&tx("t2", "A", "B", 300.0, base()), &baseline);
    assert_eq!(high.deviations[0].severity, Severity::High, "ratio 6x is high");
}

#[test]
fn ratio_at_threshold_is_not_a_deviation() {
    let engine = BaselineEngine::new();
    let mut baseline = Baseline::default_for("A");
    baseline.avg_daily_outflow = 100.0;
    // Exactly 3x: strict inequality, no deviation.
    let check = engine.check_deviation(&tx("t1", "A", "B", 300.0, base()), &baseline);
    assert!(!check.has_deviation);
}

#[test]
fn zero_outflow_baseline_reports_first_transaction() {
    let engine = BaselineEngine::new();
    let baseline = Baseline::default_for("A");
    let check = engine.check_deviation(&tx("t1", "A", "B", 100.0, base()), &baseline);
    assert!(check.has_deviation);
    assert_eq!(check.deviations[0].kind, DeviationKind::FirstTransaction);
    assert_eq!(check.deviations[0].severity, Severity::Medium);
}

#[test]
fn amount_beyond_typical_range_is_a_range_deviation() {
    let engine = BaselineEngine::new();
    let mut baseline = Baseline::default_for("A");
    baseline.typical_amount_range = (50.0, 100.0);
    // Receiver side: only the range test applies.
    let check = engine.check_deviation(&tx("t1", "X", "A", 200.0, base()), &baseline);
    assert_eq!(check.deviations.len(), 1);
    assert_eq!(check.deviations[0].kind, DeviationKind::RangeDeviation);

    let inside = engine.check_deviation(&tx("t2", "X", "A", 150.0, base()), &baseline);
    assert!(!inside.has_deviation, "1.5x the p90 is the strict boundary");
}

#[test]
fn recent_activity_filters_by_window() {
    let t0 = base();
    let txs = vec![
        tx("old", "A", "B", 100.0, t0 - Duration::hours(25)),
        tx("new", "C", "A", 100.0, t0 - Duration::hours(1)),
        tx("other", "C", "D", 100.0, t0 - Duration::hours(1)),
    ];
    let recent = BaselineEngine::new().recent_activity("A", &txs, 24, t0);
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, "new");
}
