//! The four pattern matchers against crafted transaction sets.

use aml_core::baseline::{Baseline, BaselineEngine};
use aml_core::config::EngineConfig;
use aml_core::model::{Severity, Transaction};
use aml_core::pattern::{PatternDetection, PatternEngine};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().expect("valid instant")
}

fn tx(id: &str, sender: &str, receiver: &str, amount: f64, at: DateTime<Utc>) -> Transaction {
    Transaction::new(id, sender, receiver, amount, at)
}

fn engine() -> PatternEngine {
    PatternEngine::new(EngineConfig::default())
}

// ── Smurfing ─────────────────────────────────────────────────────────────────

/// Seven distinct senders each transfer $5,000 into one account across 30h.
#[test]
fn smurfing_fan_in_is_detected_and_clustered() {
    let t0 = base();
    let txs: Vec<Transaction> = (0..7)
        .map(|i| {
            tx(
                &format!("s{i}"),
                &format!("SENDER-{i}"),
                "R",
                5000.0,
                t0 + Duration::hours(i * 5),
            )
        })
        .collect();
    let now = t0 + Duration::hours(31);

    let detection = engine().detect_smurfing("R", &txs, now).expect("smurfing");
    match &detection {
        PatternDetection::Smurfing {
            unique_senders,
            inflow_count,
            clustered,
            ..
        } => {
            assert_eq!(*unique_senders, 7);
            assert_eq!(*inflow_count, 7);
            assert!(*clustered, "identical amounts cluster around the mean");
        }
        other => panic!("expected smurfing, got {other:?}"),
    }
    assert_eq!(detection.severity(), Severity::High);
}

#[test]
fn smurfing_needs_six_distinct_senders() {
    let t0 = base();
    let txs: Vec<Transaction> = (0..5)
        .map(|i| tx(&format!("s{i}"), &format!("S-{i}"), "R", 5000.0, t0 + Duration::hours(i)))
        .collect();
    assert!(engine().detect_smurfing("R", &txs, t0 + Duration::hours(6)).is_none());
}

#[test]
fn smurfing_ignores_inflows_outside_the_window() {
    let t0 = base();
    let mut txs: Vec<Transaction> = (0..5)
        .map(|i| tx(&format!("s{i}"), &format!("S-{i}"), "R", 5000.0, t0 + Duration::hours(i)))
        .collect();
    // Two more senders, but 3 days before the window.
    txs.push(tx("old1", "S-OLD-1", "R", 5000.0, t0 - Duration::days(3)));
    txs.push(tx("old2", "S-OLD-2", "R", 5000.0, t0 - Duration::days(3)));
    assert!(engine().detect_smurfing("R", &txs, t0 + Duration::hours(6)).is_none());
}

#[test]
fn smurfing_spread_amounts_are_not_clustered() {
    let t0 = base();
    let amounts = [500.0, 1500.0, 4000.0, 9000.0, 14000.0, 20000.0];
    let txs: Vec<Transaction> = amounts
        .iter()
        .enumerate()
        .map(|(i, &a)| tx(&format!("s{i}"), &format!("S-{i}"), "R", a, t0 + Duration::hours(i as i64)))
        .collect();
    let detection = engine()
        .detect_smurfing("R", &txs, t0 + Duration::hours(7))
        .expect("six senders still detect");
    match detection {
        PatternDetection::Smurfing { clustered, .. } => {
            assert!(!clustered, "widely spread amounts must not flag as clustered")
        }
        other => panic!("expected smurfing, got {other:?}"),
    }
}

// ── Layering ─────────────────────────────────────────────────────────────────

fn layering_fixture() -> Vec<Transaction> {
    let t0 = base();
    vec![
        tx("in1", "A", "X", 10_000.0, t0),
        tx("out1", "X", "B", 9_800.0, t0 + Duration::minutes(30)),
        tx("in2", "C", "X", 12_000.0, t0 + Duration::hours(2)),
        tx("out2", "X", "D", 11_900.0, t0 + Duration::hours(3)),
        tx("in3", "E", "X", 8_000.0, t0 + Duration::hours(5)),
        tx("out3", "X", "F", 8_000.0, t0 + Duration::hours(5) + Duration::minutes(30)),
    ]
}

/// Three in-out cycles of near-equal amounts inside the 2h window.
#[test]
fn layering_detects_three_rapid_cycles() {
    let detection = engine()
        .detect_layering("X", &layering_fixture())
        .expect("layering");
    match &detection {
        PatternDetection::Layering { cycle_count, cycles } => {
            assert_eq!(*cycle_count, 3);
            // Greedy first-match in inflow time order.
            assert_eq!(cycles[0].inflow_tx, "in1");
            assert_eq!(cycles[0].outflow_tx, "out1");
            assert_eq!(cycles[0].elapsed_mins, 30);
        }
        other => panic!("expected layering, got {other:?}"),
    }
    assert_eq!(detection.severity(), Severity::High);
}

#[test]
fn layering_breaks_when_an_amount_drifts_past_ten_percent() {
    let mut txs = layering_fixture();
    // 14,000 out against 12,000 in: 16.7% off, outside the tolerance.
    txs[3].amount = 14_000.0;
    assert!(engine().detect_layering("X", &txs).is_none(), "two cycles are not enough");
}

#[test]
fn layering_tolerance_boundary_is_strict() {
    let mut txs = layering_fixture();
    // Exactly 10% off: strict inequality, the cycle does not match.
    txs[3].amount = 13_200.0;
    assert!(engine().detect_layering("X", &txs).is_none());
}

#[test]
fn layering_outflow_must_follow_the_inflow() {
    let t0 = base();
    // Outflows precede their inflows: no cycles at all.
    let txs = vec![
        tx("out1", "X", "B", 10_000.0, t0),
        tx("in1", "A", "X", 10_000.0, t0 + Duration::minutes(30)),
        tx("out2", "X", "D", 9_000.0, t0 + Duration::hours(1)),
        tx("in2", "C", "X", 9_000.0, t0 + Duration::hours(1) + Duration::minutes(30)),
        tx("out3", "X", "F", 8_000.0, t0 + Duration::hours(2)),
        tx("in3", "E", "X", 8_000.0, t0 + Duration::hours(2) + Duration::minutes(30)),
    ];
    // in1 still matches out2 (later, near-equal? 9000 vs 10000 is 10% — strict, no).
    // No inflow finds a qualifying later outflow.
    assert!(engine().detect_layering("X", &txs).is_none());
}

// ── Structuring ──────────────────────────────────────────────────────────────

/// Four outflows parked under the threshold across three calendar days.
#[test]
fn structuring_drip_is_detected() {
    let t0 = base();
    let txs = vec![
        tx("o1", "Y", "D1", 9_200.0, t0),
        tx("o2", "Y", "D2", 9_400.0, t0 + Duration::days(1)),
        tx("o3", "Y", "D3", 9_500.0, t0 + Duration::days(1) + Duration::hours(4)),
        tx("o4", "Y", "D4", 9_300.0, t0 + Duration::days(2)),
    ];
    let now = t0 + Duration::days(3);
    let baseline = BaselineEngine::new().compute("Y", &txs, now);

    let detection = engine()
        .detect_structuring("Y", &txs, &baseline)
        .expect("structuring");
    match detection {
        PatternDetection::Structuring {
            count,
            threshold,
            average_amount,
            distinct_days,
        } => {
            assert_eq!(count, 4);
            assert_eq!(distinct_days, 3);
            assert!((average_amount - 9_350.0).abs() < 1e-9);
            assert!(threshold >= 10_000.0, "threshold floor is the reporting limit");
        }
        other => panic!("expected structuring, got {other:?}"),
    }
}

#[test]
fn structuring_needs_two_distinct_days() {
    let t0 = base();
    let txs: Vec<Transaction> = (0..4)
        .map(|i| tx(&format!("o{i}"), "Y", &format!("D{i}"), 9_300.0, t0 + Duration::hours(i)))
        .collect();
    let baseline = BaselineEngine::new().compute("Y", &txs, t0 + Duration::days(1));
    assert!(engine().detect_structuring("Y", &txs, &baseline).is_none());
}

#[test]
fn structuring_band_scales_with_the_typical_range() {
    let t0 = base();
    // Large p90 lifts the effective threshold: $9,300 outflows are no
    // longer "just under" it.
    let mut txs: Vec<Transaction> = (0..3)
        .map(|i| tx(&format!("o{i}"), "Y", &format!("D{i}"), 9_300.0, t0 + Duration::days(i)))
        .collect();
    for i in 0..10 {
        txs.push(tx(
            &format!("big{i}"),
            "W",
            "Y",
            50_000.0,
            t0 + Duration::days(i),
        ));
    }
    let baseline = BaselineEngine::new().compute("Y", &txs, t0 + Duration::days(11));
    assert!(baseline.typical_amount_range.1 >= 50_000.0);
    assert!(engine().detect_structuring("Y", &txs, &baseline).is_none());
}

// ── Income mismatch ──────────────────────────────────────────────────────────

fn aged_baseline(avg_daily_inflow: f64, age_days: i64) -> Baseline {
    let mut b = Baseline::default_for("M");
    b.avg_daily_inflow = avg_daily_inflow;
    b.account_age_days = age_days;
    b
}

#[test]
fn income_mismatch_flags_a_recent_surge() {
    let t0 = base();
    let txs: Vec<Transaction> = (0..5)
        .map(|i| tx(&format!("i{i}"), &format!("S-{i}"), "M", 700.0, t0 - Duration::days(i)))
        .collect();
    // 3,500 over 7 days = 500/day against a 100/day baseline: ratio 5.
    let detection = engine()
        .detect_income_mismatch("M", &txs, &aged_baseline(100.0, 30), t0)
        .expect("mismatch");
    match &detection {
        PatternDetection::IncomeMismatch { ratio, .. } => {
            assert!((*ratio - 5.0).abs() < 1e-9);
        }
        other => panic!("expected income mismatch, got {other:?}"),
    }
    assert_eq!(detection.severity(), Severity::Medium, "ratio 5 is not above 5");
}

#[test]
fn income_mismatch_ratio_above_five_is_high_severity() {
    let t0 = base();
    let txs: Vec<Transaction> = (0..5)
        .map(|i| tx(&format!("i{i}"), &format!("S-{i}"), "M", 1_500.0, t0 - Duration::days(i)))
        .collect();
    let detection = engine()
        .detect_income_mismatch("M", &txs, &aged_baseline(100.0, 30), t0)
        .expect("mismatch");
    assert_eq!(detection.severity(), Severity::High);
}

#[test]
fn income_mismatch_requires_week_old_account() {
    let t0 = base();
    let txs = vec![tx("i0", "S", "M", 10_000.0, t0 - Duration::days(1))];
    assert!(engine()
        .detect_income_mismatch("M", &txs, &aged_baseline(100.0, 5), t0)
        .is_none());
}

#[test]
fn income_mismatch_never_divides_by_a_zero_baseline() {
    let t0 = base();
    let txs = vec![tx("i0", "S", "M", 10_000.0, t0 - Duration::days(1))];
    assert!(engine()
        .detect_income_mismatch("M", &txs, &aged_baseline(0.0, 30), t0)
        .is_none());
}
