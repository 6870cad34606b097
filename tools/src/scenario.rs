//! Deterministic synthetic laundering scenarios.
//!
//! RULE: nothing here calls a platform RNG. All randomness flows through
//! one Pcg64Mcg stream derived from the run seed, so the same seed always
//! yields the same transaction set.

use aml_core::model::Transaction;
use chrono::{DateTime, Duration, Utc};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

pub struct ScenarioGenerator {
    rng: Pcg64Mcg,
    start: DateTime<Utc>,
    seq: i64,
}

impl ScenarioGenerator {
    pub fn new(seed: u64, start: DateTime<Utc>) -> Self {
        Self {
            rng: Pcg64Mcg::seed_from_u64(seed),
            start,
            seq: 0,
        }
    }

    /// Mint a transaction at `day`/`minute` of the horizon. The running
    /// sequence number lands in the millisecond part, which keeps the
    /// TX-<epoch-ms> ids unique.
    fn tx(&mut self, sender: &str, receiver: &str, amount: f64, day: i64, minute: i64) -> Transaction {
        let ts = self.start
            + Duration::days(day)
            + Duration::minutes(minute)
            + Duration::milliseconds(self.seq);
        self.seq += 1;
        Transaction::new(
            format!("TX-{}", ts.timestamp_millis()),
            sender,
            receiver,
            amount,
            ts,
        )
    }

    /// Ordinary commerce between the retail accounts: daytime transfers
    /// of unremarkable size.
    pub fn background(&mut self, accounts: usize, days: i64) -> Vec<Transaction> {
        let accounts = accounts.max(2);
        let mut txs = Vec::new();
        for day in 0..days {
            let count = self.rng.gen_range(2..6);
            for _ in 0..count {
                let from = self.rng.gen_range(0..accounts);
                let mut to = self.rng.gen_range(0..accounts);
                if to == from {
                    to = (to + 1) % accounts;
                }
                let amount = self.rng.gen_range(50.0..900.0);
                let minute = self.rng.gen_range(9 * 60..18 * 60);
                txs.push(self.tx(
                    &format!("ACCT-{from:03}"),
                    &format!("ACCT-{to:03}"),
                    amount,
                    day,
                    minute,
                ));
            }
        }
        txs
    }

    /// Many-to-one fan-in: `senders` distinct accounts each drip a
    /// near-equal amount into the target inside two days.
    pub fn smurfing_ring(&mut self, target: &str, senders: usize, day: i64) -> Vec<Transaction> {
        let base = self.rng.gen_range(4_000.0..6_000.0);
        (0..senders)
            .map(|i| {
                let amount = base * self.rng.gen_range(0.95..1.05);
                let minute = (i as i64) * 240; // spread across ~2 days
                self.tx(&format!("SMURF-{i:02}"), target, amount, day, minute)
            })
            .collect()
    }

    /// Rapid in-out cycles through a mule: each inflow leaves again within
    /// the hour at a near-equal amount.
    pub fn layering_chain(&mut self, mule: &str, cycles: usize, day: i64) -> Vec<Transaction> {
        let mut txs = Vec::new();
        for i in 0..cycles {
            let amount = self.rng.gen_range(8_000.0..15_000.0);
            let offset = (i as i64) * 180;
            txs.push(self.tx(&format!("LAYER-SRC-{i}"), mule, amount, day, offset));
            let out = amount * self.rng.gen_range(0.93..0.99);
            txs.push(self.tx(mule, &format!("LAYER-DST-{i}"), out, day, offset + 45));
        }
        txs
    }

    /// Outflows parked just under the reporting threshold across several
    /// days.
    pub fn structuring_drip(&mut self, source: &str, count: usize, day: i64) -> Vec<Transaction> {
        (0..count)
            .map(|i| {
                let amount = self.rng.gen_range(9_200.0..9_800.0);
                let minute = self.rng.gen_range(10 * 60..16 * 60);
                self.tx(
                    source,
                    &format!("STRUCT-DST-{i}"),
                    amount,
                    day + i as i64,
                    minute,
                )
            })
            .collect()
    }

    /// A three-hop loop returning the funds to their origin.
    pub fn circular_loop(&mut self, origin: &str, day: i64) -> Vec<Transaction> {
        let amount = self.rng.gen_range(1_000.0..3_000.0);
        vec![
            self.tx(origin, "CYCLE-B", amount, day, 0),
            self.tx("CYCLE-B", "CYCLE-C", amount, day, 60),
            self.tx("CYCLE-C", origin, amount, day, 120),
        ]
    }

    /// Wide fan-in/fan-out with same-day pass-through.
    pub fn hub(&mut self, hub: &str, spokes: usize, day: i64) -> Vec<Transaction> {
        let mut txs = Vec::new();
        for i in 0..spokes {
            let amount = self.rng.gen_range(1_500.0..4_000.0);
            let offset = (i as i64) * 90;
            txs.push(self.tx(&format!("HUB-IN-{i:02}"), hub, amount, day, offset));
            txs.push(self.tx(hub, &format!("HUB-OUT-{i:02}"), amount * 0.97, day, offset + 30));
        }
        txs
    }
}
