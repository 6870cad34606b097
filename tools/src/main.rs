//! aml-runner: headless batch runner for the AML detection engine.
//!
//! Usage:
//!   aml-runner --seed 12345 --accounts 20 --days 14
//!   aml-runner --seed 12345 --db run.db --json

mod scenario;

use aml_core::{
    clock::EngineClock,
    config::EngineConfig,
    pipeline::AmlPipeline,
    store::{MemoryStore, SqliteStore, Store},
};
use anyhow::Result;
use chrono::{Duration, TimeZone, Utc};
use scenario::ScenarioGenerator;
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let accounts = parse_arg(&args, "--accounts", 20usize);
    let days = parse_arg(&args, "--days", 14i64);
    let json = args.iter().any(|a| a == "--json");
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].clone());
    let config = args
        .windows(2)
        .find(|w| w[0] == "--config")
        .map(|w| EngineConfig::load(&w[1]))
        .transpose()?
        .unwrap_or_default();

    if !json {
        println!("aml-runner");
        println!("  seed:     {seed}");
        println!("  accounts: {accounts}");
        println!("  days:     {days}");
        println!("  db:       {}", db.as_deref().unwrap_or("(memory)"));
        println!();
    }

    let store: Box<dyn Store> = match &db {
        Some(path) => {
            let store = SqliteStore::open(path)?;
            store.migrate()?;
            Box::new(store)
        }
        None => Box::new(MemoryStore::new()),
    };

    // A pinned clock at the end of the horizon keeps the run reproducible.
    let start = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| anyhow::anyhow!("invalid start date"))?;
    let horizon_end = start + Duration::days(days);
    let mut pipeline = AmlPipeline::new(store, config, EngineClock::fixed(horizon_end));

    // Build the transaction set: ordinary commerce with laundering
    // typologies layered over the final days of the horizon.
    let mut generator = ScenarioGenerator::new(seed, start);
    let mut txs = generator.background(accounts, days);
    let late = (days - 2).max(0);
    txs.extend(generator.smurfing_ring("ACCT-000", 7, late));
    txs.extend(generator.layering_chain("ACCT-001", 4, late));
    txs.extend(generator.structuring_drip("ACCT-002", 4, (days - 4).max(0)));
    txs.extend(generator.circular_loop("ACCT-003", late));
    txs.extend(generator.hub("ACCT-004", 6, late));
    txs.sort_by_key(|t| t.timestamp);

    let mut rejected = 0usize;
    for tx in &txs {
        if let Err(e) = pipeline.process(tx) {
            rejected += 1;
            log::warn!("rejected {}: {e}", tx.id);
        }
    }

    let report = pipeline.full_analysis()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("processed {} transactions ({rejected} rejected)", txs.len());
    println!(
        "accounts: {} total — {} normal, {} suspicious, {} high risk, {} probable ML",
        report.accounts_evaluated,
        report.bands.normal,
        report.bands.suspicious,
        report.bands.high_risk,
        report.bands.probable_ml
    );
    println!("alerts created this run: {}", report.alerts_created);
    println!();

    let flagged = pipeline.evidence().high_risk_accounts(pipeline.store())?;
    if !flagged.is_empty() {
        println!("high-risk accounts:");
        for (account, evidence) in &flagged {
            println!(
                "  {account:<12} score {:>3}  {}  ({} suspicious, {} patterns, {} signals)",
                evidence.score,
                evidence.risk_level.as_str(),
                evidence.suspicious_transactions,
                evidence.confirmed_patterns,
                evidence.network_signals
            );
        }
        println!();
    }

    let alerts = pipeline.store().list_alerts()?;
    println!("alerts ({}):", alerts.len());
    for alert in &alerts {
        println!("  [{:<8}] {}", alert.severity.as_str(), alert.summary);
        for line in &alert.recommendations {
            println!("             - {line}");
        }
    }

    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
