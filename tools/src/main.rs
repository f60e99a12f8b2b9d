//! etl-runner: headless ingestion and reporting runner for the game
//! lifecycle analytics warehouse.
//!
//! Usage:
//!   etl-runner --data-dir ./data/raw --db warehouse.db
//!   etl-runner --generate 5000 --seed 42 --data-dir ./data/raw --db warehouse.db
//!   etl-runner --db warehouse.db --report --json

use anyhow::Result;
use lifecycle_core::{
    abtest::SignificanceOutcome,
    etl,
    loader::SourceFiles,
    retention::DayMarkPolicy,
    service::AnalyticsService,
    store::Warehouse,
    synthetic::{self, SyntheticConfig},
};
use std::env;
use std::time::Duration;

/// The dashboard's sampling policy: every 10th day, 38 marks.
const REPORT_POLICY: DayMarkPolicy = DayMarkPolicy::EveryNth {
    period: 10,
    max_offset: 370,
};

/// Query results are reused for up to an hour between report runs.
const CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(serde::Serialize)]
struct ReportSummary {
    overview: lifecycle_core::service::OverviewMetrics,
    retention_curve: Vec<lifecycle_core::retention::CurvePoint>,
    negative_offsets: u64,
    groups: Vec<lifecycle_core::abtest::GroupStats>,
    significance: SignificanceOutcome,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let data_dir = parse_str(&args, "--data-dir", "./data/raw");
    let db = parse_str(&args, "--db", "warehouse.db");
    let delimiter = parse_delimiter(&args)?;
    let generate = args
        .windows(2)
        .find(|w| w[0] == "--generate")
        .and_then(|w| w[1].parse::<u64>().ok());
    let seed = parse_arg(&args, "--seed", 42u64);
    let report = args.iter().any(|a| a == "--report");
    let json = args.iter().any(|a| a == "--json");

    let src = SourceFiles::new(data_dir.clone(), delimiter);

    if let Some(users) = generate {
        let cfg = SyntheticConfig {
            users,
            ..SyntheticConfig::default()
        };
        let dataset = synthetic::generate(seed, &cfg);
        synthetic::write_delimited(&dataset, &src)?;
        println!("generated {users} users into {data_dir} (seed {seed})");
    }

    let mut warehouse = Warehouse::open(&db)?;
    warehouse.migrate()?;

    if generate.is_some() || !report {
        let ingestion = etl::run_ingestion(&src, &mut warehouse)?;
        println!("=== INGESTION {} ===", ingestion.job_id);
        for t in &ingestion.tables {
            if t.skipped {
                println!("  {:<10} skipped (source file missing)", t.table);
            } else {
                println!(
                    "  {:<10} {} rows ({} quarantined, {} missing timestamps)",
                    t.table, t.rows_loaded, t.quarantined, t.missing_timestamps
                );
            }
        }
    }

    if report {
        let mut service = AnalyticsService::new(warehouse, CACHE_TTL);
        let summary = build_summary(&mut service)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print_summary(&summary);
        }
    }

    Ok(())
}

fn build_summary(service: &mut AnalyticsService) -> Result<ReportSummary> {
    let overview = service.overview()?;
    let retention = service.retention(&REPORT_POLICY)?;
    let groups = service.group_stats()?;
    let significance = service.significance("a", "b")?;

    Ok(ReportSummary {
        overview,
        retention_curve: retention.curve(),
        negative_offsets: retention.negative_offsets,
        groups,
        significance,
    })
}

fn print_summary(summary: &ReportSummary) {
    println!("=== OVERVIEW ===");
    println!("  total users:   {}", summary.overview.total_users);
    println!("  total revenue: ${:.2}", summary.overview.total_revenue);
    println!("  paying users:  {}", summary.overview.paying_users);
    match summary.overview.paying_rate {
        Some(rate) => println!("  paying rate:   {rate:.2}%"),
        None => println!("  paying rate:   n/a (no users)"),
    }

    println!();
    println!("=== RETENTION (every 10th day) ===");
    if summary.negative_offsets > 0 {
        println!(
            "  warning: {} auth events predate registration",
            summary.negative_offsets
        );
    }
    for point in &summary.retention_curve {
        match point.retention_percent {
            Some(pct) => println!("  day {:>3}: {:>8.4}%", point.day_offset, pct),
            None => println!("  day {:>3}: undefined", point.day_offset),
        }
    }

    println!();
    println!("=== A/B GROUPS ===");
    for g in &summary.groups {
        let arppu = g
            .arppu
            .map(|v| format!("${v:.2}"))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "  {:<8} users={:<6} revenue=${:<10.2} ARPU=${:.4} ARPPU={} conv={:.2}%",
            g.test_group, g.user_count, g.revenue_sum, g.arpu, arppu, g.conversion_rate
        );
    }

    println!();
    match &summary.significance {
        SignificanceOutcome::Computed {
            statistic,
            p_value,
            significant,
        } => {
            println!("t-statistic: {statistic:.4}  p-value: {p_value:.5}");
            if *significant {
                println!("result is statistically significant (p < 0.05)");
            } else {
                println!("result is not statistically significant");
            }
        }
        SignificanceOutcome::Undefined { reason } => {
            println!("significance test undefined: {reason}");
        }
    }
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn parse_str(args: &[String], flag: &str, default: &str) -> String {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].clone())
        .unwrap_or_else(|| default.to_string())
}

fn parse_delimiter(args: &[String]) -> Result<u8> {
    let raw = parse_str(args, "--delimiter", ";");
    let bytes = raw.as_bytes();
    anyhow::ensure!(
        bytes.len() == 1,
        "--delimiter must be a single ASCII character, got '{raw}'"
    );
    Ok(bytes[0])
}
