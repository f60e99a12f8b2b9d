//! Deterministic synthetic dataset generator.
//!
//! Seeds demo warehouses and gives tests a realistically shaped dataset.
//! RULE: nothing here touches a platform RNG. Same seed, same tables,
//! byte for byte.

use crate::{
    error::AnalyticsResult,
    loader::{SourceFiles, AB_FILE, AUTH_FILE, REG_FILE},
    model::{AuthEvent, MonetizationRecord, RegistrationRecord},
};
use chrono::{Duration, NaiveDate, NaiveTime};
use csv::WriterBuilder;
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;
use std::fs;

/// Shape of the generated population.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub users: u64,
    /// First registration date of the window.
    pub start: NaiveDate,
    /// Registration window length in days.
    pub span_days: u64,
    /// How far past registration auth activity is simulated.
    pub horizon_days: u64,
    /// Chance a fresh registrant authenticates on day 0.
    pub day0_auth_rate: f64,
    /// Day-1 return probability; decays geometrically per day after.
    pub base_return_rate: f64,
    pub daily_decay: f64,
    /// Fraction of users present in the A/B table at all. The rest
    /// exercise the "unknown" merge path.
    pub ab_assignment_rate: f64,
    pub payer_rate_a: f64,
    pub payer_rate_b: f64,
    /// Pareto revenue parameters for paying users.
    pub revenue_xmin: f64,
    pub revenue_alpha: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            users: 2_000,
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN),
            span_days: 30,
            horizon_days: 60,
            day0_auth_rate: 0.9,
            base_return_rate: 0.45,
            daily_decay: 0.93,
            ab_assignment_rate: 0.8,
            payer_rate_a: 0.06,
            payer_rate_b: 0.09,
            revenue_xmin: 0.99,
            revenue_alpha: 1.8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticDataset {
    pub registrations: Vec<RegistrationRecord>,
    pub auth_events: Vec<AuthEvent>,
    pub monetization: Vec<MonetizationRecord>,
}

/// Deterministic RNG for dataset generation.
struct DatasetRng {
    inner: Pcg64Mcg,
}

impl DatasetRng {
    fn new(seed: u64) -> Self {
        Self {
            inner: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    /// Roll a float in [0.0, 1.0).
    fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    fn next_u64_below(&mut self, n: u64) -> u64 {
        debug_assert!(n > 0);
        self.inner.next_u64() % n
    }

    /// Bernoulli trial: true with probability p.
    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Simplified Pareto sample. x_min: floor, alpha: shape.
    fn pareto(&mut self, x_min: f64, alpha: f64) -> f64 {
        let u = self.next_f64().max(1e-10);
        x_min * u.powf(-1.0 / alpha)
    }
}

pub fn generate(seed: u64, cfg: &SyntheticConfig) -> SyntheticDataset {
    let mut rng = DatasetRng::new(seed);
    let mut registrations = Vec::with_capacity(cfg.users as usize);
    let mut auth_events = Vec::new();
    let mut monetization = Vec::new();

    for i in 0..cfg.users {
        let uid = format!("u{i:06}");
        let reg_day = cfg.start + Duration::days(rng.next_u64_below(cfg.span_days.max(1)) as i64);
        let reg_ts = epoch_at(reg_day, rng.next_u64_below(86_400) as u32);
        registrations.push(RegistrationRecord::new(uid.clone(), Some(reg_ts)));

        if rng.chance(cfg.day0_auth_rate) {
            auth_events.push(AuthEvent::new(
                uid.clone(),
                Some(epoch_at(reg_day, rng.next_u64_below(86_400) as u32)),
            ));
        }
        for d in 1..=cfg.horizon_days {
            let p = cfg.base_return_rate * cfg.daily_decay.powi(d as i32 - 1);
            if rng.chance(p) {
                let day = reg_day + Duration::days(d as i64);
                auth_events.push(AuthEvent::new(
                    uid.clone(),
                    Some(epoch_at(day, rng.next_u64_below(86_400) as u32)),
                ));
            }
        }

        if rng.chance(cfg.ab_assignment_rate) {
            let (group, payer_rate) = if rng.chance(0.5) {
                ("a", cfg.payer_rate_a)
            } else {
                ("b", cfg.payer_rate_b)
            };
            let revenue = if rng.chance(payer_rate) {
                // Round to cents so CSV round-trips exactly.
                (rng.pareto(cfg.revenue_xmin, cfg.revenue_alpha) * 100.0).round() / 100.0
            } else {
                0.0
            };
            monetization.push(MonetizationRecord {
                user_id: uid,
                test_group: group.to_string(),
                revenue,
            });
        }
    }

    SyntheticDataset {
        registrations,
        auth_events,
        monetization,
    }
}

/// Write the dataset as the three canonical delimited source files.
pub fn write_delimited(dataset: &SyntheticDataset, src: &SourceFiles) -> AnalyticsResult<()> {
    fs::create_dir_all(&src.dir)?;

    let mut w = WriterBuilder::new()
        .delimiter(src.delimiter)
        .from_path(src.path(REG_FILE))?;
    w.write_record(["uid", "reg_ts"])?;
    for r in &dataset.registrations {
        w.write_record(&[r.uid.clone(), opt_ts(r.reg_ts)])?;
    }
    w.flush()?;

    let mut w = WriterBuilder::new()
        .delimiter(src.delimiter)
        .from_path(src.path(AUTH_FILE))?;
    w.write_record(["uid", "auth_ts"])?;
    for a in &dataset.auth_events {
        w.write_record(&[a.uid.clone(), opt_ts(a.auth_ts)])?;
    }
    w.flush()?;

    let mut w = WriterBuilder::new()
        .delimiter(src.delimiter)
        .from_path(src.path(AB_FILE))?;
    w.write_record(["user_id", "testgroup", "revenue"])?;
    for m in &dataset.monetization {
        w.write_record(&[m.user_id.clone(), m.test_group.clone(), m.revenue.to_string()])?;
    }
    w.flush()?;

    log::info!(
        "wrote synthetic dataset to {}: {} registrations, {} auth events, {} ab rows",
        src.dir.display(),
        dataset.registrations.len(),
        dataset.auth_events.len(),
        dataset.monetization.len()
    );
    Ok(())
}

fn opt_ts(ts: Option<i64>) -> String {
    ts.map(|t| t.to_string()).unwrap_or_default()
}

fn epoch_at(date: NaiveDate, second_of_day: u32) -> i64 {
    let time = NaiveTime::from_num_seconds_from_midnight_opt(second_of_day, 0)
        .unwrap_or(NaiveTime::MIN);
    date.and_time(time).and_utc().timestamp()
}
