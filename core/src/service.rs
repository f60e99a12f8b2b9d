//! Read-only query surface for the presentation layer.
//!
//! Three entry points: overview metrics, the retention table, and A/B
//! group stats plus the significance test. Each answer is computed from
//! typed warehouse rows through the pure engines and memoized in a
//! per-query TTL cache. The caller picks the TTL (the dashboard uses an
//! hour); correctness never depends on it.

use crate::{
    abtest::{self, GroupStats, SignificanceOutcome},
    cache::TtlCache,
    error::AnalyticsResult,
    merge::merge_master,
    retention::{self, DayMarkPolicy, RetentionTable},
    store::Warehouse,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct OverviewMetrics {
    pub total_users: u64,
    pub total_revenue: f64,
    pub paying_users: u64,
    /// `None` when there are no users at all.
    pub paying_rate: Option<f64>,
    /// New registrations per calendar date, ascending. Registrations
    /// without a derivable date are in the totals but not the trend.
    pub daily_new_users: Vec<(NaiveDate, u64)>,
}

pub struct AnalyticsService {
    warehouse: Warehouse,
    overview_cache: TtlCache<OverviewMetrics>,
    retention_cache: TtlCache<RetentionTable>,
    groups_cache: TtlCache<Vec<GroupStats>>,
    significance_cache: TtlCache<SignificanceOutcome>,
}

impl AnalyticsService {
    pub fn new(warehouse: Warehouse, cache_ttl: Duration) -> Self {
        Self {
            warehouse,
            overview_cache: TtlCache::new(cache_ttl),
            retention_cache: TtlCache::new(cache_ttl),
            groups_cache: TtlCache::new(cache_ttl),
            significance_cache: TtlCache::new(cache_ttl),
        }
    }

    /// Invalidate every cached result. Call after ingesting new data.
    pub fn invalidate(&mut self) {
        self.overview_cache.clear();
        self.retention_cache.clear();
        self.groups_cache.clear();
        self.significance_cache.clear();
    }

    pub fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }

    pub fn warehouse_mut(&mut self) -> &mut Warehouse {
        &mut self.warehouse
    }

    pub fn overview(&mut self) -> AnalyticsResult<OverviewMetrics> {
        if let Some(hit) = self.overview_cache.get("overview") {
            return Ok(hit);
        }

        let registrations = self.warehouse.registrations()?;
        let monetization = self.warehouse.monetization()?;
        let master = merge_master(&registrations, &monetization);

        let distinct: HashSet<&str> = master.iter().map(|r| r.uid.as_str()).collect();
        let total_users = distinct.len() as u64;
        let total_revenue: f64 = master.iter().map(|r| r.revenue).sum();
        let paying: HashSet<&str> = master
            .iter()
            .filter(|r| r.revenue > 0.0)
            .map(|r| r.uid.as_str())
            .collect();
        let paying_users = paying.len() as u64;
        let paying_rate = if total_users == 0 {
            None
        } else {
            Some(paying_users as f64 / total_users as f64 * 100.0)
        };

        let mut daily: std::collections::BTreeMap<NaiveDate, u64> = Default::default();
        for reg in &registrations {
            if let Some(date) = reg.reg_date {
                *daily.entry(date).or_insert(0) += 1;
            }
        }

        let metrics = OverviewMetrics {
            total_users,
            total_revenue,
            paying_users,
            paying_rate,
            daily_new_users: daily.into_iter().collect(),
        };
        self.overview_cache.put("overview", metrics.clone());
        Ok(metrics)
    }

    pub fn retention(&mut self, policy: &DayMarkPolicy) -> AnalyticsResult<RetentionTable> {
        let key = policy.cache_key();
        if let Some(hit) = self.retention_cache.get(&key) {
            return Ok(hit);
        }

        let registrations = self.warehouse.registrations()?;
        let auth_events = self.warehouse.auth_events()?;
        let table = retention::compute_retention(&registrations, &auth_events, policy);
        self.retention_cache.put(key, table.clone());
        Ok(table)
    }

    pub fn group_stats(&mut self) -> AnalyticsResult<Vec<GroupStats>> {
        if let Some(hit) = self.groups_cache.get("groups") {
            return Ok(hit);
        }

        let registrations = self.warehouse.registrations()?;
        let monetization = self.warehouse.monetization()?;
        let master = merge_master(&registrations, &monetization);
        let stats = abtest::aggregate_groups(&master);
        self.groups_cache.put("groups", stats.clone());
        Ok(stats)
    }

    pub fn significance(
        &mut self,
        group_a: &str,
        group_b: &str,
    ) -> AnalyticsResult<SignificanceOutcome> {
        let key = format!("sig:{group_a}:{group_b}");
        if let Some(hit) = self.significance_cache.get(&key) {
            return Ok(hit);
        }

        let registrations = self.warehouse.registrations()?;
        let monetization = self.warehouse.monetization()?;
        let master = merge_master(&registrations, &monetization);
        let outcome = abtest::compare_groups(&master, group_a, group_b);
        self.significance_cache.put(key, outcome.clone());
        Ok(outcome)
    }
}
