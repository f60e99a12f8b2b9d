//! A/B aggregation and significance testing over the master table.
//!
//! Grouping and the derived ratios (ARPU, ARPPU, conversion rate) are
//! pure folds over the master rows. The significance test is Welch's
//! unequal-variance two-sample comparison of the two groups' revenue
//! vectors, with a two-tailed p-value from a normal approximation.

use crate::model::MasterRow;
use serde::Serialize;
use std::collections::BTreeMap;

/// Fixed significance threshold. Documented policy, not configuration.
pub const SIGNIFICANCE_ALPHA: f64 = 0.05;

/// Minimum observations per group for the test to be defined.
pub const MIN_GROUP_SAMPLES: usize = 2;

#[derive(Debug, Clone, Serialize)]
pub struct GroupStats {
    pub test_group: String,
    pub user_count: u64,
    pub revenue_sum: f64,
    pub paying_users: u64,
    /// Average revenue per user.
    pub arpu: f64,
    /// Average revenue per paying user. `None` when the group has no
    /// paying users: reported as undefined, never divided by zero.
    pub arppu: Option<f64>,
    /// Paying users as a percentage of the group.
    pub conversion_rate: f64,
}

/// Group the master table by test group. Output is ordered by label so
/// repeated runs over the same data render identically.
pub fn aggregate_groups(master: &[MasterRow]) -> Vec<GroupStats> {
    #[derive(Default)]
    struct Acc {
        users: u64,
        revenue: f64,
        paying: u64,
    }

    let mut groups: BTreeMap<&str, Acc> = BTreeMap::new();
    for row in master {
        let acc = groups.entry(row.test_group.as_str()).or_default();
        acc.users += 1;
        acc.revenue += row.revenue;
        if row.revenue > 0.0 {
            acc.paying += 1;
        }
    }

    groups
        .into_iter()
        .map(|(label, acc)| {
            let users = acc.users as f64;
            GroupStats {
                test_group: label.to_string(),
                user_count: acc.users,
                revenue_sum: acc.revenue,
                paying_users: acc.paying,
                arpu: acc.revenue / users,
                arppu: if acc.paying == 0 {
                    None
                } else {
                    Some(acc.revenue / acc.paying as f64)
                },
                conversion_rate: acc.paying as f64 / users * 100.0,
            }
        })
        .collect()
}

/// Outcome of the two-sample comparison.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SignificanceOutcome {
    Computed {
        statistic: f64,
        p_value: f64,
        significant: bool,
    },
    /// Preconditions not met. Reported explicitly instead of producing
    /// a spurious number.
    Undefined { reason: String },
}

/// Welch's t-test over the revenue vectors of two named groups.
pub fn compare_groups(master: &[MasterRow], group_a: &str, group_b: &str) -> SignificanceOutcome {
    let a: Vec<f64> = revenues(master, group_a);
    let b: Vec<f64> = revenues(master, group_b);

    for (label, sample) in [(group_a, &a), (group_b, &b)] {
        if sample.len() < MIN_GROUP_SAMPLES {
            return SignificanceOutcome::Undefined {
                reason: format!(
                    "group '{label}' has {} observation(s); need at least {MIN_GROUP_SAMPLES}",
                    sample.len()
                ),
            };
        }
    }

    let (mean_a, var_a) = mean_and_variance(&a);
    let (mean_b, var_b) = mean_and_variance(&b);
    let std_error = (var_a / a.len() as f64 + var_b / b.len() as f64).sqrt();

    // Two identical constant samples: no detectable difference.
    let statistic = if std_error > f64::EPSILON {
        (mean_a - mean_b) / std_error
    } else {
        0.0
    };

    let p_value = (2.0 * (1.0 - standard_normal_cdf(statistic.abs()))).clamp(0.0, 1.0);

    SignificanceOutcome::Computed {
        statistic,
        p_value,
        significant: p_value < SIGNIFICANCE_ALPHA,
    }
}

fn revenues(master: &[MasterRow], group: &str) -> Vec<f64> {
    master
        .iter()
        .filter(|row| row.test_group == group)
        .map(|row| row.revenue)
        .collect()
}

/// Sample mean and unbiased (n-1) variance.
fn mean_and_variance(sample: &[f64]) -> (f64, f64) {
    let n = sample.len() as f64;
    let mean = sample.iter().sum::<f64>() / n;
    let variance = sample.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance)
}

/// Standard normal CDF via the Abramowitz & Stegun erf approximation.
fn standard_normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0
        - (a1 * t + a2 * t.powi(2) + a3 * t.powi(3) + a4 * t.powi(4) + a5 * t.powi(5))
            * (-x * x).exp();

    sign * y
}
