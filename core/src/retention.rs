//! Cohort retention engine.
//!
//! A cohort is the set of users who registered on the same calendar
//! date. For every authentication event that can be attributed to a
//! cohort, the engine computes the day offset since registration,
//! counts distinct users per (cohort, offset) cell, and converts the
//! counts to percentages of each cohort's own day-0 baseline.
//!
//! Invariants:
//!   - A cell is only ever divided by its own cohort's baseline.
//!   - A zero baseline makes every ratio in that row undefined (`None`),
//!     never 0 and never NaN.
//!   - Auth events for unknown users cannot be attributed and are
//!     dropped; events dated before registration are kept and surfaced
//!     through the `negative_offsets` counter.

use crate::{
    model::{AuthEvent, RegistrationRecord},
    types::DayOffset,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Which day offsets the output keeps. A presentation-layer sampling
/// choice. The engine accepts either variant and hardcodes neither.
#[derive(Debug, Clone)]
pub enum DayMarkPolicy {
    /// Keep exactly the listed offsets (negative marks allowed).
    Fixed(Vec<DayOffset>),
    /// Keep offsets that are exact multiples of `period`, within
    /// `[0, max_offset]`.
    EveryNth {
        period: DayOffset,
        max_offset: DayOffset,
    },
}

impl DayMarkPolicy {
    fn admits(&self, offset: DayOffset) -> bool {
        match self {
            Self::Fixed(marks) => marks.contains(&offset),
            Self::EveryNth { period, max_offset } => {
                *period > 0 && (0..=*max_offset).contains(&offset) && offset % period == 0
            }
        }
    }

    /// Stable key for the query cache.
    pub fn cache_key(&self) -> String {
        match self {
            Self::Fixed(marks) => {
                let parts: Vec<String> = marks.iter().map(|m| m.to_string()).collect();
                format!("fixed:{}", parts.join(","))
            }
            Self::EveryNth { period, max_offset } => format!("every:{period}:{max_offset}"),
        }
    }
}

/// Intermediate distinct-user counts per (cohort date, day offset).
/// Both output representations (matrix and curve) derive from this one
/// table.
#[derive(Debug, Clone, Default)]
pub struct CohortCounts {
    cells: BTreeMap<(NaiveDate, DayOffset), u64>,
    /// Auth events dated before their user's registration. Data-quality
    /// signal; the events themselves stay in the counts.
    pub negative_offsets: u64,
}

/// Inner-join auth events to registrations and count distinct users per
/// (cohort, offset) cell. A user authenticating several times on the
/// same offset day counts once. Rows without a derivable date on either
/// side are excluded here; this is a date-keyed aggregate.
pub fn cohort_counts(
    registrations: &[RegistrationRecord],
    auth_events: &[AuthEvent],
) -> CohortCounts {
    let reg_dates: HashMap<&str, NaiveDate> = registrations
        .iter()
        .filter_map(|r| r.reg_date.map(|d| (r.uid.as_str(), d)))
        .collect();

    let mut counts = CohortCounts::default();
    let mut seen: HashSet<(&str, DayOffset)> = HashSet::new();

    for event in auth_events {
        let Some(auth_date) = event.auth_date else {
            continue;
        };
        // Events for unknown users cannot be attributed to a cohort.
        let Some(&cohort) = reg_dates.get(event.uid.as_str()) else {
            continue;
        };
        let offset = (auth_date - cohort).num_days();
        if offset < 0 {
            counts.negative_offsets += 1;
        }
        if seen.insert((event.uid.as_str(), offset)) {
            *counts.cells.entry((cohort, offset)).or_insert(0) += 1;
        }
    }
    counts
}

#[derive(Debug, Clone, Serialize)]
pub struct RetentionCell {
    pub day_offset: DayOffset,
    pub unique_users: u64,
    /// `None` when the cohort's day-0 baseline is zero.
    pub retention_percent: Option<f64>,
}

/// One matrix row: a registration cohort with one cell per day mark.
#[derive(Debug, Clone, Serialize)]
pub struct CohortRow {
    pub cohort_date: NaiveDate,
    pub day0_count: u64,
    pub cells: Vec<RetentionCell>,
}

/// Pivoted retention matrix plus the mark set it was sampled at.
#[derive(Debug, Clone, Serialize)]
pub struct RetentionTable {
    pub marks: Vec<DayOffset>,
    pub cohorts: Vec<CohortRow>,
    pub negative_offsets: u64,
}

/// Aggregate curve point across all cohorts with a nonzero baseline.
#[derive(Debug, Clone, Serialize)]
pub struct CurvePoint {
    pub day_offset: DayOffset,
    pub unique_users: u64,
    pub retention_percent: Option<f64>,
}

pub fn compute_retention(
    registrations: &[RegistrationRecord],
    auth_events: &[AuthEvent],
    policy: &DayMarkPolicy,
) -> RetentionTable {
    let counts = cohort_counts(registrations, auth_events);

    // Every cohort present in the registration table gets a row, even
    // one with no attributable auth events at all (its baseline is 0 and
    // its ratios are undefined).
    let cohort_dates: BTreeSet<NaiveDate> =
        registrations.iter().filter_map(|r| r.reg_date).collect();

    let marks = resolve_marks(policy, &counts);

    let cohorts = cohort_dates
        .into_iter()
        .map(|cohort_date| {
            let day0_count = counts
                .cells
                .get(&(cohort_date, 0))
                .copied()
                .unwrap_or(0);
            let cells = marks
                .iter()
                .map(|&mark| {
                    let unique_users = counts
                        .cells
                        .get(&(cohort_date, mark))
                        .copied()
                        .unwrap_or(0);
                    let retention_percent = if day0_count == 0 {
                        None
                    } else {
                        Some(unique_users as f64 / day0_count as f64 * 100.0)
                    };
                    RetentionCell {
                        day_offset: mark,
                        unique_users,
                        retention_percent,
                    }
                })
                .collect();
            CohortRow {
                cohort_date,
                day0_count,
                cells,
            }
        })
        .collect();

    if counts.negative_offsets > 0 {
        log::warn!(
            "{} auth events predate their user's registration",
            counts.negative_offsets
        );
    }

    RetentionTable {
        marks,
        cohorts,
        negative_offsets: counts.negative_offsets,
    }
}

impl RetentionTable {
    /// The overall retention curve: one point per mark, aggregated over
    /// every cohort with a nonzero day-0 baseline. Zero-baseline cohorts
    /// are excluded from numerator and denominator alike, so an undefined
    /// row never folds into the average.
    pub fn curve(&self) -> Vec<CurvePoint> {
        let baseline: u64 = self
            .cohorts
            .iter()
            .filter(|c| c.day0_count > 0)
            .map(|c| c.day0_count)
            .sum();

        self.marks
            .iter()
            .enumerate()
            .map(|(i, &mark)| {
                let unique_users: u64 = self
                    .cohorts
                    .iter()
                    .filter(|c| c.day0_count > 0)
                    .map(|c| c.cells[i].unique_users)
                    .sum();
                let retention_percent = if baseline == 0 {
                    None
                } else {
                    Some(unique_users as f64 / baseline as f64 * 100.0)
                };
                CurvePoint {
                    day_offset: mark,
                    unique_users,
                    retention_percent,
                }
            })
            .collect()
    }
}

/// Materialize the mark set for the matrix columns. A fixed list is
/// used as given; the every-Nth policy keeps the admitted offsets that
/// actually occur in the counts, plus day 0 (the baseline column).
fn resolve_marks(policy: &DayMarkPolicy, counts: &CohortCounts) -> Vec<DayOffset> {
    match policy {
        DayMarkPolicy::Fixed(marks) => {
            let set: BTreeSet<DayOffset> = marks.iter().copied().collect();
            set.into_iter().collect()
        }
        DayMarkPolicy::EveryNth { .. } => {
            let mut set: BTreeSet<DayOffset> = counts
                .cells
                .keys()
                .map(|&(_, offset)| offset)
                .filter(|&offset| policy.admits(offset))
                .collect();
            set.insert(0);
            set.into_iter().collect()
        }
    }
}
