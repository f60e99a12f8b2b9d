use lifecycle_core::{
    abtest::{aggregate_groups, compare_groups, SignificanceOutcome},
    model::MasterRow,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn row(uid: &str, group: &str, revenue: f64) -> MasterRow {
    MasterRow {
        uid: uid.into(),
        reg_date: None,
        test_group: group.into(),
        revenue,
    }
}

fn rows(group: &str, revenues: &[f64]) -> Vec<MasterRow> {
    revenues
        .iter()
        .enumerate()
        .map(|(i, &r)| row(&format!("{group}{i}"), group, r))
        .collect()
}

// ── Aggregation ──────────────────────────────────────────────────────────────

/// Worked example: A = [0,0,5,10], B = [0,2,2,2].
/// ARPU 3.75 vs 1.5, conversion 50% vs 75%.
#[test]
fn worked_example_group_metrics() {
    let mut master = rows("a", &[0.0, 0.0, 5.0, 10.0]);
    master.extend(rows("b", &[0.0, 2.0, 2.0, 2.0]));

    let stats = aggregate_groups(&master);

    assert_eq!(stats.len(), 2);
    let a = &stats[0];
    let b = &stats[1];

    assert_eq!(a.test_group, "a");
    assert_eq!(a.user_count, 4);
    assert_eq!(a.revenue_sum, 15.0);
    assert_eq!(a.paying_users, 2);
    assert!((a.arpu - 3.75).abs() < 1e-12);
    assert_eq!(a.arppu, Some(7.5));
    assert!((a.conversion_rate - 50.0).abs() < 1e-12);

    assert_eq!(b.test_group, "b");
    assert!((b.arpu - 1.5).abs() < 1e-12);
    assert_eq!(b.arppu, Some(2.0));
    assert!((b.conversion_rate - 75.0).abs() < 1e-12);
}

/// ARPPU is undefined (not zero, not a division error) for a group
/// with no paying users.
#[test]
fn arppu_undefined_without_payers() {
    let master = rows("a", &[0.0, 0.0, 0.0]);

    let stats = aggregate_groups(&master);

    assert_eq!(stats[0].paying_users, 0);
    assert_eq!(stats[0].arppu, None);
    assert_eq!(stats[0].conversion_rate, 0.0);
}

/// ARPU × user_count reconstructs the revenue sum for every group.
#[test]
fn arpu_times_users_equals_revenue_sum() {
    let mut master = rows("a", &[0.0, 1.25, 3.10, 0.0, 99.99]);
    master.extend(rows("b", &[0.5, 0.5, 7.77]));
    master.extend(rows("unknown", &[0.0, 0.0]));

    for g in aggregate_groups(&master) {
        let reconstructed = g.arpu * g.user_count as f64;
        assert!(
            (reconstructed - g.revenue_sum).abs() < 1e-9,
            "group '{}': {} != {}",
            g.test_group,
            reconstructed,
            g.revenue_sum
        );
    }
}

// ── Significance ─────────────────────────────────────────────────────────────

/// Welch's statistic on a small hand-checked case:
/// a = [0,2] (mean 1, var 2), b = [1,3] (mean 2, var 2),
/// se = sqrt(2/2 + 2/2) = sqrt(2), t = -1/sqrt(2).
#[test]
fn welch_statistic_matches_hand_computation() {
    let mut master = rows("a", &[0.0, 2.0]);
    master.extend(rows("b", &[1.0, 3.0]));

    match compare_groups(&master, "a", "b") {
        SignificanceOutcome::Computed { statistic, p_value, .. } => {
            let expected = -1.0 / 2.0_f64.sqrt();
            assert!(
                (statistic - expected).abs() < 1e-9,
                "expected {expected}, got {statistic}"
            );
            assert!(p_value > 0.05, "tiny overlapping samples are not significant");
        }
        SignificanceOutcome::Undefined { reason } => {
            panic!("test should be defined, got: {reason}")
        }
    }
}

/// Clearly separated distributions come out significant.
#[test]
fn separated_groups_are_significant() {
    let a_rev: Vec<f64> = (0..60).map(|i| f64::from(i % 2)).collect(); // mean 0.5
    let b_rev: Vec<f64> = (0..60).map(|i| 9.0 + f64::from(i % 3)).collect(); // mean 10.0
    let mut master = rows("a", &a_rev);
    master.extend(rows("b", &b_rev));

    match compare_groups(&master, "a", "b") {
        SignificanceOutcome::Computed {
            statistic,
            p_value,
            significant,
        } => {
            assert!(statistic < 0.0, "a earns less than b");
            assert!(p_value < 0.05, "p-value was {p_value}");
            assert!(significant);
        }
        SignificanceOutcome::Undefined { reason } => {
            panic!("test should be defined, got: {reason}")
        }
    }
}

/// Identical groups: statistic 0, p-value 1, not significant.
#[test]
fn identical_groups_are_not_significant() {
    let mut master = rows("a", &[1.0, 2.0, 3.0, 4.0]);
    master.extend(rows("b", &[1.0, 2.0, 3.0, 4.0]));

    match compare_groups(&master, "a", "b") {
        SignificanceOutcome::Computed {
            statistic,
            p_value,
            significant,
        } => {
            assert_eq!(statistic, 0.0);
            assert!((p_value - 1.0).abs() < 1e-9);
            assert!(!significant);
        }
        SignificanceOutcome::Undefined { reason } => {
            panic!("test should be defined, got: {reason}")
        }
    }
}

/// Fewer than 2 observations in either group: an explicit undefined
/// outcome, never a spurious number and never a panic.
#[test]
fn undersized_group_is_undefined() {
    let mut master = rows("a", &[1.0]);
    master.extend(rows("b", &[1.0, 2.0, 3.0]));

    match compare_groups(&master, "a", "b") {
        SignificanceOutcome::Undefined { reason } => {
            assert!(reason.contains("'a'"), "reason should name the group: {reason}");
        }
        SignificanceOutcome::Computed { .. } => panic!("1-sample test must be undefined"),
    }
}

/// A label with no rows at all is the same precondition failure.
#[test]
fn missing_group_is_undefined() {
    let master = rows("a", &[1.0, 2.0]);

    assert!(matches!(
        compare_groups(&master, "a", "zz"),
        SignificanceOutcome::Undefined { .. }
    ));
}

/// Two constant, equal samples have zero variance on both sides; the
/// guarded standard error reports no detectable difference.
#[test]
fn zero_variance_samples_do_not_divide_by_zero() {
    let mut master = rows("a", &[5.0, 5.0, 5.0]);
    master.extend(rows("b", &[5.0, 5.0, 5.0]));

    match compare_groups(&master, "a", "b") {
        SignificanceOutcome::Computed {
            statistic,
            significant,
            ..
        } => {
            assert_eq!(statistic, 0.0);
            assert!(!significant);
        }
        SignificanceOutcome::Undefined { reason } => {
            panic!("test should be defined, got: {reason}")
        }
    }
}
