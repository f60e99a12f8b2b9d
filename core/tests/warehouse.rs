use lifecycle_core::{
    etl,
    loader::{SourceFiles, AB_FILE, AUTH_FILE, REG_FILE},
    model::{AuthEvent, MonetizationRecord, RegistrationRecord},
    store::{LoadJobRecord, Warehouse},
};
use std::fs;
use std::path::PathBuf;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn make_warehouse() -> Warehouse {
    let warehouse = Warehouse::in_memory().unwrap();
    warehouse.migrate().unwrap();
    warehouse
}

fn fixture_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "lifecycle-etl-{name}-{}",
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_sources(dir: &PathBuf) {
    fs::write(dir.join(REG_FILE), "uid;reg_ts\nu1;86400\nu2;172800\n").unwrap();
    fs::write(dir.join(AUTH_FILE), "uid;auth_ts\nu1;86400\nu2;950400\n").unwrap();
    fs::write(
        dir.join(AB_FILE),
        "user_id;testgroup;revenue\nu1;a;4.99\nu2;b;0\n",
    )
    .unwrap();
}

// ── Store ────────────────────────────────────────────────────────────────────

/// Migration is idempotent: re-running against an existing dataset is a
/// no-op, not an error.
#[test]
fn migrate_twice_is_idempotent() {
    let warehouse = make_warehouse();
    warehouse.migrate().unwrap();
    assert_eq!(warehouse.table_count("reg_data").unwrap(), 0);
}

/// Replace means replace: after two loads only the second batch exists.
#[test]
fn replace_is_truncate_and_reload() {
    let mut warehouse = make_warehouse();

    let first: Vec<_> = (0..3)
        .map(|i| RegistrationRecord::new(format!("old{i}"), Some(86_400)))
        .collect();
    let second = vec![RegistrationRecord::new("new0".into(), Some(172_800))];

    assert_eq!(warehouse.replace_registrations(&first).unwrap(), 3);
    assert_eq!(warehouse.replace_registrations(&second).unwrap(), 1);

    let rows = warehouse.registrations().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].uid, "new0");
}

/// Missing timestamps survive the warehouse round trip as NULLs and
/// come back as missing values, re-deriving to a missing date.
#[test]
fn round_trip_preserves_missing_timestamps() {
    let mut warehouse = make_warehouse();
    let rows = vec![
        RegistrationRecord::new("u1".into(), Some(86_400)),
        RegistrationRecord::new("u2".into(), None),
    ];
    warehouse.replace_registrations(&rows).unwrap();

    let back = warehouse.registrations().unwrap();
    assert_eq!(back, rows);
    assert_eq!(back[1].reg_date, None);
}

#[test]
fn round_trip_auth_and_monetization() {
    let mut warehouse = make_warehouse();
    let auths = vec![AuthEvent::new("u1".into(), Some(86_400))];
    let mon = vec![MonetizationRecord {
        user_id: "u1".into(),
        test_group: "a".into(),
        revenue: 4.99,
    }];

    warehouse.replace_auth_events(&auths).unwrap();
    warehouse.replace_monetization(&mon).unwrap();

    assert_eq!(warehouse.auth_events().unwrap(), auths);
    assert_eq!(warehouse.monetization().unwrap(), mon);
}

#[test]
fn load_job_audit_round_trips() {
    let warehouse = make_warehouse();
    let job = LoadJobRecord {
        job_id: "job-1".into(),
        table_name: "reg_data".into(),
        rows_loaded: 42,
        quarantined: 3,
        loaded_at: 1_700_000_000,
    };
    warehouse.record_load_job(&job).unwrap();

    let jobs = warehouse.load_jobs("job-1").unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].rows_loaded, 42);
    assert_eq!(jobs[0].quarantined, 3);
}

// ── Ingestion job ────────────────────────────────────────────────────────────

/// Full batch: all three tables load-replace and report their counts.
#[test]
fn ingestion_loads_all_three_tables() {
    let dir = fixture_dir("full");
    write_sources(&dir);
    let src = SourceFiles::new(&dir, b';');
    let mut warehouse = make_warehouse();

    let report = etl::run_ingestion(&src, &mut warehouse).unwrap();

    assert_eq!(report.loaded_tables(), 3);
    for outcome in &report.tables {
        assert!(!outcome.skipped);
        assert_eq!(outcome.rows_loaded, 2, "table {}", outcome.table);
    }
    assert_eq!(warehouse.table_count("reg_data").unwrap(), 2);
    assert_eq!(warehouse.table_count("auth_data").unwrap(), 2);
    assert_eq!(warehouse.table_count("ab_test").unwrap(), 2);

    let audit = warehouse.load_jobs(&report.job_id).unwrap();
    assert_eq!(audit.len(), 3, "one audit row per loaded table");
}

/// An absent source file skips its table with a warning; the rest of
/// the batch still loads.
#[test]
fn absent_file_skips_without_failing_the_batch() {
    let dir = fixture_dir("partial");
    write_sources(&dir);
    fs::remove_file(dir.join(AB_FILE)).unwrap();
    let src = SourceFiles::new(&dir, b';');
    let mut warehouse = make_warehouse();

    let report = etl::run_ingestion(&src, &mut warehouse).unwrap();

    assert_eq!(report.loaded_tables(), 2);
    let ab = report.tables.iter().find(|t| t.table == "ab_test").unwrap();
    assert!(ab.skipped);
    assert_eq!(warehouse.table_count("ab_test").unwrap(), 0);
    assert_eq!(warehouse.table_count("reg_data").unwrap(), 2);
}

/// Re-running ingestion replaces prior contents instead of appending.
#[test]
fn rerun_replaces_prior_contents() {
    let dir = fixture_dir("rerun");
    write_sources(&dir);
    let src = SourceFiles::new(&dir, b';');
    let mut warehouse = make_warehouse();

    etl::run_ingestion(&src, &mut warehouse).unwrap();
    etl::run_ingestion(&src, &mut warehouse).unwrap();

    assert_eq!(warehouse.table_count("reg_data").unwrap(), 2, "no append");
}

/// Quarantine counts flow from the loader into the ingestion report.
#[test]
fn quarantine_counts_reach_the_report() {
    let dir = fixture_dir("dirty");
    write_sources(&dir);
    fs::write(
        dir.join(AB_FILE),
        "user_id;testgroup;revenue\nu1;a;bad\nu2;b;1.00\n",
    )
    .unwrap();
    let src = SourceFiles::new(&dir, b';');
    let mut warehouse = make_warehouse();

    let report = etl::run_ingestion(&src, &mut warehouse).unwrap();

    let ab = report.tables.iter().find(|t| t.table == "ab_test").unwrap();
    assert_eq!(ab.rows_loaded, 1);
    assert_eq!(ab.quarantined, 1);
}
