//! Delimited-file source loader.
//!
//! Parsing rules:
//!   - The field delimiter is explicit configuration, never sniffed.
//!   - Timestamp fields that fail numeric coercion load as missing
//!     values; the row stays in the table but drops out of date-keyed
//!     aggregates.
//!   - Rows that do not match the schema at all (blank id, uncoercible
//!     or non-finite revenue, ragged field count) are quarantined:
//!     excluded, counted, logged.
//!   - A missing source file is fatal for that source; a silently empty
//!     table must never stand in for "no users".

use crate::{
    error::{AnalyticsError, AnalyticsResult},
    model::{AuthEvent, MonetizationRecord, RegistrationRecord},
    types::UNKNOWN_GROUP,
};
use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Canonical source file names, shared with the ingestion job.
pub const REG_FILE: &str = "reg_data.csv";
pub const AUTH_FILE: &str = "auth_data.csv";
pub const AB_FILE: &str = "ab_test.csv";

/// Descriptor for a delimited-file source directory.
#[derive(Debug, Clone)]
pub struct SourceFiles {
    pub dir: PathBuf,
    pub delimiter: u8,
}

impl SourceFiles {
    pub fn new(dir: impl Into<PathBuf>, delimiter: u8) -> Self {
        Self {
            dir: dir.into(),
            delimiter,
        }
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }
}

/// Per-table load outcome. `rows_read` counts every data row in the
/// file, including quarantined ones.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub rows_read: u64,
    pub missing_timestamps: u64,
    pub quarantined: u64,
}

pub fn load_registrations(
    src: &SourceFiles,
) -> AnalyticsResult<(Vec<RegistrationRecord>, LoadReport)> {
    let mut report = LoadReport::default();
    let rows = for_each_row(src, REG_FILE, &["uid", "reg_ts"], &mut report, |fields| {
        let uid = fields[0].trim();
        if uid.is_empty() {
            return RowOutcome::Quarantined("blank uid");
        }
        match coerce_epoch(fields[1]) {
            Some(ts) => RowOutcome::Loaded(RegistrationRecord::new(uid.to_string(), Some(ts))),
            None => RowOutcome::MissingTimestamp(RegistrationRecord::new(uid.to_string(), None)),
        }
    })?;
    Ok((rows, report))
}

pub fn load_auth_events(src: &SourceFiles) -> AnalyticsResult<(Vec<AuthEvent>, LoadReport)> {
    let mut report = LoadReport::default();
    let rows = for_each_row(src, AUTH_FILE, &["uid", "auth_ts"], &mut report, |fields| {
        let uid = fields[0].trim();
        if uid.is_empty() {
            return RowOutcome::Quarantined("blank uid");
        }
        match coerce_epoch(fields[1]) {
            Some(ts) => RowOutcome::Loaded(AuthEvent::new(uid.to_string(), Some(ts))),
            None => RowOutcome::MissingTimestamp(AuthEvent::new(uid.to_string(), None)),
        }
    })?;
    Ok((rows, report))
}

pub fn load_monetization(
    src: &SourceFiles,
) -> AnalyticsResult<(Vec<MonetizationRecord>, LoadReport)> {
    let mut report = LoadReport::default();
    let rows = for_each_row(
        src,
        AB_FILE,
        &["user_id", "testgroup", "revenue"],
        &mut report,
        |fields| {
            let user_id = fields[0].trim();
            if user_id.is_empty() {
                return RowOutcome::Quarantined("blank user_id");
            }
            // A blank group is a missing assignment, not a broken row.
            let group = fields[1].trim();
            let test_group = if group.is_empty() {
                UNKNOWN_GROUP.to_string()
            } else {
                group.to_string()
            };
            let revenue = match fields[2].trim().parse::<f64>() {
                Ok(v) if v.is_finite() => v,
                _ => return RowOutcome::Quarantined("uncoercible revenue"),
            };
            RowOutcome::Loaded(MonetizationRecord {
                user_id: user_id.to_string(),
                test_group,
                revenue,
            })
        },
    )?;
    Ok((rows, report))
}

enum RowOutcome<T> {
    Loaded(T),
    MissingTimestamp(T),
    Quarantined(&'static str),
}

/// Open one source file, validate its header, and fold every data row
/// through `parse`. All three loaders share this path so the schema and
/// quarantine rules cannot drift apart.
fn for_each_row<T>(
    src: &SourceFiles,
    file: &str,
    columns: &[&str],
    report: &mut LoadReport,
    parse: impl Fn(&[&str]) -> RowOutcome<T>,
) -> AnalyticsResult<Vec<T>> {
    let path = src.path(file);
    if !path.exists() {
        return Err(AnalyticsError::MissingSource {
            path: path.display().to_string(),
        });
    }

    let mut rdr = ReaderBuilder::new()
        .delimiter(src.delimiter)
        .has_headers(true)
        .from_path(&path)?;

    let headers = rdr.headers()?.clone();
    let indices = column_indices(&path, &headers, columns)?;

    let mut rows = Vec::new();
    for record in rdr.records() {
        report.rows_read += 1;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                report.quarantined += 1;
                log::warn!("{file}: quarantined row {}: {e}", report.rows_read);
                continue;
            }
        };
        let fields: Vec<&str> = indices
            .iter()
            .map(|&i| record.get(i).unwrap_or(""))
            .collect();
        match parse(&fields) {
            RowOutcome::Loaded(row) => rows.push(row),
            RowOutcome::MissingTimestamp(row) => {
                report.missing_timestamps += 1;
                log::debug!("{file}: row {} has an uncoercible timestamp", report.rows_read);
                rows.push(row);
            }
            RowOutcome::Quarantined(reason) => {
                report.quarantined += 1;
                log::warn!("{file}: quarantined row {}: {reason}", report.rows_read);
            }
        }
    }

    if report.quarantined > 0 {
        log::warn!(
            "{file}: {} of {} rows quarantined",
            report.quarantined,
            report.rows_read
        );
    }
    Ok(rows)
}

fn column_indices(
    path: &Path,
    headers: &StringRecord,
    columns: &[&str],
) -> AnalyticsResult<Vec<usize>> {
    columns
        .iter()
        .map(|col| {
            headers
                .iter()
                .position(|h| h.trim() == *col)
                .ok_or_else(|| AnalyticsError::SchemaMismatch {
                    table: path.display().to_string(),
                    column: (*col).to_string(),
                })
        })
        .collect()
}

/// Coerce a raw timestamp field to epoch seconds. Anything that does
/// not parse as an integer becomes the missing-value marker.
fn coerce_epoch(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}
