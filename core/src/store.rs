//! SQLite warehouse layer.
//!
//! RULE: Only store.rs talks to the database.
//! Pipeline stages and engines call store methods — they never execute
//! SQL directly.
//!
//! The destination tables mirror the raw file schema exactly; dates are
//! derived on read through the same code path the file loader uses, so
//! a file-backed run and a warehouse-backed run cannot diverge.

use crate::{
    error::AnalyticsResult,
    model::{AuthEvent, MonetizationRecord, RegistrationRecord},
};
use rusqlite::{params, Connection};

pub struct Warehouse {
    conn: Connection,
}

/// One row of the `load_job` audit table.
#[derive(Debug, Clone)]
pub struct LoadJobRecord {
    pub job_id: String,
    pub table_name: String,
    pub rows_loaded: u64,
    pub quarantined: u64,
    pub loaded_at: i64,
}

impl Warehouse {
    /// Open (or create) the warehouse database at `path`.
    pub fn open(path: &str) -> AnalyticsResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode only matters for real files; :memory: ignores it.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self { conn })
    }

    /// Open an in-memory warehouse (used in tests).
    pub fn in_memory() -> AnalyticsResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Apply the warehouse DDL. Idempotent: the dataset is created if
    /// absent and left untouched if already present.
    pub fn migrate(&self) -> AnalyticsResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_warehouse.sql"))?;
        Ok(())
    }

    // ── Truncate-and-reload ────────────────────────────────────

    /// Replace the registration table with `rows`. Returns the resulting
    /// row count. Prior contents are discarded, never appended to.
    pub fn replace_registrations(&mut self, rows: &[RegistrationRecord]) -> AnalyticsResult<u64> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM reg_data", [])?;
        {
            let mut stmt = tx.prepare("INSERT INTO reg_data (uid, reg_ts) VALUES (?1, ?2)")?;
            for row in rows {
                stmt.execute(params![row.uid, row.reg_ts])?;
            }
        }
        tx.commit()?;
        Ok(rows.len() as u64)
    }

    pub fn replace_auth_events(&mut self, rows: &[AuthEvent]) -> AnalyticsResult<u64> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM auth_data", [])?;
        {
            let mut stmt = tx.prepare("INSERT INTO auth_data (uid, auth_ts) VALUES (?1, ?2)")?;
            for row in rows {
                stmt.execute(params![row.uid, row.auth_ts])?;
            }
        }
        tx.commit()?;
        Ok(rows.len() as u64)
    }

    pub fn replace_monetization(&mut self, rows: &[MonetizationRecord]) -> AnalyticsResult<u64> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM ab_test", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO ab_test (user_id, testgroup, revenue) VALUES (?1, ?2, ?3)",
            )?;
            for row in rows {
                stmt.execute(params![row.user_id, row.test_group, row.revenue])?;
            }
        }
        tx.commit()?;
        Ok(rows.len() as u64)
    }

    // ── Typed reads ────────────────────────────────────────────

    pub fn registrations(&self) -> AnalyticsResult<Vec<RegistrationRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT uid, reg_ts FROM reg_data ORDER BY rowid ASC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RegistrationRecord::new(row.get(0)?, row.get(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn auth_events(&self) -> AnalyticsResult<Vec<AuthEvent>> {
        let mut stmt = self
            .conn
            .prepare("SELECT uid, auth_ts FROM auth_data ORDER BY rowid ASC")?;
        let rows = stmt
            .query_map([], |row| Ok(AuthEvent::new(row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn monetization(&self) -> AnalyticsResult<Vec<MonetizationRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id, testgroup, revenue FROM ab_test ORDER BY rowid ASC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(MonetizationRecord {
                    user_id: row.get(0)?,
                    test_group: row.get(1)?,
                    revenue: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn table_count(&self, table: &str) -> AnalyticsResult<u64> {
        // Table names come from the fixed ingestion mapping, never from
        // user input.
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })?;
        Ok(count as u64)
    }

    // ── Load-job audit ─────────────────────────────────────────

    pub fn record_load_job(&self, job: &LoadJobRecord) -> AnalyticsResult<()> {
        self.conn.execute(
            "INSERT INTO load_job (job_id, table_name, rows_loaded, quarantined, loaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                job.job_id,
                job.table_name,
                job.rows_loaded as i64,
                job.quarantined as i64,
                job.loaded_at,
            ],
        )?;
        Ok(())
    }

    pub fn load_jobs(&self, job_id: &str) -> AnalyticsResult<Vec<LoadJobRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT job_id, table_name, rows_loaded, quarantined, loaded_at
             FROM load_job WHERE job_id = ?1 ORDER BY rowid ASC",
        )?;
        let rows = stmt
            .query_map(params![job_id], |row| {
                Ok(LoadJobRecord {
                    job_id: row.get(0)?,
                    table_name: row.get(1)?,
                    rows_loaded: row.get::<_, i64>(2)? as u64,
                    quarantined: row.get::<_, i64>(3)? as u64,
                    loaded_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
