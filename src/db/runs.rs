use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::errors::StoreError;
use crate::pipeline::TickReport;

#[derive(Debug)]
pub struct TickRun {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub discovered: i64,
    pub notified: i64,
    pub failed: i64,
    pub error_message: Option<String>,
}

pub fn record_run(conn: &Connection, report: &TickReport) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO tick_runs (started_at, finished_at, discovered, notified, failed, error_message) VALUES (?, ?, ?, ?, ?, ?)",
        params![
            report.started_at,
            report.finished_at,
            report.discovered as i64,
            report.dispatched as i64,
            report.failed() as i64,
            report.aborted,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn recent_runs(conn: &Connection, limit: usize) -> Result<Vec<TickRun>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, started_at, finished_at, discovered, notified, failed, error_message FROM tick_runs ORDER BY started_at DESC, id DESC LIMIT ?",
    )?;

    let rows = stmt.query_map(params![limit as i64], |row| {
        Ok(TickRun {
            id: row.get(0)?,
            started_at: row.get(1)?,
            finished_at: row.get(2)?,
            discovered: row.get(3)?,
            notified: row.get(4)?,
            failed: row.get(5)?,
            error_message: row.get(6)?,
        })
    })?;

    let mut runs = Vec::new();
    for r in rows {
        runs.push(r?);
    }
    Ok(runs)
}
