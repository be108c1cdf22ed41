use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::db::connection::Database;
use crate::domain::ExternalId;
use crate::errors::StoreError;

// Stays well below SQLite's bound-parameter limit.
const QUERY_CHUNK: usize = 500;

/// Permanent "already ingested" markers keyed by external id.
pub trait DedupStore {
    /// Returns the subset of `ids` that already have a marker.
    fn has_seen(&self, ids: &HashSet<ExternalId>) -> Result<HashSet<ExternalId>, StoreError>;

    /// Inserts markers in one batch. Ids that already have a marker are
    /// ignored and logged; returns how many markers were actually written.
    fn record_batch(&self, markers: &[(ExternalId, DateTime<Utc>)]) -> Result<usize, StoreError>;

    /// Inserts a single marker; `false` if it already existed.
    fn record(&self, id: ExternalId, scanned_at: DateTime<Utc>) -> Result<bool, StoreError> {
        Ok(self.record_batch(&[(id, scanned_at)])? == 1)
    }
}

fn placeholders(n: usize) -> String {
    std::iter::repeat("?")
        .take(n)
        .collect::<Vec<_>>()
        .join(", ")
}

impl DedupStore for Database {
    fn has_seen(&self, ids: &HashSet<ExternalId>) -> Result<HashSet<ExternalId>, StoreError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let ids: Vec<ExternalId> = ids.iter().copied().collect();
        self.with_conn(|conn| {
            let mut seen = HashSet::new();
            for chunk in ids.chunks(QUERY_CHUNK) {
                let sql = format!(
                    "SELECT external_id FROM seen_listings WHERE external_id IN ({})",
                    placeholders(chunk.len())
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                    row.get::<_, ExternalId>(0)
                })?;
                for r in rows {
                    seen.insert(r?);
                }
            }
            Ok(seen)
        })
    }

    fn record_batch(&self, markers: &[(ExternalId, DateTime<Utc>)]) -> Result<usize, StoreError> {
        if markers.is_empty() {
            return Ok(0);
        }

        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut written = 0;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO seen_listings (external_id, scanned_at) VALUES (?1, ?2)",
                )?;
                for (id, scanned_at) in markers {
                    if stmt.execute(params![id, scanned_at])? == 0 {
                        warn!(external_id = id, "dedup marker already present, ignoring");
                    } else {
                        written += 1;
                    }
                }
            }
            tx.commit()?;
            debug!(written, requested = markers.len(), "dedup markers recorded");
            Ok(written)
        })
    }
}
