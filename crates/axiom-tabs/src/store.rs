//! Snapshot persistence
//!
//! Stores the tab snapshots of a whole session so it can be restored after a
//! process restart. Rows are kept in tab-strip order.

use axiom_storage::Database;
use chrono::Utc;
use std::collections::HashMap;

use crate::snapshot::TabSnapshot;
use crate::{Result, TabId};

pub struct SnapshotStore {
    db: Database,
}

impl SnapshotStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Replace the stored session with `snapshots`.
    pub fn save_all(&self, snapshots: &[(TabId, TabSnapshot)]) -> Result<()> {
        let rows = snapshots
            .iter()
            .map(|(id, snapshot)| Ok((id.as_str(), serde_json::to_string(snapshot)?)))
            .collect::<Result<Vec<_>>>()?;
        let saved_at = Utc::now().to_rfc3339();

        self.db.transaction(|conn| {
            conn.execute("DELETE FROM tab_snapshots", [])?;
            let mut stmt = conn.prepare(
                "INSERT INTO tab_snapshots (position, tab_id, snapshot, saved_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (position, (id, json)) in rows.iter().enumerate() {
                stmt.execute(rusqlite::params![position as i64, id, json, saved_at])?;
            }
            Ok(())
        })?;

        tracing::debug!(count = snapshots.len(), "Saved tab snapshots");
        Ok(())
    }

    /// Load the stored session in order. Rows that no longer parse are
    /// skipped, and parent positions are rewritten to match the returned
    /// list.
    pub fn load_all(&self) -> Result<Vec<(TabId, TabSnapshot)>> {
        let rows: Vec<(i64, TabId, String)> = self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT position, tab_id, snapshot FROM tab_snapshots ORDER BY position",
            )?;
            let rows: Vec<(i64, TabId, String)> = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .filter_map(|r| r.ok())
                .collect();
            Ok(rows)
        })?;

        let mut loaded_at: HashMap<i64, usize> = HashMap::with_capacity(rows.len());
        let mut snapshots: Vec<(TabId, TabSnapshot)> = Vec::with_capacity(rows.len());
        for (position, id, json) in rows {
            match serde_json::from_str(&json) {
                Ok(snapshot) => {
                    loaded_at.insert(position, snapshots.len());
                    snapshots.push((id, snapshot));
                }
                Err(e) => {
                    tracing::warn!(tab_id = %id, error = %e, "Skipping unreadable tab snapshot");
                }
            }
        }

        for (id, snapshot) in &mut snapshots {
            let Some(parent) = snapshot.parent_index else {
                continue;
            };
            snapshot.parent_index = i64::try_from(parent)
                .ok()
                .and_then(|position| loaded_at.get(&position).copied());
            if snapshot.parent_index.is_none() {
                tracing::warn!(tab_id = %id, parent_index = parent, "Parent snapshot missing");
            }
        }

        Ok(snapshots)
    }

    pub fn clear(&self) -> Result<()> {
        self.db.with_connection(|conn| {
            conn.execute("DELETE FROM tab_snapshots", [])?;
            Ok(())
        })?;
        Ok(())
    }
}

impl Clone for SnapshotStore {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}
