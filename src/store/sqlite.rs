use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rusqlite::{params, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use crate::db::DbPool;

use super::notify::{ChangeEvent, ChangeHub, Subscription};
use super::{Entry, KvStore, WriteOutcome};

struct Shared {
    pool: DbPool,
    hub: ChangeHub,
    /// Last revision this process knows about per key, written by us or
    /// already published by `poll_external`.
    seen: Mutex<HashMap<String, u64>>,
}

/// SQLite-backed implementation of the KvStore trait.
/// Peer handles share the pool and change hub; writes by other processes on
/// the same file surface through `poll_external`.
pub struct SqliteStore {
    shared: Arc<Shared>,
    origin: Uuid,
}

impl SqliteStore {
    /// Wrap a migrated pool. Current revisions are recorded so that the first
    /// `poll_external` only reports writes made after this point.
    pub fn new(pool: DbPool) -> Result<Self, String> {
        let seen = read_revisions(&pool)?;
        Ok(Self {
            shared: Arc::new(Shared {
                pool,
                hub: ChangeHub::new(),
                seen: Mutex::new(seen),
            }),
            origin: Uuid::new_v4(),
        })
    }

    pub fn new_at(path: &str) -> Result<Self, String> {
        let pool = crate::db::init_pool_at(path)?;
        crate::db::run_migrations(&pool)?;
        Self::new(pool)
    }

    #[cfg(test)]
    pub fn peer(&self) -> SqliteStore {
        SqliteStore {
            shared: Arc::clone(&self.shared),
            origin: Uuid::new_v4(),
        }
    }

    fn note_seen(&self, key: &str, revision: u64) {
        if let Ok(mut seen) = self.shared.seen.lock() {
            seen.insert(key.to_string(), revision);
        }
    }

    fn write(&self, key: &str, value: &str, expected: Option<u64>) -> Result<WriteOutcome, String> {
        let mut conn = self.shared.pool.get().map_err(|e| e.to_string())?;
        // IMMEDIATE takes the write lock up front so the revision check and
        // the update cannot interleave with another process.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| e.to_string())?;

        let current: u64 = tx
            .query_row(
                "SELECT revision FROM kv_entries WHERE key = ?1",
                params![key],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(|e| e.to_string())?
            .map(|r| r as u64)
            .unwrap_or(0);

        if let Some(expected) = expected {
            if expected != current {
                return Ok(WriteOutcome::Conflict { current });
            }
        }

        tx.execute("UPDATE kv_revision SET counter = counter + 1 WHERE id = 1", [])
            .map_err(|e| e.to_string())?;
        let revision: i64 = tx
            .query_row("SELECT counter FROM kv_revision WHERE id = 1", [], |row| {
                row.get(0)
            })
            .map_err(|e| e.to_string())?;
        tx.execute(
            "INSERT INTO kv_entries (key, value, revision, updated_at)
             VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value = ?2, revision = ?3, updated_at = CURRENT_TIMESTAMP",
            params![key, value, revision],
        )
        .map_err(|e| e.to_string())?;
        tx.commit().map_err(|e| e.to_string())?;

        let revision = revision as u64;
        self.note_seen(key, revision);
        self.shared.hub.publish(&ChangeEvent {
            key: key.to_string(),
            revision,
            origin: self.origin,
        });
        Ok(WriteOutcome::Written(revision))
    }
}

fn read_revisions(pool: &DbPool) -> Result<HashMap<String, u64>, String> {
    let conn = pool.get().map_err(|e| e.to_string())?;
    let mut stmt = conn
        .prepare("SELECT key, revision FROM kv_entries")
        .map_err(|e| e.to_string())?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })
        .map_err(|e| e.to_string())?;
    rows.collect::<Result<HashMap<_, _>, _>>()
        .map_err(|e| e.to_string())
}

impl KvStore for SqliteStore {
    fn origin(&self) -> Uuid {
        self.origin
    }

    fn entry(&self, key: &str) -> Result<Option<Entry>, String> {
        let conn = self.shared.pool.get().map_err(|e| e.to_string())?;
        conn.query_row(
            "SELECT value, revision FROM kv_entries WHERE key = ?1",
            params![key],
            |row| {
                Ok(Entry {
                    value: row.get(0)?,
                    revision: row.get::<_, i64>(1)? as u64,
                })
            },
        )
        .optional()
        .map_err(|e| e.to_string())
    }

    fn set(&self, key: &str, value: &str) -> Result<u64, String> {
        match self.write(key, value, None)? {
            WriteOutcome::Written(rev) => Ok(rev),
            WriteOutcome::Conflict { current } => Err(format!(
                "{}: unconditional write reported conflict at revision {}",
                key, current
            )),
        }
    }

    fn compare_and_set(
        &self,
        key: &str,
        value: &str,
        expected: u64,
    ) -> Result<WriteOutcome, String> {
        self.write(key, value, Some(expected))
    }

    fn subscribe(&self) -> Subscription {
        self.shared.hub.subscribe(self.origin)
    }

    fn poll_external(&self) -> Result<usize, String> {
        let current = read_revisions(&self.shared.pool)?;
        let changed: Vec<(String, u64)> = {
            let mut seen = self.shared.seen.lock().map_err(|e| e.to_string())?;
            let mut changed = Vec::new();
            for (key, rev) in &current {
                if seen.get(key) != Some(rev) {
                    changed.push((key.clone(), *rev));
                }
            }
            for key in seen.keys() {
                if !current.contains_key(key) {
                    changed.push((key.clone(), 0));
                }
            }
            *seen = current;
            changed
        };

        for (key, revision) in &changed {
            log::debug!("[store] external write to {} (revision {})", key, revision);
            self.shared.hub.publish(&ChangeEvent {
                key: key.clone(),
                revision: *revision,
                origin: Uuid::nil(),
            });
        }
        Ok(changed.len())
    }
}
