//! SQLite implementation of the DurableStore trait.
//!
//! All users share one database. A record is a header row in `grant_slots`
//! plus its entries in `grant_times`; `write` swaps both inside a single
//! transaction, so a failed write rolls back to the previous record.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use tracing::debug;

use granttime_core::{GrantEntry, GrantTimeRecord, GrantTimeState, UserId};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{DurableStore, Slot};

const KIND_PACKAGE: i64 = 0;
const KIND_SHARED_GROUP: i64 = 1;

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Mutex<Connection>,
    /// Database file, `None` for in-memory databases.
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path.as_ref())?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.as_ref().to_path_buf()),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Execute an operation that needs mutable access to the connection.
    fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                Some(format!("mutex poisoned: {}", e)),
            ))
        })?;
        f(&mut conn)
    }
}

fn user_param(user: UserId) -> i64 {
    i64::from(user.get())
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("bad instant {raw:?}: {e}")))
}

fn insert_entries(
    tx: &Transaction<'_>,
    user: UserId,
    slot: Slot,
    kind: i64,
    entries: &[GrantEntry],
) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO grant_times (user_id, slot, kind, name, first_grant_time)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for entry in entries {
        stmt.execute(params![
            user_param(user),
            slot.as_str(),
            kind,
            &entry.name,
            entry
                .first_grant_time
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ])?;
    }
    Ok(())
}

impl DurableStore for SqliteStore {
    fn read(&self, user: UserId, slot: Slot) -> Result<Option<GrantTimeState>> {
        self.with_conn_mut(|conn| {
            let header: Option<Option<u32>> = conn
                .query_row(
                    "SELECT version FROM grant_slots WHERE user_id = ?1 AND slot = ?2",
                    params![user_param(user), slot.as_str()],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(version) = header else {
                return Ok(None);
            };

            let mut stmt = conn.prepare(
                "SELECT kind, name, first_grant_time FROM grant_times
                 WHERE user_id = ?1 AND slot = ?2 ORDER BY kind, name",
            )?;
            let rows = stmt
                .query_map(params![user_param(user), slot.as_str()], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut record = GrantTimeRecord {
                version,
                ..GrantTimeRecord::default()
            };
            for (kind, name, raw_time) in rows {
                let entry = GrantEntry {
                    name,
                    first_grant_time: parse_instant(&raw_time)?,
                };
                match kind {
                    KIND_PACKAGE => record.packages.push(entry),
                    KIND_SHARED_GROUP => record.shared_groups.push(entry),
                    other => {
                        return Err(StoreError::Serialization(format!(
                            "unknown entry kind {other} for {user}/{slot}"
                        )))
                    }
                }
            }

            Ok(Some(GrantTimeState::try_from(record)?))
        })
    }

    fn write(&self, user: UserId, slot: Slot, state: &GrantTimeState) -> Result<()> {
        let record = GrantTimeRecord::from(state.clone());

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "DELETE FROM grant_times WHERE user_id = ?1 AND slot = ?2",
                params![user_param(user), slot.as_str()],
            )?;
            tx.execute(
                "INSERT INTO grant_slots (user_id, slot, version) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id, slot) DO UPDATE SET version = excluded.version",
                params![user_param(user), slot.as_str(), record.version],
            )?;

            insert_entries(&tx, user, slot, KIND_PACKAGE, &record.packages)?;
            insert_entries(&tx, user, slot, KIND_SHARED_GROUP, &record.shared_groups)?;

            tx.commit()?;
            Ok(())
        })?;

        debug!(%user, %slot, entries = state.len(), "grant time record written to sqlite");
        Ok(())
    }

    fn delete(&self, user: UserId, slot: Slot) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM grant_times WHERE user_id = ?1 AND slot = ?2",
                params![user_param(user), slot.as_str()],
            )?;
            tx.execute(
                "DELETE FROM grant_slots WHERE user_id = ?1 AND slot = ?2",
                params![user_param(user), slot.as_str()],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    fn locate(&self, _user: UserId, _slot: Slot) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| PathBuf::from(":memory:"))
    }
}
