//! SQLite persistence for sleep nights.
//!
//! One table, one row per night. A connection is opened per call so the store
//! can be shared across blocking tasks without holding a lock; SQLite's WAL
//! journal and busy timeout serialize concurrent writers.

use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::debug;

use super::SleepStore;
use crate::error::StoreError;
use crate::model::SleepNight;

const NIGHT_COLUMNS: &str = "night_id, start_time_milli, end_time_milli, quality_rating";

pub struct SqliteStore {
    path: PathBuf,
    feed: watch::Sender<Vec<SleepNight>>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and loads the
    /// initial night list into the live feed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let (feed, _) = watch::channel(Vec::new());
        let store = Self {
            path: path.into(),
            feed,
        };
        store.init_schema().map_err(StoreError::Open)?;
        let nights = store.all_nights()?;
        store.feed.send_replace(nights);
        debug!(path = %store.path.display(), "Night store opened");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `op` and re-reads the night list in one transaction, publishing the
    /// list only after commit. A failed re-read rolls the write back so the
    /// feed never lags the table.
    fn write<T>(&self, op: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T, String> {
        let (value, nights) = self.with_connection(|conn| {
            let tx = conn.transaction().map_err(|err| err.to_string())?;
            let value = op(&tx).map_err(|err| err.to_string())?;
            let nights = query_nights(&tx).map_err(|err| err.to_string())?;
            tx.commit().map_err(|err| err.to_string())?;
            Ok((value, nights))
        })?;
        self.feed.send_replace(nights);
        Ok(value)
    }

    fn init_schema(&self) -> Result<(), String> {
        self.with_connection(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS daily_sleep_quality_table (
                    night_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    start_time_milli INTEGER NOT NULL,
                    end_time_milli INTEGER NOT NULL,
                    quality_rating INTEGER NOT NULL DEFAULT -1
                 );",
            )
            .map_err(|err| format!("Failed to initialize schema: {}", err))
        })
    }

    fn with_connection<T>(
        &self,
        op: impl FnOnce(&mut Connection) -> Result<T, String>,
    ) -> Result<T, String> {
        let mut conn = self.connect()?;
        op(&mut conn)
    }

    fn connect(&self) -> Result<Connection, String> {
        if let Some(parent) = self.path.parent() {
            fs_err::create_dir_all(parent)
                .map_err(|err| format!("Failed to create data dir: {}", err))?;
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

        let conn = Connection::open_with_flags(&self.path, flags)
            .map_err(|err| format!("Failed to open sqlite db: {}", err))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|err| format!("Failed to enable WAL: {}", err))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|err| format!("Failed to set synchronous: {}", err))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|err| format!("Failed to set busy_timeout: {}", err))?;

        Ok(conn)
    }
}

impl SleepStore for SqliteStore {
    fn insert(&self, night: &SleepNight) -> Result<i64, StoreError> {
        let night_id = self
            .write(|conn| {
                conn.execute(
                    "INSERT INTO daily_sleep_quality_table \
                        (start_time_milli, end_time_milli, quality_rating) \
                     VALUES (?1, ?2, ?3)",
                    params![
                        night.start_time_milli,
                        night.end_time_milli,
                        night.sleep_quality
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .map_err(StoreError::InsertFailed)?;

        debug!(night_id, start = night.start_time_milli, "Night inserted");
        Ok(night_id)
    }

    fn get(&self, night_id: i64) -> Result<Option<SleepNight>, StoreError> {
        self.with_connection(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM daily_sleep_quality_table WHERE night_id = ?1",
                    NIGHT_COLUMNS
                ),
                params![night_id],
                night_from_row,
            )
            .optional()
            .map_err(|err| err.to_string())
        })
        .map_err(StoreError::ReadFailed)
    }

    fn get_most_recent(&self) -> Result<Option<SleepNight>, StoreError> {
        self.with_connection(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM daily_sleep_quality_table ORDER BY night_id DESC LIMIT 1",
                    NIGHT_COLUMNS
                ),
                [],
                night_from_row,
            )
            .optional()
            .map_err(|err| err.to_string())
        })
        .map_err(StoreError::ReadFailed)
    }

    fn update(&self, night: &SleepNight) -> Result<(), StoreError> {
        self.write(|conn| {
            conn.execute(
                "UPDATE daily_sleep_quality_table \
                 SET start_time_milli = ?2, end_time_milli = ?3, quality_rating = ?4 \
                 WHERE night_id = ?1",
                params![
                    night.night_id,
                    night.start_time_milli,
                    night.end_time_milli,
                    night.sleep_quality
                ],
            )
        })
        .map_err(StoreError::UpdateFailed)?;

        debug!(night_id = night.night_id, "Night updated");
        Ok(())
    }

    fn clear_all(&self) -> Result<(), StoreError> {
        self.write(|conn| conn.execute("DELETE FROM daily_sleep_quality_table", []))
            .map_err(StoreError::ClearFailed)?;

        debug!("All nights cleared");
        Ok(())
    }

    fn all_nights(&self) -> Result<Vec<SleepNight>, StoreError> {
        self.with_connection(|conn| query_nights(conn).map_err(|err| err.to_string()))
            .map_err(StoreError::ReadFailed)
    }

    fn observe_all(&self) -> watch::Receiver<Vec<SleepNight>> {
        self.feed.subscribe()
    }
}

fn query_nights(conn: &Connection) -> rusqlite::Result<Vec<SleepNight>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM daily_sleep_quality_table ORDER BY night_id DESC",
        NIGHT_COLUMNS
    ))?;
    let rows = stmt.query_map([], night_from_row)?;
    rows.collect()
}

fn night_from_row(row: &Row<'_>) -> rusqlite::Result<SleepNight> {
    Ok(SleepNight {
        night_id: row.get(0)?,
        start_time_milli: row.get(1)?,
        end_time_milli: row.get(2)?,
        sleep_quality: row.get(3)?,
    })
}
