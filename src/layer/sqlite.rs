//! Embedded-store primary layer
//!
//! Weekly entries live in a single SQLite table keyed by the composite
//! (year, week), with a secondary index on year so year-scoped queries avoid
//! full scans. This layer carries the highest priority in the system: reads
//! are preferred here and writes always land here first.

use super::{LayerDescriptor, WeeklyDataLayer};
use crate::error::{WeeklogError, WeeklogResult};
use crate::model::{SaveEntryInput, StatusIcon, WeekId, WeeklyEntry, MAX_WEEK, MIN_WEEK};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tokio::sync::{Mutex, MutexGuard};

/// Priority of the embedded store; highest in the system.
pub const SQLITE_PRIORITY: i32 = 100;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS weekly_entries (
    year INTEGER NOT NULL,
    week INTEGER NOT NULL,
    status_icon TEXT NOT NULL,
    achievements TEXT NOT NULL,
    challenges TEXT NOT NULL,
    PRIMARY KEY (year, week)
);
CREATE INDEX IF NOT EXISTS idx_weekly_entries_year ON weekly_entries (year);
";

const ENTRY_SELECT: &str = "SELECT year, week, status_icon, achievements, challenges FROM weekly_entries";

enum Source {
    File(PathBuf),
    InMemory,
}

pub struct SqliteLayer {
    descriptor: LayerDescriptor,
    source: Source,
    conn: Mutex<Option<Connection>>,
}

impl SqliteLayer {
    /// Layer over a database file; the file is created lazily on first use
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            descriptor: LayerDescriptor::new("sqlite", SQLITE_PRIORITY),
            source: Source::File(path.into()),
            conn: Mutex::new(None),
        }
    }

    /// Layer over a private in-memory database (data does not survive reset)
    pub fn in_memory() -> Self {
        Self {
            descriptor: LayerDescriptor::new("sqlite", SQLITE_PRIORITY),
            source: Source::InMemory,
            conn: Mutex::new(None),
        }
    }

    /// Lazy, memoized initialization
    ///
    /// The mutex makes concurrent first calls share one initialization: the
    /// first caller opens the connection and runs the schema, later callers
    /// find it ready.
    async fn connection(&self) -> WeeklogResult<MutexGuard<'_, Option<Connection>>> {
        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            let conn = match &self.source {
                Source::File(path) => Connection::open(path)?,
                Source::InMemory => Connection::open_in_memory()?,
            };
            conn.execute_batch(SCHEMA)?;
            *guard = Some(conn);
        }
        Ok(guard)
    }

    fn require<'a>(
        &self,
        guard: &'a MutexGuard<'_, Option<Connection>>,
    ) -> WeeklogResult<&'a Connection> {
        guard
            .as_ref()
            .ok_or_else(|| WeeklogError::LayerNotInitialized(self.descriptor.name.clone()))
    }

    fn row_parts(row: &Row<'_>) -> rusqlite::Result<(i64, i64, String, String, String)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
        ))
    }

    /// Reject malformed persisted rows instead of masking them
    fn decode(parts: (i64, i64, String, String, String)) -> WeeklogResult<WeeklyEntry> {
        let (year, week, icon, achievements, challenges) = parts;
        let week = u8::try_from(week)
            .ok()
            .filter(|w| (MIN_WEEK..=MAX_WEEK).contains(w))
            .ok_or_else(|| {
                WeeklogError::CorruptRecord(format!("week {week} out of range for year {year}"))
            })?;
        let year = i32::try_from(year)
            .map_err(|_| WeeklogError::CorruptRecord(format!("year {year} out of range")))?;
        Ok(WeeklyEntry {
            week_id: WeekId { year, week },
            status_icon: StatusIcon::from(icon),
            achievements,
            challenges,
        })
    }

    fn query_one(conn: &Connection, id: WeekId) -> WeeklogResult<Option<WeeklyEntry>> {
        let parts = conn
            .query_row(
                &format!("{ENTRY_SELECT} WHERE year = ?1 AND week = ?2"),
                params![id.year, i64::from(id.week)],
                Self::row_parts,
            )
            .optional()?;
        parts.map(Self::decode).transpose()
    }
}

#[async_trait]
impl WeeklyDataLayer for SqliteLayer {
    fn descriptor(&self) -> &LayerDescriptor {
        &self.descriptor
    }

    async fn is_available(&self) -> bool {
        if self.conn.lock().await.is_some() {
            return true;
        }
        match &self.source {
            Source::InMemory => true,
            Source::File(path) => path
                .parent()
                .map(|dir| dir.as_os_str().is_empty() || dir.exists())
                .unwrap_or(true),
        }
    }

    async fn save(&self, input: SaveEntryInput) -> WeeklogResult<WeeklyEntry> {
        input.week_id.validate()?;
        let guard = self.connection().await?;
        let conn = self.require(&guard)?;

        let existing = Self::query_one(conn, input.week_id)?;
        let resolved = input.merge_into(existing.as_ref());
        conn.execute(
            "INSERT OR REPLACE INTO weekly_entries (year, week, status_icon, achievements, challenges)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                resolved.week_id.year,
                i64::from(resolved.week_id.week),
                resolved.status_icon.as_str(),
                resolved.achievements,
                resolved.challenges,
            ],
        )?;
        Ok(resolved)
    }

    async fn get(&self, id: WeekId) -> WeeklogResult<Option<WeeklyEntry>> {
        id.validate()?;
        let guard = self.connection().await?;
        let conn = self.require(&guard)?;
        Self::query_one(conn, id)
    }

    async fn get_range(&self, start: WeekId, end: WeekId) -> WeeklogResult<Vec<WeeklyEntry>> {
        start.validate()?;
        end.validate()?;
        if end < start {
            return Ok(Vec::new());
        }
        let guard = self.connection().await?;
        let conn = self.require(&guard)?;

        let mut stmt = conn.prepare(&format!(
            "{ENTRY_SELECT}
             WHERE (year > ?1 OR (year = ?1 AND week >= ?2))
               AND (year < ?3 OR (year = ?3 AND week <= ?4))
             ORDER BY year ASC, week ASC"
        ))?;
        let rows = stmt.query_map(
            params![
                start.year,
                i64::from(start.week),
                end.year,
                i64::from(end.week)
            ],
            Self::row_parts,
        )?;

        let mut entries = Vec::new();
        for parts in rows {
            entries.push(Self::decode(parts?)?);
        }
        Ok(entries)
    }

    async fn get_by_year(&self, year: i32) -> WeeklogResult<Vec<WeeklyEntry>> {
        let guard = self.connection().await?;
        let conn = self.require(&guard)?;

        let mut stmt =
            conn.prepare(&format!("{ENTRY_SELECT} WHERE year = ?1 ORDER BY week ASC"))?;
        let rows = stmt.query_map(params![year], Self::row_parts)?;

        let mut entries = Vec::new();
        for parts in rows {
            entries.push(Self::decode(parts?)?);
        }
        Ok(entries)
    }

    async fn weeks_with_data(&self, year: i32) -> WeeklogResult<BTreeSet<u8>> {
        let guard = self.connection().await?;
        let conn = self.require(&guard)?;

        let mut stmt =
            conn.prepare("SELECT week FROM weekly_entries WHERE year = ?1 ORDER BY week ASC")?;
        let rows = stmt.query_map(params![year], |row| row.get::<_, i64>(0))?;

        let mut weeks = BTreeSet::new();
        for week in rows {
            let week = week?;
            let week = u8::try_from(week)
                .ok()
                .filter(|w| (MIN_WEEK..=MAX_WEEK).contains(w))
                .ok_or_else(|| {
                    WeeklogError::CorruptRecord(format!(
                        "week {week} out of range for year {year}"
                    ))
                })?;
            weeks.insert(week);
        }
        Ok(weeks)
    }

    async fn delete(&self, id: WeekId) -> WeeklogResult<()> {
        id.validate()?;
        let guard = self.connection().await?;
        let conn = self.require(&guard)?;
        conn.execute(
            "DELETE FROM weekly_entries WHERE year = ?1 AND week = ?2",
            params![id.year, i64::from(id.week)],
        )?;
        Ok(())
    }

    async fn reset(&self) {
        *self.conn.lock().await = None;
    }
}
