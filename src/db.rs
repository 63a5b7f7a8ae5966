//! Catalog store.
//!
//! SQLite-backed collection of [`Track`] records keyed by path. A single
//! connection sits behind a mutex, so `upsert`, `update_rating` and `delete`
//! are serialised and a track's stored `rating` always matches its sub-scores.
//! Every read is one statement and therefore sees a consistent snapshot.

use log::{debug, info, trace};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::track::{ScoreCard, Track};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS tracks (
    id           INTEGER PRIMARY KEY,
    path         TEXT    NOT NULL UNIQUE,
    title        TEXT    NOT NULL,
    artist       TEXT    NOT NULL,
    album        TEXT    NOT NULL,
    genre        TEXT    NOT NULL,
    duration     REAL    NOT NULL DEFAULT 0,
    rating       REAL    NOT NULL DEFAULT 0,
    rate_melody  INTEGER NOT NULL DEFAULT 0,
    rate_rhythm  INTEGER NOT NULL DEFAULT 0,
    rate_vocals  INTEGER NOT NULL DEFAULT 0,
    rate_lyrics  INTEGER NOT NULL DEFAULT 0,
    rate_arrange INTEGER NOT NULL DEFAULT 0,
    has_vocals   INTEGER NOT NULL DEFAULT 1,
    has_lyrics   INTEGER NOT NULL DEFAULT 1,
    rated        INTEGER NOT NULL DEFAULT 0
)";

const COLUMNS: &str = "id, path, title, artist, album, genre, duration, \
    rate_melody, rate_rhythm, rate_vocals, rate_lyrics, rate_arrange, \
    has_vocals, has_lyrics, rated";

/// Rows fetched per page by [`Records`].
const PAGE_SIZE: usize = 256;

/// What an [`Catalog::upsert`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// Tags refreshed in place, rating fields untouched.
    Updated,
}

/// Tally of a batch upsert. Failures never abort the batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub failed: Vec<Error>,
}

/// Durable collection of track records.
#[derive(Debug)]
pub struct Catalog {
    conn: Mutex<Connection>,
}

impl Catalog {
    /// Open (creating if needed) the catalog at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        debug!("Opened catalog at {}", path.display());
        Self::with_connection(conn)
    }

    /// Catalog that lives only as long as the value. Used by tests and benchmarks.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(SCHEMA, ())?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self, operation: &'static str) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::Lock(operation))
    }

    /// Insert `record`, or refresh the tags of the existing row with the same path.
    ///
    /// Sub-scores, flags, `rated` and `rating` of an existing row are preserved.
    pub fn upsert(&self, record: Track) -> Result<UpsertOutcome> {
        let record = record.normalized()?;
        let conn = self.lock("upsert")?;
        upsert_row(&conn, &record)
    }

    /// Upsert every record inside one transaction.
    ///
    /// Records that fail validation are collected in [`BatchOutcome::failed`]
    /// and the rest of the batch proceeds.
    pub fn upsert_batch<I>(&self, records: I) -> Result<BatchOutcome>
    where
        I: IntoIterator<Item = Track>,
    {
        let mut conn = self.lock("upsert_batch")?;
        let tx = conn.transaction()?;
        let mut outcome = BatchOutcome::default();

        for record in records {
            let result = record.normalized().and_then(|record| upsert_row(&tx, &record));
            match result {
                Ok(UpsertOutcome::Inserted) => outcome.inserted += 1,
                Ok(UpsertOutcome::Updated) => outcome.updated += 1,
                Err(err @ (Error::Ingest { .. } | Error::Database(_))) => {
                    debug!("Batch upsert skipped a record: {err}");
                    outcome.failed.push(err);
                }
                Err(err) => return Err(err),
            }
        }

        tx.commit()?;
        info!(
            "Batch upsert: {} inserted, {} updated, {} failed",
            outcome.inserted,
            outcome.updated,
            outcome.failed.len()
        );
        Ok(outcome)
    }

    /// Remove every record. Safe on an empty catalog; the store stays usable.
    pub fn clear(&self) -> Result<()> {
        let conn = self.lock("clear")?;
        let removed = conn.execute("DELETE FROM tracks", ())?;
        conn.execute_batch("VACUUM")?;
        info!("Cleared catalog ({removed} tracks removed)");
        Ok(())
    }

    /// Remove the record at `path`. Returns whether anything was removed.
    pub fn delete(&self, path: &str) -> Result<bool> {
        let conn = self.lock("delete")?;
        let removed = conn.execute("DELETE FROM tracks WHERE path = ?1", [path])?;
        debug!("delete `{path}`: {removed} row(s)");
        Ok(removed > 0)
    }

    /// Store a new score card for `path` and recompute its rating.
    ///
    /// Returns the updated record.
    pub fn update_rating(&self, path: &str, card: &ScoreCard) -> Result<Track> {
        card.validate()?;
        let rating = card.rating();
        let conn = self.lock("update_rating")?;

        let changed = conn.execute(
            "UPDATE tracks SET rating = ?1,
                rate_melody = ?2, rate_rhythm = ?3, rate_vocals = ?4,
                rate_lyrics = ?5, rate_arrange = ?6,
                has_vocals = ?7, has_lyrics = ?8, rated = 1
             WHERE path = ?9",
            params![
                rating,
                card.melody,
                card.rhythm,
                card.vocals,
                card.lyrics,
                card.arrange,
                card.has_vocals,
                card.has_lyrics,
                path
            ],
        )?;
        if changed == 0 {
            return Err(Error::not_found(path, "update_rating"));
        }
        debug!("Rated `{path}` at {rating:.2}");

        get_row(&conn, path)?.ok_or_else(|| Error::not_found(path, "update_rating"))
    }

    /// Look up one record by path.
    pub fn get(&self, path: &str) -> Result<Option<Track>> {
        let conn = self.lock("get")?;
        get_row(&conn, path)
    }

    pub fn len(&self) -> Result<usize> {
        let conn = self.lock("len")?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Every record as of this call, in id order.
    pub fn snapshot(&self) -> Result<Vec<Track>> {
        let conn = self.lock("snapshot")?;
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM tracks ORDER BY id"))?;
        let tracks = stmt
            .query_map([], track_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        trace!("Snapshot of {} tracks", tracks.len());
        Ok(tracks)
    }

    /// Lazy sequence over every record, fetched in pages by id.
    ///
    /// The sequence is finite and restartable: call this again, or
    /// [`Records::restart`], to walk from the beginning.
    #[must_use]
    pub fn all_records(&self) -> Records<'_> {
        Records {
            catalog: self,
            after_id: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    fn page_after(&self, after_id: i64) -> Result<Vec<Track>> {
        let conn = self.lock("all_records")?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM tracks WHERE id > ?1 ORDER BY id LIMIT ?2"
        ))?;
        let page = stmt
            .query_map(params![after_id, PAGE_SIZE as i64], track_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(page)
    }
}

/// Iterator returned by [`Catalog::all_records`].
pub struct Records<'a> {
    catalog: &'a Catalog,
    after_id: i64,
    buffer: VecDeque<Track>,
    exhausted: bool,
}

impl Records<'_> {
    pub fn restart(&mut self) {
        self.after_id = 0;
        self.buffer.clear();
        self.exhausted = false;
    }
}

impl Iterator for Records<'_> {
    type Item = Result<Track>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            match self.catalog.page_after(self.after_id) {
                Ok(page) => {
                    self.exhausted = page.len() < PAGE_SIZE;
                    self.buffer.extend(page);
                }
                Err(err) => {
                    self.exhausted = true;
                    return Some(Err(err));
                }
            }
        }

        let track = self.buffer.pop_front()?;
        self.after_id = track.id;
        Some(Ok(track))
    }
}

fn upsert_row(conn: &Connection, record: &Track) -> Result<UpsertOutcome> {
    let updated = conn.execute(
        "UPDATE tracks SET title = ?1, artist = ?2, album = ?3, genre = ?4, duration = ?5
         WHERE path = ?6",
        params![
            record.title,
            record.artist,
            record.album,
            record.genre,
            record.duration,
            record.path
        ],
    )?;
    if updated > 0 {
        trace!("Refreshed tags for `{}`", record.path);
        return Ok(UpsertOutcome::Updated);
    }

    conn.execute(
        "INSERT INTO tracks (path, title, artist, album, genre, duration, rating,
            rate_melody, rate_rhythm, rate_vocals, rate_lyrics, rate_arrange,
            has_vocals, has_lyrics, rated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            record.path,
            record.title,
            record.artist,
            record.album,
            record.genre,
            record.duration,
            record.rating(),
            record.card.melody,
            record.card.rhythm,
            record.card.vocals,
            record.card.lyrics,
            record.card.arrange,
            record.card.has_vocals,
            record.card.has_lyrics,
            record.rated
        ],
    )?;
    trace!("Inserted `{}`", record.path);
    Ok(UpsertOutcome::Inserted)
}

fn get_row(conn: &Connection, path: &str) -> Result<Option<Track>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM tracks WHERE path = ?1"))?;
    Ok(stmt.query_row([path], track_from_row).optional()?)
}

fn track_from_row(row: &Row<'_>) -> rusqlite::Result<Track> {
    Ok(Track {
        id: row.get(0)?,
        path: row.get(1)?,
        title: row.get(2)?,
        artist: row.get(3)?,
        album: row.get(4)?,
        genre: row.get(5)?,
        duration: row.get(6)?,
        card: ScoreCard {
            melody: row.get(7)?,
            rhythm: row.get(8)?,
            vocals: row.get(9)?,
            lyrics: row.get(10)?,
            arrange: row.get(11)?,
            has_vocals: row.get(12)?,
            has_lyrics: row.get(13)?,
        },
        rated: row.get(14)?,
    })
}
