use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::app::playlist::{Entry, Playlist};

pub(crate) const HISTORY_CAP: usize = 100;

#[derive(Debug, Clone)]
pub(crate) struct PlaylistSummary {
    pub(crate) name: String,
    pub(crate) channels: usize,
    pub(crate) saved_at: String,
}

#[derive(Debug, Clone)]
pub(crate) struct HistoryEntry {
    pub(crate) entry: Entry,
    pub(crate) watched_at: String,
}

/// Last known playback position for one source URL, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ResumeRecord {
    pub(crate) position: f64,
    pub(crate) duration: f64,
}

impl ResumeRecord {
    /// Rejects the transient zero/NaN values some players report while a
    /// stream is still opening.
    pub(crate) fn is_storable(&self) -> bool {
        self.position.is_finite()
            && self.duration.is_finite()
            && self.position > 0.0
            && self.duration > 0.0
    }
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Ok(Self { conn })
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS playlists (
                name TEXT PRIMARY KEY,
                saved_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS playlist_entries (
                playlist_name TEXT NOT NULL REFERENCES playlists(name) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                title TEXT NOT NULL,
                group_name TEXT NOT NULL,
                logo_url TEXT NOT NULL,
                source_url TEXT NOT NULL,
                PRIMARY KEY (playlist_name, position)
            );
            CREATE TABLE IF NOT EXISTS favorites (
                source_url TEXT PRIMARY KEY,
                added_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS watch_history (
                source_url TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                group_name TEXT NOT NULL,
                logo_url TEXT NOT NULL,
                watched_at TEXT NOT NULL,
                seq INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS resume (
                source_url TEXT PRIMARY KEY,
                position REAL NOT NULL,
                duration REAL NOT NULL
            );
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(())
    }

    // ----- playlists -----

    pub(crate) fn save_playlist(&mut self, playlist: &Playlist) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO playlists (name, saved_at) VALUES (?1, ?2)
            ON CONFLICT(name) DO UPDATE SET saved_at = excluded.saved_at
            "#,
            params![playlist.name, now],
        )?;
        tx.execute(
            "DELETE FROM playlist_entries WHERE playlist_name = ?1",
            params![playlist.name],
        )?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO playlist_entries
                    (playlist_name, position, title, group_name, logo_url, source_url)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for (position, entry) in playlist.entries.iter().enumerate() {
                stmt.execute(params![
                    playlist.name,
                    position as i64,
                    entry.title,
                    entry.group,
                    entry.logo_url,
                    entry.source_url,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub(crate) fn load_playlist(&self, name: &str) -> Result<Option<Playlist>> {
        let known: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM playlists WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        let Some(name) = known else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            r#"
            SELECT title, group_name, logo_url, source_url
            FROM playlist_entries WHERE playlist_name = ?1 ORDER BY position
            "#,
        )?;
        let rows = stmt.query_map(params![name], |row| {
            Ok(Entry {
                title: row.get(0)?,
                group: row.get(1)?,
                logo_url: row.get(2)?,
                source_url: row.get(3)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(Some(Playlist::new(name, entries)))
    }

    pub(crate) fn list_playlists(&self) -> Result<Vec<PlaylistSummary>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT p.name, p.saved_at,
                   (SELECT COUNT(*) FROM playlist_entries e WHERE e.playlist_name = p.name)
            FROM playlists p ORDER BY p.saved_at DESC
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(PlaylistSummary {
                name: row.get(0)?,
                saved_at: row.get(1)?,
                channels: row.get::<_, i64>(2)? as usize,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub(crate) fn delete_playlist(&self, name: &str) -> Result<bool> {
        self.conn.execute(
            "DELETE FROM playlist_entries WHERE playlist_name = ?1",
            params![name],
        )?;
        let deleted = self
            .conn
            .execute("DELETE FROM playlists WHERE name = ?1", params![name])?;
        Ok(deleted > 0)
    }

    pub(crate) fn most_recent_playlist(&self) -> Result<Option<Playlist>> {
        let name: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM playlists ORDER BY saved_at DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        match name {
            Some(name) => self.load_playlist(&name),
            None => Ok(None),
        }
    }

    // ----- favorites -----

    /// Returns true when the entry is a favorite after the toggle.
    pub(crate) fn toggle_favorite(&self, source_url: &str) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM favorites WHERE source_url = ?1",
            params![source_url],
        )?;
        if removed > 0 {
            return Ok(false);
        }
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO favorites (source_url, added_at) VALUES (?1, ?2)",
            params![source_url, now],
        )?;
        Ok(true)
    }

    pub(crate) fn favorites(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT source_url FROM favorites ORDER BY added_at DESC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    // ----- watch history -----

    /// Upserts a history row, deduplicated by source URL, then prunes the
    /// table to the most recent `HISTORY_CAP` rows.
    pub(crate) fn push_history(&self, entry: &Entry) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r#"
            INSERT INTO watch_history (source_url, title, group_name, logo_url, watched_at, seq)
            VALUES (?1, ?2, ?3, ?4, ?5,
                    COALESCE((SELECT MAX(seq) FROM watch_history), 0) + 1)
            ON CONFLICT(source_url) DO UPDATE SET
                title = excluded.title,
                group_name = excluded.group_name,
                logo_url = excluded.logo_url,
                watched_at = excluded.watched_at,
                seq = excluded.seq
            "#,
            params![entry.source_url, entry.title, entry.group, entry.logo_url, now],
        )?;
        self.conn.execute(
            r#"
            DELETE FROM watch_history WHERE seq NOT IN
                (SELECT seq FROM watch_history ORDER BY seq DESC LIMIT ?1)
            "#,
            params![HISTORY_CAP as i64],
        )?;
        Ok(())
    }

    pub(crate) fn history(&self) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT source_url, title, group_name, logo_url, watched_at
            FROM watch_history ORDER BY seq DESC
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(HistoryEntry {
                entry: Entry {
                    source_url: row.get(0)?,
                    title: row.get(1)?,
                    group: row.get(2)?,
                    logo_url: row.get(3)?,
                },
                watched_at: row.get(4)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub(crate) fn clear_history(&self) -> Result<()> {
        self.conn.execute("DELETE FROM watch_history", [])?;
        Ok(())
    }

    // ----- resume positions -----

    pub(crate) fn upsert_resume(&self, source_url: &str, record: ResumeRecord) -> Result<()> {
        if !record.is_storable() {
            return Ok(());
        }
        self.conn.execute(
            r#"
            INSERT INTO resume (source_url, position, duration) VALUES (?1, ?2, ?3)
            ON CONFLICT(source_url) DO UPDATE SET
                position = excluded.position,
                duration = excluded.duration
            "#,
            params![source_url, record.position, record.duration],
        )?;
        Ok(())
    }

    pub(crate) fn resume_for(&self, source_url: &str) -> Result<Option<ResumeRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT position, duration FROM resume WHERE source_url = ?1",
                params![source_url],
                |row| {
                    Ok(ResumeRecord {
                        position: row.get(0)?,
                        duration: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Source URLs with a stored position beyond the resume threshold, for
    /// the catalog's resume markers.
    pub(crate) fn resumable_urls(&self, threshold: f64) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT source_url FROM resume WHERE position > ?1")?;
        let rows = stmt.query_map(params![threshold], |row| row.get(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    // ----- settings -----

    pub(crate) fn settings_json(&self) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = 'settings'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub(crate) fn save_settings_json(&self, value: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO settings (key, value) VALUES ('settings', ?1)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
            params![value],
        )?;
        Ok(())
    }

    /// Wipe every stored table. Irreversible; only reachable through an
    /// explicit `settings --clear-data` request.
    pub(crate) fn clear_all_data(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            DELETE FROM playlist_entries;
            DELETE FROM playlists;
            DELETE FROM favorites;
            DELETE FROM watch_history;
            DELETE FROM resume;
            DELETE FROM settings;
            "#,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    struct TempDb {
        path: PathBuf,
        db: Database,
    }

    impl TempDb {
        fn new() -> Self {
            let ts = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0);
            let path = std::env::temp_dir().join(format!(
                "flixtrack-test-{}-{ts}.db",
                std::process::id()
            ));
            let db = Database::open(&path).expect("open temp db");
            db.migrate().expect("migrate temp db");
            Self { path, db }
        }
    }

    impl Drop for TempDb {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    fn entry(n: usize) -> Entry {
        Entry {
            title: format!("Channel {n}"),
            group: "News".to_string(),
            logo_url: String::new(),
            source_url: format!("http://x/{n}.m3u8"),
        }
    }

    #[test]
    fn playlist_round_trip_preserves_entry_order() {
        let mut tmp = TempDb::new();
        let playlist = Playlist::new("Evening", (0..5).map(entry).collect());
        tmp.db.save_playlist(&playlist).expect("save");

        let loaded = tmp
            .db
            .load_playlist("Evening")
            .expect("load")
            .expect("playlist should exist");
        let saved_urls: Vec<_> = playlist.entries.iter().map(|e| &e.source_url).collect();
        let loaded_urls: Vec<_> = loaded.entries.iter().map(|e| &e.source_url).collect();
        assert_eq!(saved_urls, loaded_urls);
    }

    #[test]
    fn resaving_a_playlist_replaces_its_entries() {
        let mut tmp = TempDb::new();
        tmp.db
            .save_playlist(&Playlist::new("P", (0..5).map(entry).collect()))
            .expect("save");
        tmp.db
            .save_playlist(&Playlist::new("P", (0..2).map(entry).collect()))
            .expect("resave");

        let loaded = tmp.db.load_playlist("P").expect("load").expect("exists");
        assert_eq!(loaded.entries.len(), 2);
        assert_eq!(tmp.db.list_playlists().expect("list").len(), 1);
    }

    #[test]
    fn delete_playlist_reports_missing_names() {
        let mut tmp = TempDb::new();
        tmp.db
            .save_playlist(&Playlist::new("Gone", vec![entry(1)]))
            .expect("save");
        assert!(tmp.db.delete_playlist("Gone").expect("delete"));
        assert!(!tmp.db.delete_playlist("Gone").expect("second delete"));
        assert!(tmp.db.load_playlist("Gone").expect("load").is_none());
    }

    #[test]
    fn favorite_toggle_flips_membership() {
        let tmp = TempDb::new();
        assert!(tmp.db.toggle_favorite("http://x/1").expect("add"));
        assert!(tmp.db.favorites().expect("list").contains(&"http://x/1".to_string()));
        assert!(!tmp.db.toggle_favorite("http://x/1").expect("remove"));
        assert!(tmp.db.favorites().expect("list").is_empty());
    }

    #[test]
    fn history_is_capped_and_most_recent_first() {
        let tmp = TempDb::new();
        for n in 0..(HISTORY_CAP + 1) {
            tmp.db.push_history(&entry(n)).expect("push");
        }
        let history = tmp.db.history().expect("history");
        assert_eq!(history.len(), HISTORY_CAP);
        assert_eq!(history[0].entry.source_url, entry(HISTORY_CAP).source_url);
        // The oldest row was evicted.
        assert!(
            !history
                .iter()
                .any(|h| h.entry.source_url == entry(0).source_url)
        );
    }

    #[test]
    fn rewatching_moves_an_entry_to_the_front_without_duplicating() {
        let tmp = TempDb::new();
        tmp.db.push_history(&entry(1)).expect("push");
        tmp.db.push_history(&entry(2)).expect("push");
        tmp.db.push_history(&entry(1)).expect("rewatch");

        let history = tmp.db.history().expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].entry.source_url, entry(1).source_url);
    }

    #[test]
    fn resume_rejects_transient_zero_and_nan_values() {
        let tmp = TempDb::new();
        let url = "http://x/resume";
        for record in [
            ResumeRecord {
                position: 0.0,
                duration: 100.0,
            },
            ResumeRecord {
                position: 10.0,
                duration: 0.0,
            },
            ResumeRecord {
                position: f64::NAN,
                duration: 100.0,
            },
        ] {
            tmp.db.upsert_resume(url, record).expect("upsert");
        }
        assert!(tmp.db.resume_for(url).expect("lookup").is_none());

        let good = ResumeRecord {
            position: 42.5,
            duration: 3600.0,
        };
        tmp.db.upsert_resume(url, good).expect("upsert");
        assert_eq!(tmp.db.resume_for(url).expect("lookup"), Some(good));
    }

    #[test]
    fn settings_round_trip_through_json_rows() {
        let tmp = TempDb::new();
        assert!(tmp.db.settings_json().expect("read").is_none());
        tmp.db
            .save_settings_json(r#"{"auto_advance":false}"#)
            .expect("write");
        assert_eq!(
            tmp.db.settings_json().expect("read").as_deref(),
            Some(r#"{"auto_advance":false}"#)
        );
    }

    #[test]
    fn clear_all_data_wipes_every_table() {
        let mut tmp = TempDb::new();
        tmp.db
            .save_playlist(&Playlist::new("P", vec![entry(1)]))
            .expect("save");
        tmp.db.toggle_favorite("http://x/1.m3u8").expect("favorite");
        tmp.db.push_history(&entry(1)).expect("history");
        tmp.db
            .upsert_resume(
                "http://x/1.m3u8",
                ResumeRecord {
                    position: 42.0,
                    duration: 3600.0,
                },
            )
            .expect("resume");
        tmp.db.save_settings_json("{}").expect("settings");

        tmp.db.clear_all_data().expect("clear");

        assert!(tmp.db.list_playlists().expect("list").is_empty());
        assert!(tmp.db.favorites().expect("favorites").is_empty());
        assert!(tmp.db.history().expect("history").is_empty());
        assert!(tmp.db.resume_for("http://x/1.m3u8").expect("resume").is_none());
        assert!(tmp.db.settings_json().expect("settings").is_none());
    }
}
