mod models;
mod social;

pub use models::{
    Comment, ImageQuality, LibraryEntry, MangaStatus, ReaderSettings, User, MAX_SCROLL_SPEED,
};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use std::path::Path;

/// What the reader needs from the preference store: settings to read and
/// progress to write.
pub trait PreferenceStore {
    fn reader_settings(&self) -> anyhow::Result<ReaderSettings>;
    fn current_user(&self) -> anyhow::Result<Option<User>>;
    /// Merges progress into the library entry for `manga_id`. Returns false
    /// when the manga is not in the library.
    fn update_last_read(&self, manga_id: &str, chapter_id: &str, page: usize) -> anyhow::Result<bool>;
}

pub struct Db {
    conn: Connection,
}

pub(crate) fn now() -> String {
    Utc::now().to_rfc3339()
}

impl Db {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self { conn })
    }

    fn init(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS user (
                slot INTEGER PRIMARY KEY CHECK (slot = 0),
                id TEXT NOT NULL,
                username TEXT NOT NULL,
                name TEXT NOT NULL,
                email TEXT,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS library (
                manga_id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                status TEXT NOT NULL,
                last_read_chapter TEXT,
                last_read_page INTEGER,
                date_added TEXT NOT NULL,
                date_updated TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS reader_settings (
                slot INTEGER PRIMARY KEY CHECK (slot = 0),
                auto_scroll_speed INTEGER NOT NULL,
                infinite_scroll INTEGER NOT NULL,
                image_quality TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS likes (
                user_id TEXT NOT NULL,
                manga_id TEXT NOT NULL,
                PRIMARY KEY (user_id, manga_id)
            );
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                username TEXT NOT NULL,
                manga_id TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    // Identity. No credentials are involved; logging in only names the reader.

    pub fn login(&self, username: &str, email: Option<&str>) -> Result<User> {
        let user = User {
            id: format!("user-{}", Utc::now().timestamp_millis()),
            username: username.to_string(),
            name: username.to_string(),
            email: email.map(str::to_string),
        };
        self.conn.execute(
            "INSERT OR REPLACE INTO user (slot, id, username, name, email, created_at)
             VALUES (0, ?1, ?2, ?3, ?4, ?5)",
            params![user.id, user.username, user.name, user.email, now()],
        )?;
        log::info!("Logged in as {}", user.username);
        Ok(user)
    }

    pub fn logout(&self) -> Result<()> {
        self.conn.execute("DELETE FROM user", [])?;
        Ok(())
    }

    pub fn get_user(&self) -> Result<Option<User>> {
        self.conn
            .query_row("SELECT id, username, name, email FROM user WHERE slot = 0", [], |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    name: row.get(2)?,
                    email: row.get(3)?,
                })
            })
            .optional()
    }

    // Library

    /// Adds or replaces the entry, keeping progress if it already existed.
    pub fn add_to_library(&self, manga_id: &str, title: &str, status: MangaStatus) -> Result<()> {
        let stamp = now();
        self.conn.execute(
            "INSERT INTO library (manga_id, title, status, date_added, date_updated)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(manga_id) DO UPDATE SET
                title = excluded.title,
                status = excluded.status,
                date_updated = excluded.date_updated",
            params![manga_id, title, status.as_str(), stamp],
        )?;
        Ok(())
    }

    pub fn update_status(&self, manga_id: &str, status: MangaStatus) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE library SET status = ?1, date_updated = ?2 WHERE manga_id = ?3",
            params![status.as_str(), now(), manga_id],
        )?;
        Ok(changed > 0)
    }

    pub fn set_last_read(&self, manga_id: &str, chapter_id: &str, page: usize) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE library SET last_read_chapter = ?1, last_read_page = ?2, date_updated = ?3
             WHERE manga_id = ?4",
            params![chapter_id, page as i64, now(), manga_id],
        )?;
        Ok(changed > 0)
    }

    pub fn remove_from_library(&self, manga_id: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM library WHERE manga_id = ?1", params![manga_id])?;
        Ok(changed > 0)
    }

    fn entry_from_row(row: &Row) -> Result<LibraryEntry> {
        let status: String = row.get(2)?;
        let page: Option<i64> = row.get(4)?;
        Ok(LibraryEntry {
            manga_id: row.get(0)?,
            title: row.get(1)?,
            status: status.parse().unwrap_or(MangaStatus::Reading),
            last_read_chapter: row.get(3)?,
            last_read_page: page.map(|p| p.max(0) as usize),
            date_added: row.get(5)?,
            date_updated: row.get(6)?,
        })
    }

    pub fn get_library(&self) -> Result<Vec<LibraryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT manga_id, title, status, last_read_chapter, last_read_page, date_added, date_updated
             FROM library ORDER BY date_updated DESC",
        )?;
        let entries = stmt.query_map([], Self::entry_from_row)?;
        entries.collect()
    }

    pub fn get_entry(&self, manga_id: &str) -> Result<Option<LibraryEntry>> {
        self.conn
            .query_row(
                "SELECT manga_id, title, status, last_read_chapter, last_read_page, date_added, date_updated
                 FROM library WHERE manga_id = ?1",
                params![manga_id],
                Self::entry_from_row,
            )
            .optional()
    }

    // Reader settings

    pub fn get_reader_settings(&self) -> Result<ReaderSettings> {
        let stored = self
            .conn
            .query_row(
                "SELECT auto_scroll_speed, infinite_scroll, image_quality FROM reader_settings WHERE slot = 0",
                [],
                |row| {
                    let speed: i64 = row.get(0)?;
                    let infinite: bool = row.get(1)?;
                    let quality: String = row.get(2)?;
                    Ok(ReaderSettings {
                        infinite_scroll: infinite,
                        image_quality: quality.parse().unwrap_or_default(),
                        ..ReaderSettings::default()
                    }
                    .with_speed(speed))
                },
            )
            .optional()?;
        Ok(stored.unwrap_or_default())
    }

    pub fn save_reader_settings(&self, settings: &ReaderSettings) -> Result<()> {
        let settings = settings.with_speed(settings.auto_scroll_speed as i64);
        self.conn.execute(
            "INSERT OR REPLACE INTO reader_settings (slot, auto_scroll_speed, infinite_scroll, image_quality)
             VALUES (0, ?1, ?2, ?3)",
            params![
                settings.auto_scroll_speed as i64,
                settings.infinite_scroll,
                settings.image_quality.as_str()
            ],
        )?;
        Ok(())
    }
}

impl PreferenceStore for Db {
    fn reader_settings(&self) -> anyhow::Result<ReaderSettings> {
        Ok(self.get_reader_settings()?)
    }

    fn current_user(&self) -> anyhow::Result<Option<User>> {
        Ok(self.get_user()?)
    }

    fn update_last_read(&self, manga_id: &str, chapter_id: &str, page: usize) -> anyhow::Result<bool> {
        Ok(self.set_last_read(manga_id, chapter_id, page)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_default_until_saved() {
        let db = Db::open_in_memory().unwrap();
        assert_eq!(db.get_reader_settings().unwrap(), ReaderSettings::default());

        let custom = ReaderSettings {
            auto_scroll_speed: 6,
            infinite_scroll: false,
            image_quality: ImageQuality::High,
        };
        db.save_reader_settings(&custom).unwrap();
        assert_eq!(db.get_reader_settings().unwrap(), custom);
    }

    #[test]
    fn saved_speed_is_clamped() {
        let db = Db::open_in_memory().unwrap();
        let wild = ReaderSettings {
            auto_scroll_speed: 99,
            ..ReaderSettings::default()
        };
        db.save_reader_settings(&wild).unwrap();
        assert_eq!(db.get_reader_settings().unwrap().auto_scroll_speed, MAX_SCROLL_SPEED);
    }

    #[test]
    fn last_read_merges_into_existing_entry_only() {
        let db = Db::open_in_memory().unwrap();
        assert!(!db.set_last_read("m1", "c1", 3).unwrap());
        assert!(db.get_entry("m1").unwrap().is_none());

        db.add_to_library("m1", "Title", MangaStatus::Reading).unwrap();
        assert!(db.set_last_read("m1", "c1", 3).unwrap());

        let entry = db.get_entry("m1").unwrap().unwrap();
        assert_eq!(entry.last_read_chapter.as_deref(), Some("c1"));
        assert_eq!(entry.last_read_page, Some(3));
        assert_eq!(entry.status, MangaStatus::Reading);
    }

    #[test]
    fn re_adding_keeps_progress() {
        let db = Db::open_in_memory().unwrap();
        db.add_to_library("m1", "Title", MangaStatus::PlanToRead).unwrap();
        db.set_last_read("m1", "c9", 12).unwrap();
        db.add_to_library("m1", "Better Title", MangaStatus::Reading).unwrap();

        let entry = db.get_entry("m1").unwrap().unwrap();
        assert_eq!(entry.title, "Better Title");
        assert_eq!(entry.last_read_chapter.as_deref(), Some("c9"));
        assert_eq!(db.get_library().unwrap().len(), 1);
    }

    #[test]
    fn status_update_and_removal() {
        let db = Db::open_in_memory().unwrap();
        db.add_to_library("m1", "Title", MangaStatus::Reading).unwrap();
        assert!(db.update_status("m1", MangaStatus::Completed).unwrap());
        assert_eq!(db.get_entry("m1").unwrap().unwrap().status, MangaStatus::Completed);
        assert!(db.remove_from_library("m1").unwrap());
        assert!(!db.remove_from_library("m1").unwrap());
    }

    #[test]
    fn login_replaces_previous_user() {
        let db = Db::open_in_memory().unwrap();
        assert!(db.get_user().unwrap().is_none());
        db.login("alice", None).unwrap();
        db.login("bob", Some("bob@example.org")).unwrap();
        let user = db.get_user().unwrap().unwrap();
        assert_eq!(user.username, "bob");
        assert_eq!(user.email.as_deref(), Some("bob@example.org"));
        db.logout().unwrap();
        assert!(db.current_user().unwrap().is_none());
    }
}
