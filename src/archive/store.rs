use crate::archive::search::search_text;
use crate::archive::types::{from_micros, to_micros, ArchiveStats, NewItem};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Errors from archive operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("item already archived in tab '{tab}'")]
    Duplicate { tab: String },

    #[error("archive IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("lock poisoned")]
    LockPoisoned,
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        tab TEXT NOT NULL,
        content TEXT NOT NULL,
        -- content with NUL replaced; LIKE and FTS5 stop reading at NUL
        search_text TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        archived_at INTEGER NOT NULL,
        UNIQUE (tab, content_hash)
    );

    CREATE INDEX IF NOT EXISTS items_tab_idx ON items(tab);
    CREATE INDEX IF NOT EXISTS items_archived_idx ON items(archived_at DESC, id);

    CREATE VIRTUAL TABLE IF NOT EXISTS items_fts USING fts5(
        search_text,
        content='items',
        content_rowid='id',
        tokenize='trigram'
    );

    CREATE TRIGGER IF NOT EXISTS items_ai AFTER INSERT ON items BEGIN
        INSERT INTO items_fts(rowid, search_text) VALUES (new.id, new.search_text);
    END;

    CREATE TRIGGER IF NOT EXISTS items_no_update BEFORE UPDATE ON items BEGIN
        SELECT RAISE(ABORT, 'archived items are immutable');
    END;

    CREATE TRIGGER IF NOT EXISTS items_no_delete BEFORE DELETE ON items BEGIN
        SELECT RAISE(ABORT, 'archive is append-only');
    END;
";

/// SQLite archive of clipboard items, unique on (tab, content). Thread-safe via Mutex.
///
/// Each handle owns its own connection; independent handles (or processes) on the
/// same file serialize through SQLite's write lock and the UNIQUE constraint.
#[derive(Debug)]
pub struct ArchiveStore {
    conn: Mutex<Connection>,
}

impl ArchiveStore {
    /// Open (or create) an archive at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA synchronous=NORMAL;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory archive (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Whether `(content, tab)` is already archived.
    pub fn exists(&self, content: &str, tab: &str) -> Result<bool, StoreError> {
        let hash = content_hash(content);
        let conn = self.lock()?;
        let found: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM items WHERE tab = ?1 AND content_hash = ?2)",
            rusqlite::params![tab, hash],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    /// Insert a new item and return its id.
    /// Fails with `StoreError::Duplicate` if `(content, tab)` is already present,
    /// whether or not the caller checked `exists` first.
    pub fn insert(&self, item: &NewItem) -> Result<i64, StoreError> {
        let hash = content_hash(&item.content);
        let conn = self.lock()?;
        let result = conn.execute(
            "INSERT INTO items (tab, content, search_text, content_hash, archived_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                item.tab,
                item.content,
                search_text(&item.content),
                hash,
                to_micros(item.archived_at)
            ],
        );
        match result {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Err(StoreError::Duplicate { tab: item.tab.clone() })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Distinct tab names present in the archive.
    pub fn list_tabs(&self) -> Result<BTreeSet<String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT DISTINCT tab FROM items")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut tabs = BTreeSet::new();
        for row in rows {
            tabs.insert(row?);
        }
        Ok(tabs)
    }

    pub fn has_tab(&self, tab: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let found: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM items WHERE tab = ?1)",
            rusqlite::params![tab],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    pub fn stats(&self) -> Result<ArchiveStats, StoreError> {
        let conn = self.lock()?;
        let (items, distinct_contents, tabs): (i64, i64, i64) = conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT content_hash), COUNT(DISTINCT tab) FROM items",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        Ok(ArchiveStats {
            items: items.max(0) as u64,
            distinct_contents: distinct_contents.max(0) as u64,
            tabs: tabs.max(0) as u64,
        })
    }

    /// Timestamp for a new save pass: `now`, unless the archive already holds a later
    /// `archived_at` (clock stepped back), in which case that value is reused.
    pub fn pass_timestamp(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, StoreError> {
        let conn = self.lock()?;
        let latest: Option<i64> = conn
            .query_row("SELECT MAX(archived_at) FROM items", [], |row| row.get(0))
            .optional()?
            .flatten();
        Ok(match latest.map(from_micros) {
            Some(latest) if latest > now => latest,
            _ => now,
        })
    }
}

pub(crate) fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::{Arc, Barrier};

    fn item(tab: &str, content: &str) -> NewItem {
        NewItem {
            tab: tab.to_string(),
            content: content.to_string(),
            source_rank: 0,
            archived_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn open_in_memory() {
        let store = ArchiveStore::in_memory();
        assert!(store.is_ok(), "{store:?}");
    }

    #[test]
    fn open_on_disk_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("history.db");
        let store = ArchiveStore::open(&db_path);
        assert!(store.is_ok(), "{store:?}");
        assert!(db_path.exists());
    }

    #[test]
    fn reopen_keeps_items() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("history.db");
        {
            let store = ArchiveStore::open(&db_path).unwrap();
            store.insert(&item("work", "foo")).unwrap();
        }
        let store = ArchiveStore::open(&db_path).unwrap();
        assert!(store.exists("foo", "work").unwrap());
    }

    #[test]
    fn insert_then_exists() {
        let store = ArchiveStore::in_memory().unwrap();
        assert!(!store.exists("foo", "work").unwrap());
        store.insert(&item("work", "foo")).unwrap();
        assert!(store.exists("foo", "work").unwrap());
        assert!(!store.exists("foo", "personal").unwrap());
        assert!(!store.exists("fo", "work").unwrap());
    }

    #[test]
    fn duplicate_insert_rejected() {
        let store = ArchiveStore::in_memory().unwrap();
        store.insert(&item("work", "foo")).unwrap();
        let second = store.insert(&item("work", "foo"));
        assert!(
            matches!(second, Err(StoreError::Duplicate { ref tab }) if tab == "work"),
            "{second:?}"
        );
        assert_eq!(store.stats().unwrap().items, 1);
    }

    #[test]
    fn same_content_in_other_tab_is_distinct() {
        let store = ArchiveStore::in_memory().unwrap();
        store.insert(&item("work", "foo")).unwrap();
        store.insert(&item("personal", "foo")).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.items, 2);
        assert_eq!(stats.distinct_contents, 1);
        assert_eq!(stats.tabs, 2);
    }

    #[test]
    fn ids_increase_with_insertion_order() {
        let store = ArchiveStore::in_memory().unwrap();
        let a = store.insert(&item("work", "a")).unwrap();
        let b = store.insert(&item("work", "b")).unwrap();
        assert!(b > a);
    }

    #[test]
    fn archive_rejects_update_and_delete() {
        let store = ArchiveStore::in_memory().unwrap();
        store.insert(&item("work", "foo")).unwrap();
        let conn = store.lock().unwrap();
        assert!(conn.execute("UPDATE items SET content = 'bar'", []).is_err());
        assert!(conn.execute("DELETE FROM items", []).is_err());
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn list_tabs_is_distinct() {
        let store = ArchiveStore::in_memory().unwrap();
        store.insert(&item("work", "foo")).unwrap();
        store.insert(&item("work", "bar")).unwrap();
        store.insert(&item("personal", "baz")).unwrap();
        let tabs = store.list_tabs().unwrap();
        assert_eq!(tabs.into_iter().collect::<Vec<_>>(), vec!["personal", "work"]);
        assert!(store.has_tab("work").unwrap());
        assert!(!store.has_tab("wrok").unwrap());
    }

    #[test]
    fn pass_timestamp_never_goes_backwards() {
        let store = ArchiveStore::in_memory().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(store.pass_timestamp(now).unwrap(), now);

        // Existing item archived "in the future" relative to a skewed clock
        store.insert(&item("work", "foo")).unwrap();
        let latest = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(store.pass_timestamp(now).unwrap(), latest);

        let later = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(store.pass_timestamp(later).unwrap(), later);
    }

    #[test]
    fn concurrent_connections_insert_once() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("history.db");
        let stores = [
            Arc::new(ArchiveStore::open(&db_path).unwrap()),
            Arc::new(ArchiveStore::open(&db_path).unwrap()),
        ];
        let barrier = Arc::new(Barrier::new(stores.len()));

        let handles: Vec<_> = stores
            .iter()
            .map(|store| {
                let store = Arc::clone(store);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    let mut inserted = 0;
                    let mut duplicates = 0;
                    for i in 0..100 {
                        match store.insert(&item("work", &format!("clip {i}"))) {
                            Ok(_) => inserted += 1,
                            Err(StoreError::Duplicate { .. }) => duplicates += 1,
                            Err(e) => return Err(e),
                        }
                    }
                    Ok((inserted, duplicates))
                })
            })
            .collect();

        let mut inserted = 0;
        let mut duplicates = 0;
        for handle in handles {
            let (i, d) = handle.join().unwrap().unwrap();
            inserted += i;
            duplicates += d;
        }
        assert_eq!(inserted, 100);
        assert_eq!(duplicates, 100);
        assert_eq!(stores[0].stats().unwrap().items, 100);
    }
}
