//! The database store.
//!
//! Maps logical database names to open SQLite handles. Handles are opened
//! at most once per name, cached for the lifetime of the process, and
//! shared by every session that selects the same name.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::info;

use super::error::ServerResult;

/// An open handle on one backing database file.
///
/// SQLite connections are not thread-safe for shared use, so each handle
/// carries its own lock; SQLite's file locking governs anything beyond
/// that.
pub type DbHandle = Arc<Mutex<Connection>>;

/// Container for every open logical database.
pub struct Store {
    /// Directory holding one `<name>.db` file per logical database.
    basedir: PathBuf,
    /// URI-style options appended to every file when opened.
    options: String,
    /// Lower-cased logical name to open handle.
    databases: Mutex<HashMap<String, DbHandle>>,
}

impl Store {
    /// Opens a store over `dir`, eagerly opening every existing `*.db`
    /// file found there.
    ///
    /// A file that cannot be opened or fails the liveness probe makes the
    /// whole call fail; callers treat that as fatal at startup.
    pub fn open(dir: impl Into<PathBuf>, options: impl Into<String>) -> ServerResult<Self> {
        let basedir = dir.into();
        let options = options.into();
        let mut databases = HashMap::new();

        for entry in fs::read_dir(&basedir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("db") {
                continue;
            }
            let name = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or_default()
                .to_lowercase();
            let handle = open_database(&path, &options)?;
            info!(database = %name, file = %path.display(), "opened existing database");
            databases.insert(name, handle);
        }

        Ok(Self {
            basedir,
            options,
            databases: Mutex::new(databases),
        })
    }

    /// Returns the handle for `name`, opening it first if this is the
    /// first time the name is requested.
    ///
    /// Names are case-insensitive. Opening a name with no backing file
    /// creates the file. The whole lookup-or-create runs under one lock,
    /// so concurrent requests for the same unseen name produce a single
    /// handle.
    pub fn get(&self, name: &str) -> ServerResult<DbHandle> {
        let name = name.to_lowercase();
        let mut databases = self.databases.lock().unwrap();

        if let Some(handle) = databases.get(&name) {
            return Ok(handle.clone());
        }

        let path = self.basedir.join(format!("{name}.db"));
        let handle = open_database(&path, &self.options)?;
        info!(database = %name, file = %path.display(), "created database");
        databases.insert(name, handle.clone());

        Ok(handle)
    }

    /// Returns the directory backing this store.
    pub fn basedir(&self) -> &Path {
        &self.basedir
    }
}

/// Opens one SQLite file, carrying the store's option string as URI
/// parameters, and probes the schema catalog so unreadable files fail
/// here rather than on first use.
fn open_database(path: &Path, options: &str) -> ServerResult<DbHandle> {
    let conn = if options.is_empty() {
        Connection::open(path)?
    } else {
        Connection::open(format!("file:{}?{}", path.display(), options))?
    };
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |_| Ok(()))?;
    Ok(Arc::new(Mutex::new(conn)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> Store {
        Store::open(dir.path(), "cache=shared").unwrap()
    }

    #[test]
    fn test_get_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let a = store.get("Foo").unwrap();
        let b = store.get("foo").unwrap();
        let c = store.get("FOO").unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
    }

    #[test]
    fn test_get_creates_backing_file() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.get("Orders").unwrap();

        assert!(dir.path().join("orders.db").exists());
    }

    #[test]
    fn test_concurrent_get_yields_one_handle() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(open_store(&dir));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.get("shared").unwrap())
            })
            .collect();

        let first = store.get("shared").unwrap();
        for worker in workers {
            let handle = worker.join().unwrap();
            assert!(Arc::ptr_eq(&first, &handle));
        }
    }

    #[test]
    fn test_open_scans_existing_databases() {
        let dir = TempDir::new().unwrap();
        {
            let conn = Connection::open(dir.path().join("Inventory.db")).unwrap();
            conn.execute("CREATE TABLE parts (id INTEGER)", []).unwrap();
        }

        let store = open_store(&dir);
        let handle = store.get("inventory").unwrap();
        let conn = handle.lock().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE name = 'parts'",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(count, 1);
    }

    #[test]
    fn test_open_fails_on_unreadable_database() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.db"), vec![0x2a; 4096]).unwrap();

        assert!(Store::open(dir.path(), "").is_err());
    }
}
