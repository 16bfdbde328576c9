//! Database handle
//!
//! Wraps a single SQLite connection behind a mutex so the handle can be
//! shared across threads; every query holds the lock for its duration.

use crate::error::{Error, Result};
use crate::time::BucketZone;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an existing store without write access.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch("PRAGMA query_only = ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Install the full store schema
    pub fn migrate(&self) -> Result<()> {
        let conn = self.connection()?;
        super::schema::run_migrations(&conn)
    }

    /// Install the store schema up to `version`
    pub fn migrate_to(&self, version: i32) -> Result<()> {
        let conn = self.connection()?;
        super::schema::run_migrations_to(&conn, version)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }

    /// Run `f` inside one read transaction with the `lens_*` functions
    /// registered for `tz`.
    pub fn read<Tz, T, F>(&self, tz: Tz, f: F) -> Result<T>
    where
        Tz: BucketZone,
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connection()?;
        super::functions::register_time_functions(&conn, tz)?;
        let tx = conn.unchecked_transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Oldest `created_at` in the event table, if any.
    pub fn min_created_at(&self) -> Result<Option<i64>> {
        let conn = self.connection()?;
        min_created_at(&conn)
    }

    /// Size of the database file in bytes (page_count * page_size).
    pub fn get_database_size(&self) -> Result<u64> {
        let conn = self.connection()?;
        let size: i64 = conn.query_row(
            "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
            [],
            |row| row.get(0),
        )?;
        Ok(size.max(0) as u64)
    }
}

/// Oldest `created_at` in `messages`, `None` when the table is empty.
pub(crate) fn min_created_at(conn: &Connection) -> Result<Option<i64>> {
    let min: Option<i64> =
        conn.query_row("SELECT MIN(created_at) FROM messages", [], |row| row.get(0))?;
    Ok(min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rusqlite::params;

    #[test]
    fn test_min_created_at_empty_and_populated() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        assert_eq!(db.min_created_at().unwrap(), None);

        {
            let conn = db.connection().unwrap();
            for (id, ts) in [("a", 5_000i64), ("b", 1_000)] {
                conn.execute(
                    "INSERT INTO messages (id, session_id, role, created_at)
                     VALUES (?1, 's', 'user', ?2)",
                    params![id, ts],
                )
                .unwrap();
            }
        }
        assert_eq!(db.min_created_at().unwrap(), Some(1_000));
    }

    #[test]
    fn test_read_registers_functions() {
        let db = Database::open_in_memory().unwrap();
        let hour: i64 = db
            .read(Utc, |conn| {
                Ok(conn.query_row("SELECT lens_hour(3600000 * 5)", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(hour, 5);
    }

    #[test]
    fn test_missing_table_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.min_created_at().is_err());
    }

    #[test]
    fn test_read_only_open() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("usage.db");
        {
            let conn = Connection::open(&path).unwrap();
            crate::db::schema::run_migrations(&conn).unwrap();
        }
        let db = Database::open_read_only(&path).unwrap();
        assert_eq!(db.min_created_at().unwrap(), None);
        assert!(db.get_database_size().unwrap() > 0);

        let conn = db.connection().unwrap();
        let write = conn.execute(
            "INSERT INTO messages (id, session_id, role, created_at) VALUES ('x', 's', 'user', 1)",
            [],
        );
        assert!(write.is_err());
    }
}
