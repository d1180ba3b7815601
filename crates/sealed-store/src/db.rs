use std::path::Path;

use rusqlite::Connection;

use crate::StoreError;

/// Owned SQLite connection with the sealed schema applied.
///
/// Callers borrow [`Database::conn`] (or open a transaction on
/// [`Database::conn_mut`]) to build a [`crate::Ctx`] per call chain.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.run_migrations()?;
        tracing::debug!(path = %path.display(), "database ready");
        Ok(db)
    }

    /// Open an in-memory database (tests and smoke runs).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    fn run_migrations(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS project (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                projectkey  TEXT NOT NULL UNIQUE,
                name        TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS application (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id       INTEGER NOT NULL REFERENCES project(id) ON DELETE CASCADE,
                name             TEXT NOT NULL,
                description      TEXT NOT NULL DEFAULT '',
                icon             TEXT NOT NULL DEFAULT '',
                from_repository  TEXT NOT NULL DEFAULT '',
                last_modified    TEXT NOT NULL,
                data             TEXT NOT NULL DEFAULT '{}',
                signature        BLOB NOT NULL,
                signature_form   TEXT NOT NULL,
                UNIQUE (project_id, name)
            );

            CREATE INDEX IF NOT EXISTS idx_application_repository
                ON application(project_id, from_repository);
            ",
        )?;

        tracing::debug!("database migrations completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(db: &Database, name: &str) -> bool {
        let count: i64 = db
            .conn()
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [name],
                |row| row.get(0),
            )
            .unwrap();
        count == 1
    }

    #[test]
    fn schema_creates_tables() {
        let db = Database::open_in_memory().unwrap();
        assert!(table_exists(&db, "project"));
        assert!(table_exists(&db, "application"));
    }

    #[test]
    fn migrations_are_idempotent() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.run_migrations().is_ok());
    }

    #[test]
    fn open_creates_file_and_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sealed.db");
        {
            let _db = Database::open(&path).unwrap();
        }
        assert!(path.exists());
        let reopened = Database::open(&path).unwrap();
        assert!(table_exists(&reopened, "application"));
    }
}
