mod applications;
mod jobs;
mod locations;
mod profiles;
mod schema;
mod settings;
mod users;

pub use jobs::JobFilter;
pub use schema::{INDEXES, MIGRATIONS, SCHEMA, TABLES};

use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ListDecodeError, StoreError, StoreResult};

/// Text stored in list columns when nothing has been written.
pub const EMPTY_LIST: &str = "[]";

pub struct Database {
    conn: Connection,
    path: PathBuf,
    password_cost: u32,
}

impl Database {
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened database");
        Self::from_connection(conn, path.to_path_buf())
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, PathBuf::from(":memory:"))
    }

    fn from_connection(conn: Connection, path: PathBuf) -> StoreResult<Self> {
        // SQLite ignores declared foreign keys unless asked per connection.
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self {
            conn,
            path,
            password_cost: bcrypt::DEFAULT_COST,
        })
    }

    /// bcrypt cost used when hashing new passwords.
    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.password_cost = cost;
        self
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn init(&self) -> StoreResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        self.run_migrations()?;
        info!(path = %self.path.display(), "schema initialized");
        Ok(())
    }

    fn run_migrations(&self) -> StoreResult<()> {
        for (table, column, statement) in MIGRATIONS {
            if !self.has_column(table, column)? {
                self.conn.execute(statement, [])?;
                info!(table, column, "applied migration");
            }
        }
        Ok(())
    }

    fn has_column(&self, table: &str, column: &str) -> StoreResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
            [table, column],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Names of the store's tables that are missing from this database.
    pub fn missing_tables(&self) -> StoreResult<Vec<&'static str>> {
        let mut missing = Vec::new();
        for table in TABLES {
            let count: i64 = self.conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name = ?1",
                [table],
                |row| row.get(0),
            )?;
            if count == 0 {
                missing.push(*table);
            }
        }
        Ok(missing)
    }

    pub fn ensure_initialized(&self) -> StoreResult<()> {
        let missing = self.missing_tables()?;
        if !missing.is_empty() {
            return Err(StoreError::NotInitialized { missing });
        }
        Ok(())
    }
}

pub(crate) fn encode_list<T: Serialize>(items: &[T]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| EMPTY_LIST.to_string())
}

/// Read a JSON list column. NULL and blank text read as empty.
pub(crate) fn decode_list<T: DeserializeOwned>(
    row: &Row,
    idx: usize,
    column: &'static str,
) -> rusqlite::Result<Vec<T>> {
    let text: Option<String> = row.get(idx)?;
    match text.as_deref().map(str::trim) {
        None | Some("") => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(raw).map_err(|source| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                Type::Text,
                Box::new(ListDecodeError { column, source }),
            )
        }),
    }
}

#[cfg(test)]
pub(crate) fn test_db() -> Database {
    let db = Database::open_in_memory().unwrap().with_password_cost(4);
    db.init().unwrap();
    db
}

#[cfg(test)]
pub(crate) fn sample_job(source: &str, source_id: &str) -> crate::models::Job {
    crate::models::Job {
        source: source.into(),
        source_id: source_id.into(),
        title: "Engineer".into(),
        company: "Acme".into(),
        location: "Remote".into(),
        url: "http://x".into(),
        scraped_at: "2024-01-01".into(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_tables_and_indexes() {
        let db = test_db();
        assert!(db.missing_tables().unwrap().is_empty());

        for index in INDEXES {
            let count: i64 = db
                .conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name = ?1",
                    [index],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing index {}", index);
        }
    }

    #[test]
    fn test_init_is_idempotent() {
        let db = test_db();
        db.init().unwrap();
        db.ensure_initialized().unwrap();
    }

    #[test]
    fn test_uninitialized_database_is_reported() {
        let db = Database::open_in_memory().unwrap();
        let err = db.ensure_initialized().unwrap_err();
        assert!(err.to_string().contains("sidequest init"));
        assert_eq!(db.missing_tables().unwrap().len(), TABLES.len());
    }

    #[test]
    fn test_migration_adds_preferred_job_sources() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .execute_batch(
                "CREATE TABLE profiles (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT DEFAULT '',
                    major TEXT DEFAULT '',
                    skills TEXT DEFAULT '[]',
                    interests TEXT DEFAULT '[]',
                    min_hourly_rate REAL,
                    max_hours_per_week INTEGER,
                    preferred_job_types TEXT DEFAULT '[]',
                    schedule_blocks TEXT DEFAULT '[]',
                    resume_text TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
                INSERT INTO profiles (created_at, updated_at) VALUES ('2024-01-01', '2024-01-01');",
            )
            .unwrap();
        assert!(!db.has_column("profiles", "preferred_job_sources").unwrap());

        db.init().unwrap();
        assert!(db.has_column("profiles", "preferred_job_sources").unwrap());

        let profile = db.get_profile().unwrap().unwrap();
        assert!(profile.preferred_job_sources.is_empty());
    }

    #[test]
    fn test_open_on_disk_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("jobs.db");
        {
            let db = Database::open(&path).unwrap();
            db.init().unwrap();
        }
        assert!(path.exists());

        let reopened = Database::open(&path).unwrap();
        reopened.ensure_initialized().unwrap();
        assert_eq!(reopened.path(), &path);
    }

    #[test]
    fn test_user_job_application_walkthrough() {
        let db = test_db();
        db.insert_user(&crate::models::NewUser {
            username: "alice".into(),
            password_hash: "h".into(),
            email: None,
            created_at: "2024-01-01".into(),
        })
        .unwrap();

        let job_id = db.insert_job(&sample_job("indeed", "123")).unwrap();
        assert_eq!(job_id, 1);

        let app_id = db
            .insert_application(&crate::models::NewApplication {
                job_id: 1,
                ..Default::default()
            })
            .unwrap();
        let app = db.get_application(app_id).unwrap().unwrap();
        assert_eq!(app.status, "Saved");

        let err = db.insert_job(&sample_job("indeed", "123")).unwrap_err();
        assert_eq!(
            err.constraint(),
            Some(&crate::error::ConstraintViolation::DuplicateJobSource)
        );
        assert!(err.is_duplicate());
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let db = test_db();
        let enabled: i64 = db
            .conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
