//! SQLite persistence for users, learned patterns, chat history and
//! knowledge documents.
//!
//! [`Store`] holds only the database path; every operation opens its own
//! connection with the pragmas from [`open_conn`]. The methods are blocking
//! and are meant to be called from `tokio::task::spawn_blocking`.
//!
//! ## Submodules
//! - **patterns**: teach/lookup/delete/statistics over the `patterns` table.
//! - **users**: plain user identities (no credentials).
//! - **history**: per-user chat transcript.
//! - **knowledge**: knowledge base documents.

mod history;
mod knowledge;
mod patterns;
mod users;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::AppError;

pub use history::ChatRecord;
pub use knowledge::{KnowledgeDoc, KnowledgePatch};
pub use patterns::{DeleteOutcome, NewPattern, Pattern, PatternStats};
pub use users::User;

// ── Schema ────────────────────────────────────────────────────────────────────

/// Schema version stored in `PRAGMA user_version`.
pub(crate) const SCHEMA_VERSION: i64 = 1;

fn init_schema(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT UNIQUE NOT NULL,
            name TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS patterns (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner TEXT NOT NULL DEFAULT '',
            trigger TEXT NOT NULL,
            response TEXT NOT NULL,
            taught_by TEXT NOT NULL,
            is_public INTEGER NOT NULL DEFAULT 0,
            taught_at TEXT NOT NULL,
            use_count INTEGER NOT NULL DEFAULT 0,
            UNIQUE(owner, trigger)
        );

        CREATE TABLE IF NOT EXISTS chat_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL DEFAULT '',
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            timestamp TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_chat_user ON chat_history(user_id);
        CREATE INDEX IF NOT EXISTS idx_chat_timestamp ON chat_history(timestamp);

        CREATE TABLE IF NOT EXISTS knowledge_docs (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',
            category TEXT NOT NULL DEFAULT 'general',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        PRAGMA user_version = 1;
        ",
    )
    .map_err(db_err("initialize schema"))
}

// ── Connection helper ─────────────────────────────────────────────────────────

/// Open a SQLite connection to `db_path` and apply pragmas:
/// `journal_mode = WAL`, `foreign_keys = ON`, `busy_timeout = 5000`.
pub(crate) fn open_conn(db_path: &Path) -> Result<Connection, AppError> {
    let conn = Connection::open(db_path)
        .map_err(|e| AppError::Store(format!("store: open {}: {e}", db_path.display())))?;

    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(db_err("set journal_mode WAL"))?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(db_err("set foreign_keys ON"))?;
    conn.pragma_update(None, "busy_timeout", 5000)
        .map_err(db_err("set busy_timeout"))?;

    Ok(conn)
}

/// Wrap a rusqlite error with the operation that produced it.
pub(crate) fn db_err(what: &'static str) -> impl Fn(rusqlite::Error) -> AppError {
    move |e| AppError::Store(format!("store: {what}: {e}"))
}

/// Like [`db_err`], but a UNIQUE or primary key violation becomes
/// `AppError::Invalid(conflict)`.
pub(crate) fn unique_err(what: &'static str, conflict: String) -> impl FnOnce(rusqlite::Error) -> AppError {
    move |e| match e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation => {
            AppError::Invalid(conflict)
        }
        other => db_err(what)(other),
    }
}

/// Current UTC time as RFC 3339 with second precision.
pub(crate) fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ── Store ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Store {
    db_path: PathBuf,
}

impl Store {
    /// Open (or create) the database at `db_path`, creating the parent
    /// directory and schema as needed.
    pub fn open(db_path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Store(format!("store: cannot create {}: {e}", parent.display()))
            })?;
        }
        let store = Self {
            db_path: db_path.to_path_buf(),
        };
        store.init_db()?;
        info!(path = %db_path.display(), "store opened");
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Fill empty tables with the default shared patterns and knowledge
    /// documents. Tables that already hold rows are left alone.
    pub fn seed_defaults(&self) -> Result<(), AppError> {
        let conn = self.conn()?;

        let patterns: i64 = conn
            .query_row("SELECT COUNT(*) FROM patterns", [], |row| row.get(0))
            .map_err(db_err("count patterns"))?;
        if patterns == 0 {
            for (trigger, response) in patterns::DEFAULT_PATTERNS {
                self.upsert_pattern(NewPattern {
                    owner: String::new(),
                    trigger: (*trigger).to_string(),
                    response: (*response).to_string(),
                    taught_by: "system".to_string(),
                    is_public: true,
                })?;
            }
            info!(count = patterns::DEFAULT_PATTERNS.len(), "seeded default patterns");
        }

        let docs: i64 = conn
            .query_row("SELECT COUNT(*) FROM knowledge_docs", [], |row| row.get(0))
            .map_err(db_err("count knowledge_docs"))?;
        if docs == 0 {
            let defaults = knowledge::default_documents();
            let count = defaults.len();
            for doc in defaults {
                self.insert_document(doc)?;
            }
            info!(count, "seeded default knowledge documents");
        }
        Ok(())
    }

    fn init_db(&self) -> Result<(), AppError> {
        let conn = self.conn()?;
        let version: i64 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .map_err(db_err("read schema version"))?;

        if version == 0 {
            debug!("creating schema v{SCHEMA_VERSION}");
            return init_schema(&conn);
        }

        if version != SCHEMA_VERSION {
            return Err(AppError::Store(format!(
                "store: unsupported schema version {version}, expected {SCHEMA_VERSION}"
            )));
        }
        Ok(())
    }

    pub(crate) fn conn(&self) -> Result<Connection, AppError> {
        open_conn(&self.db_path)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Store;
    use tempfile::TempDir;

    pub fn make_store() -> (TempDir, Store) {
        let temp = TempDir::new().expect("tempdir");
        let store = Store::open(&temp.path().join("learnbot.db")).expect("open store");
        (temp, store)
    }
}
