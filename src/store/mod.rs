//! SQLite persistence for contacts, their journals and the users, projects
//! and roles they are checked against.

mod contact_query_sql;
mod schema;
mod sqlite_contact_store;
mod sqlite_journal_store;
mod sqlite_user_store;

use crate::contact::{ContactQueryStore, ContactStore, CustomFieldStore};
use crate::journal::{JournalStore, ReferenceLookup};
use crate::sqlite_persistence::{open_in_memory, open_versioned};
use crate::user::{ProjectStore, UserSettingsStore, UserStore};
use anyhow::Result;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

pub use schema::VERSIONED_SCHEMAS;

const DB_FILE_NAME: &str = "contacts.db";

/// Every store trait the manager needs, in one object.
pub trait FullContactStore:
    ContactStore
    + CustomFieldStore
    + ContactQueryStore
    + JournalStore
    + ReferenceLookup
    + UserStore
    + ProjectStore
    + UserSettingsStore
{
    fn as_reference_lookup(&self) -> &dyn ReferenceLookup;
}

impl<T> FullContactStore for T where
    T: ContactStore
        + CustomFieldStore
        + ContactQueryStore
        + JournalStore
        + ReferenceLookup
        + UserStore
        + ProjectStore
        + UserSettingsStore
{
    fn as_reference_lookup(&self) -> &dyn ReferenceLookup {
        self
    }
}

pub struct SqliteContactStore {
    conn: Arc<Mutex<Connection>>,
    fetches: AtomicU64,
}

impl SqliteContactStore {
    /// Opens the database at `db_path`, creating it with the latest schema
    /// when missing and migrating it otherwise.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned(db_path.as_ref(), VERSIONED_SCHEMAS)?;
        info!("Opened contacts database at {:?}", db_path.as_ref());
        Ok(Self::with_connection(conn))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::with_connection(open_in_memory(VERSIONED_SCHEMAS)?))
    }

    fn with_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            fetches: AtomicU64::new(0),
        }
    }

    /// Number of read statements run against journals so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    fn count_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    /// Looks for `contacts.db` in the current directory and its parents.
    pub fn infer_path() -> Option<PathBuf> {
        let mut current_dir = std::env::current_dir().ok()?;
        loop {
            let candidate = current_dir.join(DB_FILE_NAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            current_dir = current_dir.parent()?.to_path_buf();
        }
    }
}

pub fn now_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

fn bool_to_int(value: bool) -> i32 {
    if value {
        1
    } else {
        0
    }
}

/// `?, ?, ?` for `n` bound parameters.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
