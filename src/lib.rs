//! Contacts with a field-level change journal.
//!
//! Edits go through `manager::ContactManager`, which records one journal per
//! save with a detail per changed attribute, custom field value or attachment,
//! and reads history back filtered by what the viewer is allowed to see.

pub mod config;
pub mod contact;
pub mod error;
pub mod journal;
pub mod manager;
pub mod metrics;
pub mod sqlite_persistence;
pub mod store;
pub mod user;

pub use error::{ContactsError, ContactsResult};
pub use manager::{ContactManager, ContactManagerConfig};
pub use store::{FullContactStore, SqliteContactStore};
