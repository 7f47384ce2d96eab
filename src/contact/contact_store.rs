use super::custom_field::{CustomField, NewCustomField};
use super::models::{Address, Attachment, Contact, ContactEvent, CustomFieldValues};
use super::query::ContactQuery;
use crate::error::ContactsResult;
use crate::journal::PendingEdit;
use crate::user::User;
use anyhow::Result;

/// Outcome of persisting a `PendingEdit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedEdit {
    pub contact_id: i64,
    /// Ok(None) when the pending journal was empty or cleared.
    pub journal_id: Option<i64>,
}

pub trait ContactStore: Send + Sync {
    /// Returns Ok(None) if the contact does not exist.
    fn get_contact(&self, contact_id: i64) -> Result<Option<Contact>>;

    fn get_addresses(&self, contact_id: i64) -> Result<Vec<Address>>;

    fn get_custom_values(&self, contact_id: i64) -> Result<CustomFieldValues>;

    fn get_attachments(&self, contact_id: i64) -> Result<Vec<Attachment>>;

    /// Persists the contact, its custom values, attachments, addresses and
    /// the pending journal in a single transaction. Nothing is written when
    /// any step fails.
    fn save_edit(&self, edit: &PendingEdit, now: i64) -> Result<SavedEdit>;

    /// Deletes the contact with everything it owns. Returns false if it did
    /// not exist.
    fn delete_contact(&self, contact_id: i64) -> Result<bool>;

    /// Contacts updated within `from..=to` (unix seconds) on projects where
    /// `viewer` may view contacts, most recently updated first.
    fn contact_events(&self, viewer: &User, from: i64, to: i64) -> Result<Vec<ContactEvent>>;
}

pub trait CustomFieldStore: Send + Sync {
    /// Creates the field at the last position and returns its id.
    fn create_custom_field(&self, field: &NewCustomField) -> Result<i64>;

    /// All fields ordered by position.
    fn get_custom_fields(&self) -> Result<Vec<CustomField>>;

    /// Fields `viewer` may see on the project, or on any of their projects
    /// when `project_id` is None.
    fn visible_custom_fields(&self, viewer: &User, project_id: Option<i64>)
        -> Result<Vec<CustomField>>;
}

/// Runs contact list queries. Execution failures surface as
/// `ContactsError::StatementInvalid`.
pub trait ContactQueryStore: Send + Sync {
    fn count_contacts(&self, query: &ContactQuery, viewer: &User) -> ContactsResult<usize>;

    fn query_contacts(
        &self,
        query: &ContactQuery,
        viewer: &User,
        limit: usize,
        offset: usize,
    ) -> ContactsResult<Vec<Contact>>;

    fn query_contact_ids(&self, query: &ContactQuery, viewer: &User) -> ContactsResult<Vec<i64>>;
}
