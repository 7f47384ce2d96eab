use super::models::Journal;
use super::visibility::ViewerContext;
use crate::user::User;
use anyhow::Result;
use std::collections::HashMap;

pub trait JournalStore: Send + Sync {
    /// Highest journal id of the contact, Ok(None) if it was never journaled.
    fn last_journal_id(&self, contact_id: i64) -> Result<Option<i64>>;

    /// Journals of the contact with id greater than `watermark`, ascending.
    /// A `None` watermark returns every journal.
    fn journals_after(&self, contact_id: i64, watermark: Option<i64>) -> Result<Vec<Journal>>;

    /// Every journal of the contact with its details, ordered by
    /// `(created_on, id)`.
    fn get_journals(&self, contact_id: i64) -> Result<Vec<Journal>>;

    fn get_journal(&self, journal_id: i64) -> Result<Option<Journal>>;

    /// Journals of several contacts at once, ordered by `(created_on, id)`.
    fn get_journals_for_contacts(&self, contact_ids: &[i64]) -> Result<Vec<Journal>>;

    /// Resolves what `viewer` may see of the journals of a project.
    fn viewer_context(&self, viewer: &User, project_id: i64) -> Result<ViewerContext>;

    /// Author of the most recent journal each contact has that `viewer` can
    /// see. Every requested id is present in the result, mapped to None when
    /// no such journal exists. Runs a fixed number of statements regardless
    /// of how many ids are given.
    fn last_updated_by(
        &self,
        contact_ids: &[i64],
        viewer: &User,
    ) -> Result<HashMap<i64, Option<User>>>;
}
