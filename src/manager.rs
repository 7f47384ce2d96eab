//! `ContactManager`: permission checks, validation and journaling around the
//! contact store.

use crate::contact::{
    validate_contact, validate_custom_values, Address, Attachment, Contact, ContactEvent,
    ContactField, ContactQuery, CustomField, CustomFieldValues, NewCustomField, QueryColumn,
    SavedEdit, ValidationError, ValidationErrors,
};
use crate::error::{ContactsError, ContactsResult};
use crate::journal::{
    filter_visible, Journal, JournalFormatter, LineStyle, PendingEdit, RenderOptions,
    ViewerContext,
};
use crate::metrics;
use crate::store::{now_seconds, FullContactStore};
use crate::user::{Permission, User, UserSetting};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Page size that returns every row; still positive once bound as an i64 LIMIT.
const ALL_ROWS: usize = i64::MAX as usize;

#[derive(Debug, Clone)]
pub struct ContactManagerConfig {
    /// History order for users who never chose one.
    pub reverse_order_default: bool,
    pub render: RenderOptions,
}

impl Default for ContactManagerConfig {
    fn default() -> Self {
        Self {
            reverse_order_default: false,
            render: RenderOptions::default(),
        }
    }
}

/// A contact as shown to one user.
#[derive(Debug, Clone, Serialize)]
pub struct ContactDetails {
    pub contact: Contact,
    pub addresses: Vec<Address>,
    pub custom_fields: Vec<CustomField>,
    /// Values of `custom_fields` only.
    pub custom_values: CustomFieldValues,
    pub attachments: Vec<Attachment>,
    /// Visible history, newest first when the user prefers it.
    pub journals: Vec<Journal>,
    pub editable: bool,
    pub deletable: bool,
}

/// One row of a contact list.
#[derive(Debug, Clone, Serialize)]
pub struct ContactRow {
    pub contact: Contact,
    /// Resolved only when the query selects the `last_updated_by` column.
    pub last_updated_by: Option<User>,
}

pub struct ContactManager {
    store: Arc<dyn FullContactStore>,
    config: ContactManagerConfig,
}

impl ContactManager {
    pub fn new(store: Arc<dyn FullContactStore>, config: ContactManagerConfig) -> Self {
        metrics::init_metrics();
        Self { store, config }
    }

    pub fn store(&self) -> &dyn FullContactStore {
        self.store.as_ref()
    }

    // =========================================================================
    // Permissions
    // =========================================================================

    fn authorize(&self, user: &User, permission: Permission, project_id: i64) -> ContactsResult<()> {
        if self.store.is_allowed_to(user, permission, project_id)? {
            Ok(())
        } else {
            Err(ContactsError::PermissionDenied {
                permission,
                project_id,
            })
        }
    }

    fn load_contact(&self, contact_id: i64) -> ContactsResult<Contact> {
        self.store
            .get_contact(contact_id)?
            .ok_or(ContactsError::NotFound {
                entity: "Contact",
                id: contact_id,
            })
    }

    /// The contact, when `user` may view it.
    pub fn find_contact(&self, contact_id: i64, user: &User) -> ContactsResult<Contact> {
        let contact = self.load_contact(contact_id)?;
        self.authorize(user, Permission::ViewContacts, contact.project_id)?;
        Ok(contact)
    }

    pub fn is_editable(&self, contact: &Contact, user: &User) -> ContactsResult<bool> {
        Ok(self
            .store
            .is_allowed_to(user, Permission::ManageContacts, contact.project_id)?)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Begins a creation edit in `project_id`. Nothing is stored until `save`.
    pub fn create_contact(
        &self,
        project_id: i64,
        user: &User,
        attributes: &[(ContactField, Option<&str>)],
        notes: Option<&str>,
    ) -> ContactsResult<PendingEdit> {
        if self.store.get_project(project_id)?.is_none() {
            return Err(ContactsError::NotFound {
                entity: "Project",
                id: project_id,
            });
        }
        self.authorize(user, Permission::ManageContacts, project_id)?;

        let mut edit = PendingEdit::begin_create(Contact::new(project_id, user.id), user, notes);
        let errors: Vec<ValidationError> = attributes
            .iter()
            .filter_map(|(field, value)| edit.set_attribute(*field, *value).err())
            .collect();
        ValidationErrors(errors).into_result()?;
        Ok(edit)
    }

    /// Begins tracking changes to a saved contact on behalf of `user`.
    pub fn begin_change(
        &self,
        contact_id: i64,
        user: &User,
        notes: Option<&str>,
    ) -> ContactsResult<PendingEdit> {
        let contact = self.load_contact(contact_id)?;
        self.authorize(user, Permission::ManageContacts, contact.project_id)?;
        let custom_values = self.store.get_custom_values(contact_id)?;
        Ok(PendingEdit::begin(contact, custom_values, user, notes))
    }

    fn validate_edit(&self, edit: &PendingEdit) -> ContactsResult<()> {
        let mut errors = match validate_contact(edit.contact()) {
            Ok(()) => vec![],
            Err(ValidationErrors(errors)) => errors,
        };
        let fields = self.store.get_custom_fields()?;
        if let Err(ValidationErrors(more)) = validate_custom_values(edit.custom_values(), &fields) {
            errors.extend(more);
        }
        Ok(ValidationErrors(errors).into_result()?)
    }

    /// Validates and stores the edit and its journal in one transaction.
    /// The edit is left untouched, so a rejected one can be corrected and
    /// saved again.
    pub fn save(&self, edit: &PendingEdit) -> ContactsResult<SavedEdit> {
        let user = edit.user().clone();
        let project_id = edit.contact().project_id;
        self.authorize(&user, Permission::ManageContacts, project_id)?;
        if let Some(original) = edit.original_contact() {
            if original.project_id != project_id {
                self.authorize(&user, Permission::ManageContacts, original.project_id)?;
            }
        }
        if edit.journal().map_or(false, |j| j.private_notes) {
            self.authorize(&user, Permission::SetNotesPrivate, project_id)?;
        }
        self.validate_edit(edit)?;

        let saved = match self.store.save_edit(edit, now_seconds()) {
            Ok(saved) => saved,
            Err(e) => {
                if edit.journal().is_some() {
                    metrics::record_journal_discarded("rolled_back");
                }
                warn!("Failed to save contact {:?}: {}", edit.contact().id, e);
                return Err(e.into());
            }
        };

        match saved.journal_id {
            Some(journal_id) => {
                metrics::record_journal_committed();
                info!(
                    "Recorded journal {} for contact {} by user {}",
                    journal_id, saved.contact_id, user.id
                );
            }
            None if edit.journal().is_some() => {
                metrics::record_journal_discarded("empty");
                debug!("Nothing to journal for contact {}", saved.contact_id);
            }
            None => {}
        }
        Ok(saved)
    }

    /// Deletes the contact with its history, custom values, attachments and
    /// addresses.
    pub fn destroy_contact(&self, contact_id: i64, user: &User) -> ContactsResult<()> {
        let contact = self.load_contact(contact_id)?;
        self.authorize(user, Permission::ManageContacts, contact.project_id)?;
        self.store.delete_contact(contact_id)?;
        info!("Deleted contact {} ({})", contact_id, contact);
        Ok(())
    }

    pub fn create_custom_field(&self, field: &NewCustomField) -> ContactsResult<i64> {
        field.validate()?;
        Ok(self.store.create_custom_field(field)?)
    }

    // =========================================================================
    // History
    // =========================================================================

    fn prefers_newest_first(&self, user: &User) -> ContactsResult<bool> {
        Ok(
            match self
                .store
                .get_user_setting(user.id, "comments_in_reverse_order")?
            {
                Some(UserSetting::CommentsInReverseOrder(reverse)) => reverse,
                _ => self.config.reverse_order_default,
            },
        )
    }

    pub fn show_contact(&self, contact_id: i64, user: &User) -> ContactsResult<ContactDetails> {
        let contact = self.find_contact(contact_id, user)?;
        let custom_fields = self
            .store
            .visible_custom_fields(user, Some(contact.project_id))?;
        let custom_values = self
            .store
            .get_custom_values(contact_id)?
            .into_iter()
            .filter(|(id, _)| custom_fields.iter().any(|f| f.id == *id))
            .collect();

        let mut journals = self.visible_journals(contact_id, user)?;
        if self.prefers_newest_first(user)? {
            journals.reverse();
        }
        let editable = self.is_editable(&contact, user)?;

        Ok(ContactDetails {
            addresses: self.store.get_addresses(contact_id)?,
            attachments: self.store.get_attachments(contact_id)?,
            custom_fields,
            custom_values,
            journals,
            editable,
            deletable: editable,
            contact,
        })
    }

    pub fn last_journal_id(&self, contact_id: i64) -> ContactsResult<Option<i64>> {
        Ok(self.store.last_journal_id(contact_id)?)
    }

    /// Journals recorded after `watermark`, every journal when it is None.
    pub fn journals_after(
        &self,
        contact_id: i64,
        watermark: Option<i64>,
    ) -> ContactsResult<Vec<Journal>> {
        Ok(self.store.journals_after(contact_id, watermark)?)
    }

    /// The contact's history as `user` may see it, oldest first and numbered.
    pub fn visible_journals(&self, contact_id: i64, user: &User) -> ContactsResult<Vec<Journal>> {
        let contact = self.find_contact(contact_id, user)?;
        let viewer = self.store.viewer_context(user, contact.project_id)?;
        let journals = self.store.get_journals(contact_id)?;
        Ok(filter_visible(journals, &viewer))
    }

    /// Author of the latest journal `user` can see, for each contact, in a
    /// fixed number of statements.
    pub fn resolve_last_updated_by(
        &self,
        contact_ids: &[i64],
        user: &User,
    ) -> ContactsResult<HashMap<i64, Option<User>>> {
        Ok(self.store.last_updated_by(contact_ids, user)?)
    }

    /// A formatter for the contact's journals, limited to the custom fields
    /// `user` can see.
    pub fn formatter(&self, contact_id: i64, user: &User) -> ContactsResult<JournalFormatter<'_>> {
        let contact = self.find_contact(contact_id, user)?;
        let custom_fields = self
            .store
            .visible_custom_fields(user, Some(contact.project_id))?;
        let attachments = self.store.get_attachments(contact_id)?;
        Ok(JournalFormatter::new(
            self.store.as_reference_lookup(),
            &custom_fields,
            &attachments,
            self.config.render.clone(),
        ))
    }

    /// Visible journals with their rendered detail lines, in the user's
    /// preferred order.
    pub fn format_history(
        &self,
        contact_id: i64,
        user: &User,
        style: LineStyle,
    ) -> ContactsResult<Vec<(Journal, Vec<String>)>> {
        let mut journals = self.visible_journals(contact_id, user)?;
        if self.prefers_newest_first(user)? {
            journals.reverse();
        }
        let mut formatter = self.formatter(contact_id, user)?;
        journals
            .into_iter()
            .map(|journal| {
                let lines = formatter.format_journal(&journal, style)?;
                Ok((journal, lines))
            })
            .collect()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    fn query_failed(&self, error: ContactsError) -> ContactsError {
        if matches!(
            error,
            ContactsError::StatementInvalid(_) | ContactsError::InvalidQuery(_)
        ) {
            metrics::record_query_failure();
            warn!("Contact query failed: {}", error);
        }
        error
    }

    pub fn contact_count(&self, query: &ContactQuery, user: &User) -> ContactsResult<usize> {
        self.store
            .count_contacts(query, user)
            .map_err(|e| self.query_failed(e))
    }

    pub fn contacts(
        &self,
        query: &ContactQuery,
        user: &User,
        limit: usize,
        offset: usize,
    ) -> ContactsResult<Vec<ContactRow>> {
        let contacts = self
            .store
            .query_contacts(query, user, limit, offset)
            .map_err(|e| self.query_failed(e))?;

        let mut authors = if query.has_column(QueryColumn::LastUpdatedBy) {
            let ids: Vec<i64> = contacts.iter().map(|c| c.id).collect();
            self.resolve_last_updated_by(&ids, user)?
        } else {
            HashMap::new()
        };
        Ok(contacts
            .into_iter()
            .map(|contact| ContactRow {
                last_updated_by: authors.remove(&contact.id).flatten(),
                contact,
            })
            .collect())
    }

    pub fn contact_ids(&self, query: &ContactQuery, user: &User) -> ContactsResult<Vec<i64>> {
        self.store
            .query_contact_ids(query, user)
            .map_err(|e| self.query_failed(e))
    }

    /// Visible journals of every contact matching the query, newest first.
    pub fn journals(&self, query: &ContactQuery, user: &User) -> ContactsResult<Vec<Journal>> {
        let contacts = self
            .store
            .query_contacts(query, user, ALL_ROWS, 0)
            .map_err(|e| self.query_failed(e))?;
        let ids: Vec<i64> = contacts.iter().map(|c| c.id).collect();
        let project_of: HashMap<i64, i64> = contacts.iter().map(|c| (c.id, c.project_id)).collect();

        let mut by_contact: HashMap<i64, Vec<Journal>> = HashMap::new();
        for journal in self.store.get_journals_for_contacts(&ids)? {
            by_contact.entry(journal.contact_id).or_default().push(journal);
        }

        let mut viewers: HashMap<i64, ViewerContext> = HashMap::new();
        let mut result = Vec::new();
        for (contact_id, journals) in by_contact {
            let Some(project_id) = project_of.get(&contact_id).copied() else {
                continue;
            };
            if !viewers.contains_key(&project_id) {
                let viewer = self.store.viewer_context(user, project_id)?;
                viewers.insert(project_id, viewer);
            }
            result.extend(filter_visible(journals, &viewers[&project_id]));
        }
        result.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(result)
    }

    // =========================================================================
    // Activity
    // =========================================================================

    /// Contacts updated between `from` and `to` (unix seconds, both
    /// inclusive) that `user` may view, most recent first. Each event is
    /// attributed to the contact's author.
    pub fn activity(&self, user: &User, from: i64, to: i64) -> ContactsResult<Vec<ContactEvent>> {
        if from > to {
            return Ok(vec![]);
        }
        Ok(self.store.contact_events(user, from, to)?)
    }
}
