//! In-memory change tracking for one contact edit.
//!
//! A `PendingEdit` is returned when tracking begins and is threaded to the
//! save call. Every mutator diffs the new value against the snapshot taken
//! at the start of the edit and keeps at most one detail per key in the
//! pending journal.

use super::models::DetailProperty;
use crate::contact::{
    Address, Contact, ContactField, CustomField, CustomFieldValues, NewAttachment,
    ValidationError,
};
use crate::user::User;

/// A detail not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailDraft {
    pub property: DetailProperty,
    pub prop_key: String,
    pub old_value: Option<String>,
    pub value: Option<String>,
}

/// The journal of an edit in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalDraft {
    pub user_id: i64,
    pub notes: Option<String>,
    pub private_notes: bool,
    details: Vec<DetailDraft>,
}

impl JournalDraft {
    fn new(user_id: i64, notes: Option<&str>) -> Self {
        Self {
            user_id,
            notes: normalize_notes(notes),
            private_notes: false,
            details: vec![],
        }
    }

    pub fn details(&self) -> &[DetailDraft] {
        &self.details
    }

    /// A draft without notes and details is never committed.
    pub fn is_empty(&self) -> bool {
        self.notes.is_none() && self.details.is_empty()
    }

    /// Replaces the detail for `(property, key)` in place, or drops it when
    /// the value is back to the original.
    fn upsert(
        &mut self,
        property: DetailProperty,
        key: &str,
        old_value: Option<String>,
        value: Option<String>,
    ) {
        let position = self
            .details
            .iter()
            .position(|d| d.property == property && d.prop_key == key);
        if old_value == value {
            if let Some(i) = position {
                self.details.remove(i);
            }
            return;
        }
        let detail = DetailDraft {
            property,
            prop_key: key.to_string(),
            old_value,
            value,
        };
        match position {
            Some(i) => self.details[i] = detail,
            None => self.details.push(detail),
        }
    }
}

fn normalize_notes(notes: Option<&str>) -> Option<String> {
    notes
        .filter(|n| !n.trim().is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone)]
struct Snapshot {
    contact: Contact,
    custom_values: CustomFieldValues,
}

/// An edit of a contact, either a creation or an update of a saved one.
#[derive(Debug, Clone)]
pub struct PendingEdit {
    user: User,
    original: Option<Snapshot>,
    contact: Contact,
    custom_values: CustomFieldValues,
    new_attachments: Vec<NewAttachment>,
    deleted_attachment_ids: Vec<i64>,
    new_addresses: Vec<Address>,
    removed_address_ids: Vec<i64>,
    journal: Option<JournalDraft>,
}

impl PendingEdit {
    /// Starts tracking changes to a saved contact.
    pub fn begin(
        contact: Contact,
        custom_values: CustomFieldValues,
        user: &User,
        notes: Option<&str>,
    ) -> Self {
        Self {
            user: user.clone(),
            original: Some(Snapshot {
                contact: contact.clone(),
                custom_values: custom_values.clone(),
            }),
            contact,
            custom_values,
            new_attachments: vec![],
            deleted_attachment_ids: vec![],
            new_addresses: vec![],
            removed_address_ids: vec![],
            journal: Some(JournalDraft::new(user.id, notes)),
        }
    }

    /// Starts a creation. Field changes are not journaled; only the note is.
    pub fn begin_create(contact: Contact, user: &User, notes: Option<&str>) -> Self {
        Self {
            user: user.clone(),
            original: None,
            contact,
            custom_values: CustomFieldValues::new(),
            new_attachments: vec![],
            deleted_attachment_ids: vec![],
            new_addresses: vec![],
            removed_address_ids: vec![],
            journal: Some(JournalDraft::new(user.id, notes)),
        }
    }

    pub fn is_new(&self) -> bool {
        self.original.is_none()
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    pub fn original_contact(&self) -> Option<&Contact> {
        self.original.as_ref().map(|s| &s.contact)
    }

    pub fn custom_values(&self) -> &CustomFieldValues {
        &self.custom_values
    }

    pub fn journal(&self) -> Option<&JournalDraft> {
        self.journal.as_ref()
    }

    pub fn new_attachments(&self) -> &[NewAttachment] {
        &self.new_attachments
    }

    pub fn deleted_attachment_ids(&self) -> &[i64] {
        &self.deleted_attachment_ids
    }

    pub fn new_addresses(&self) -> &[Address] {
        &self.new_addresses
    }

    pub fn removed_address_ids(&self) -> &[i64] {
        &self.removed_address_ids
    }

    /// Whether any contact column differs from the snapshot.
    pub fn attributes_changed(&self) -> bool {
        match &self.original {
            None => true,
            Some(original) => ContactField::JOURNALIZED
                .iter()
                .any(|f| f.value_of(&original.contact) != f.value_of(&self.contact)),
        }
    }

    pub fn custom_values_changed(&self) -> bool {
        match &self.original {
            None => !self.custom_values.is_empty(),
            Some(original) => original.custom_values != self.custom_values,
        }
    }

    pub fn set_attribute(
        &mut self,
        field: ContactField,
        value: Option<&str>,
    ) -> Result<(), ValidationError> {
        field.apply(&mut self.contact, value)?;
        self.track_attribute(field);
        Ok(())
    }

    pub fn set_custom_field_value(&mut self, field: &CustomField, value: Option<&str>) {
        let values: Vec<&str> = value.into_iter().collect();
        self.set_custom_field_values(field, &values);
    }

    /// Replaces every value of `field`. Single-valued fields keep the first.
    pub fn set_custom_field_values(&mut self, field: &CustomField, values: &[&str]) {
        let mut normalized: Vec<String> = Vec::new();
        for value in values.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
            if !normalized.iter().any(|n| n == value) {
                normalized.push(value.to_string());
            }
        }
        if !field.multiple {
            normalized.truncate(1);
        }
        if normalized.is_empty() {
            self.custom_values.remove(&field.id);
        } else {
            self.custom_values.insert(field.id, normalized);
        }
        self.track_custom_field(field);
    }

    pub fn attach(&mut self, attachment: NewAttachment) {
        self.new_attachments.push(attachment);
    }

    pub fn delete_attachments(&mut self, attachment_ids: &[i64]) {
        for id in attachment_ids {
            if !self.deleted_attachment_ids.contains(id) {
                self.deleted_attachment_ids.push(*id);
            }
        }
    }

    /// Addresses with every part blank are dropped.
    pub fn add_address(&mut self, address: Address) {
        if !address.is_blank() {
            self.new_addresses.push(address);
        }
    }

    pub fn remove_address(&mut self, address_id: i64) {
        self.removed_address_ids.push(address_id);
    }

    pub fn set_notes(&mut self, notes: Option<&str>) {
        if let Some(journal) = self.journal.as_mut() {
            journal.notes = normalize_notes(notes);
        }
    }

    pub fn set_private_notes(&mut self, private_notes: bool) {
        if let Some(journal) = self.journal.as_mut() {
            journal.private_notes = private_notes;
        }
    }

    /// Drops the pending journal; the edit still saves but records no history.
    pub fn clear_journal(&mut self) {
        self.journal = None;
    }

    fn track_attribute(&mut self, field: ContactField) {
        let (Some(original), Some(journal)) = (&self.original, self.journal.as_mut()) else {
            return;
        };
        journal.upsert(
            DetailProperty::Attribute,
            field.column_name(),
            field.value_of(&original.contact),
            field.value_of(&self.contact),
        );
    }

    fn track_custom_field(&mut self, field: &CustomField) {
        let (Some(original), Some(journal)) = (&self.original, self.journal.as_mut()) else {
            return;
        };
        let empty = Vec::new();
        let old_values = original.custom_values.get(&field.id).unwrap_or(&empty);
        let new_values = self.custom_values.get(&field.id).unwrap_or(&empty);
        let key = field.id.to_string();

        if !field.multiple {
            journal.upsert(
                DetailProperty::CustomField,
                &key,
                old_values.first().cloned(),
                new_values.first().cloned(),
            );
            return;
        }

        journal
            .details
            .retain(|d| !(d.property == DetailProperty::CustomField && d.prop_key == key));
        for added in new_values.iter().filter(|v| !old_values.contains(v)) {
            journal.details.push(DetailDraft {
                property: DetailProperty::CustomField,
                prop_key: key.clone(),
                old_value: None,
                value: Some(added.clone()),
            });
        }
        for removed in old_values.iter().filter(|v| !new_values.contains(v)) {
            journal.details.push(DetailDraft {
                property: DetailProperty::CustomField,
                prop_key: key.clone(),
                old_value: Some(removed.clone()),
                value: None,
            });
        }
    }
}
