//! Journal data models

use serde::{Deserialize, Serialize};

/// What a journal detail refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailProperty {
    /// A contact column, keyed by column name.
    Attribute,
    /// A custom field value, keyed by custom field id.
    CustomField,
    /// An attachment, keyed by attachment id.
    Attachment,
}

impl DetailProperty {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            DetailProperty::Attribute => "attr",
            DetailProperty::CustomField => "cf",
            DetailProperty::Attachment => "attachment",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "attr" => Some(DetailProperty::Attribute),
            "cf" => Some(DetailProperty::CustomField),
            "attachment" => Some(DetailProperty::Attachment),
            _ => None,
        }
    }
}

/// One field-level change inside a journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalDetail {
    pub id: i64,
    pub journal_id: i64,
    pub property: DetailProperty,
    pub prop_key: String,
    pub old_value: Option<String>,
    pub value: Option<String>,
}

impl JournalDetail {
    pub fn custom_field_id(&self) -> Option<i64> {
        match self.property {
            DetailProperty::CustomField => self.prop_key.parse().ok(),
            _ => None,
        }
    }
}

/// One committed change set of a contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    pub id: i64,
    pub contact_id: i64,
    pub user_id: i64,
    /// Author display name, resolved when the journal is read.
    pub user_name: String,
    pub notes: Option<String>,
    pub private_notes: bool,
    pub created_on: i64,
    pub details: Vec<JournalDetail>,
    /// 1-based position within all journals of the contact, assigned before
    /// visibility filtering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indice: Option<usize>,
}

impl Journal {
    pub fn has_notes(&self) -> bool {
        self.notes
            .as_deref()
            .map_or(false, |n| !n.trim().is_empty())
    }
}
