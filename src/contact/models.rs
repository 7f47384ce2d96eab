//! Contact data models

use super::validation::ValidationError;
use crate::user::User;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Custom field id -> values. Single-valued fields hold at most one value.
pub type CustomFieldValues = BTreeMap<i64, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// 0 until the contact is first saved.
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub is_company: bool,
    pub project_id: i64,
    pub author_id: Option<i64>,
    pub created_on: i64,
    pub updated_on: i64,
}

impl Contact {
    pub fn new(project_id: i64, author_id: i64) -> Self {
        Self {
            id: 0,
            first_name: None,
            last_name: None,
            company: None,
            email: None,
            phone: None,
            website: None,
            birthday: None,
            is_company: false,
            project_id,
            author_id: Some(author_id),
            created_on: 0,
            updated_on: 0,
        }
    }

    pub fn is_new_record(&self) -> bool {
        self.id == 0
    }
}

impl std::fmt::Display for Contact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        )
    }
}

/// Entity a reference-typed attribute points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Project,
    User,
}

/// Journalized contact columns: every column except `id`, `created_on` and `updated_on`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactField {
    FirstName,
    LastName,
    Company,
    Email,
    Phone,
    Website,
    Birthday,
    IsCompany,
    ProjectId,
    AuthorId,
}

impl ContactField {
    pub const JOURNALIZED: [ContactField; 10] = [
        ContactField::FirstName,
        ContactField::LastName,
        ContactField::Company,
        ContactField::Email,
        ContactField::Phone,
        ContactField::Website,
        ContactField::Birthday,
        ContactField::IsCompany,
        ContactField::ProjectId,
        ContactField::AuthorId,
    ];

    pub fn column_name(&self) -> &'static str {
        match self {
            ContactField::FirstName => "first_name",
            ContactField::LastName => "last_name",
            ContactField::Company => "company",
            ContactField::Email => "email",
            ContactField::Phone => "phone",
            ContactField::Website => "website",
            ContactField::Birthday => "birthday",
            ContactField::IsCompany => "is_company",
            ContactField::ProjectId => "project_id",
            ContactField::AuthorId => "author_id",
        }
    }

    pub fn from_column(column: &str) -> Option<Self> {
        Self::JOURNALIZED
            .into_iter()
            .find(|field| field.column_name() == column)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContactField::FirstName => "First name",
            ContactField::LastName => "Last name",
            ContactField::Company => "Company",
            ContactField::Email => "Email",
            ContactField::Phone => "Phone",
            ContactField::Website => "Website",
            ContactField::Birthday => "Birthday",
            ContactField::IsCompany => "Is company",
            ContactField::ProjectId => "Project",
            ContactField::AuthorId => "Author",
        }
    }

    pub fn reference(&self) -> Option<ReferenceKind> {
        match self {
            ContactField::ProjectId => Some(ReferenceKind::Project),
            ContactField::AuthorId => Some(ReferenceKind::User),
            _ => None,
        }
    }

    /// Normalized raw value as recorded in journal details.
    pub fn value_of(&self, contact: &Contact) -> Option<String> {
        fn text(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        }
        match self {
            ContactField::FirstName => text(&contact.first_name),
            ContactField::LastName => text(&contact.last_name),
            ContactField::Company => text(&contact.company),
            ContactField::Email => text(&contact.email),
            ContactField::Phone => text(&contact.phone),
            ContactField::Website => text(&contact.website),
            ContactField::Birthday => contact.birthday.map(|d| d.format("%Y-%m-%d").to_string()),
            ContactField::IsCompany => Some(if contact.is_company { "1" } else { "0" }.to_string()),
            ContactField::ProjectId => Some(contact.project_id.to_string()),
            ContactField::AuthorId => contact.author_id.map(|id| id.to_string()),
        }
    }

    /// Parses `value` and writes it into `contact`.
    pub fn apply(&self, contact: &mut Contact, value: Option<&str>) -> Result<(), ValidationError> {
        let value = value.map(str::trim).filter(|s| !s.is_empty());
        let owned = value.map(str::to_string);
        match self {
            ContactField::FirstName => contact.first_name = owned,
            ContactField::LastName => contact.last_name = owned,
            ContactField::Company => contact.company = owned,
            ContactField::Email => contact.email = owned,
            ContactField::Phone => contact.phone = owned,
            ContactField::Website => contact.website = owned,
            ContactField::Birthday => {
                contact.birthday = value
                    .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
                    .transpose()
                    .map_err(|_| ValidationError::InvalidFormat {
                        field: self.label().to_string(),
                    })?;
            }
            ContactField::IsCompany => {
                contact.is_company = match value {
                    None | Some("0") | Some("false") => false,
                    Some("1") | Some("true") => true,
                    Some(_) => {
                        return Err(ValidationError::InvalidFormat {
                            field: self.label().to_string(),
                        })
                    }
                };
            }
            ContactField::ProjectId => {
                contact.project_id = value
                    .ok_or(ValidationError::Blank {
                        field: self.label().to_string(),
                    })?
                    .parse()
                    .map_err(|_| ValidationError::NotANumber {
                        field: self.label().to_string(),
                    })?;
            }
            ContactField::AuthorId => {
                contact.author_id = value
                    .map(str::parse)
                    .transpose()
                    .map_err(|_| ValidationError::NotANumber {
                        field: self.label().to_string(),
                    })?;
            }
        }
        Ok(())
    }

    /// Display form of a raw journal value.
    pub fn display_value(&self, raw: &str) -> String {
        match (self, raw) {
            (ContactField::IsCompany, "1") => "Yes".to_string(),
            (ContactField::IsCompany, "0") => "No".to_string(),
            _ => raw.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// 0 until saved.
    pub id: i64,
    pub street: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postcode: Option<String>,
    pub country_code: Option<String>,
    pub address_type: Option<String>,
}

impl Address {
    fn parts(&self) -> [&Option<String>; 5] {
        [
            &self.street,
            &self.city,
            &self.postcode,
            &self.region,
            &self.country_code,
        ]
    }

    pub fn is_blank(&self) -> bool {
        self.parts()
            .iter()
            .all(|part| part.as_deref().map_or(true, |s| s.trim().is_empty()))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .parts()
            .iter()
            .filter_map(|part| part.as_deref())
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&joined)
    }
}

/// A contact as it appears in the activity stream, dated by its last update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactEvent {
    pub contact: Contact,
    pub author: Option<User>,
    pub title: String,
    /// Name, company, email and first address, space separated.
    pub description: String,
}

impl ContactEvent {
    pub fn new(contact: Contact, author: Option<User>, first_address: Option<&Address>) -> Self {
        let title = contact.to_string().trim().to_string();
        let description = [
            Some(title.clone()),
            contact.company.clone(),
            contact.email.clone(),
            first_address.map(Address::to_string),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ");
        Self {
            contact,
            author,
            title,
            description,
        }
    }

    pub fn datetime(&self) -> i64 {
        self.contact.updated_on
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub contact_id: i64,
    pub filename: String,
    pub filesize: i64,
    pub content_type: Option<String>,
    pub author_id: Option<i64>,
    pub created_on: i64,
}

/// An attachment to be stored when the pending edit is saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttachment {
    pub filename: String,
    pub filesize: i64,
    pub content_type: Option<String>,
}
