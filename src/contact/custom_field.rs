//! Contact custom fields.
//!
//! The field format decides how values are validated, displayed, and how a
//! change to the field renders in the history.

use super::validation::{ValidationError, ValidationErrors};
use crate::user::User;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldFormat {
    String,
    Text,
    Int,
    Float,
    Date,
    Bool,
    List,
    Link,
    Attachment,
}

/// How a change to a custom field is shown in a journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeRendering {
    /// Old and new values inline.
    Plain,
    /// A generic "updated" sentence without values.
    NoDetail,
    /// A generic "updated" sentence linking to a value diff.
    DiffOnly,
}

/// Formats whose changes do not render as plain values.
const CHANGE_RENDERINGS: &[(FieldFormat, ChangeRendering)] = &[
    (FieldFormat::Text, ChangeRendering::DiffOnly),
    (FieldFormat::Attachment, ChangeRendering::NoDetail),
];

impl FieldFormat {
    pub const ALL: [FieldFormat; 9] = [
        FieldFormat::String,
        FieldFormat::Text,
        FieldFormat::Int,
        FieldFormat::Float,
        FieldFormat::Date,
        FieldFormat::Bool,
        FieldFormat::List,
        FieldFormat::Link,
        FieldFormat::Attachment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldFormat::String => "string",
            FieldFormat::Text => "text",
            FieldFormat::Int => "int",
            FieldFormat::Float => "float",
            FieldFormat::Date => "date",
            FieldFormat::Bool => "bool",
            FieldFormat::List => "list",
            FieldFormat::Link => "link",
            FieldFormat::Attachment => "attachment",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }

    pub fn change_rendering(&self) -> ChangeRendering {
        CHANGE_RENDERINGS
            .iter()
            .find(|(format, _)| format == self)
            .map(|(_, rendering)| *rendering)
            .unwrap_or(ChangeRendering::Plain)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    pub id: i64,
    pub name: String,
    pub format: FieldFormat,
    pub multiple: bool,
    pub visible: bool,
    pub position: i32,
    /// Roles allowed to see the field when it is not `visible`.
    pub role_ids: Vec<i64>,
    /// Allowed values for `list` fields.
    pub possible_values: Vec<String>,
}

/// A custom field definition to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCustomField {
    pub name: String,
    pub format: FieldFormat,
    pub multiple: bool,
    pub visible: bool,
    pub role_ids: Vec<i64>,
    pub possible_values: Vec<String>,
}

impl NewCustomField {
    pub fn new(name: &str, format: FieldFormat) -> Self {
        Self {
            name: name.to_string(),
            format,
            multiple: false,
            visible: true,
            role_ids: vec![],
            possible_values: vec![],
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push(ValidationError::Blank {
                field: "Name".to_string(),
            });
        }
        if !self.visible && self.role_ids.is_empty() {
            errors.push(ValidationError::Blank {
                field: "Roles".to_string(),
            });
        }
        if self.format == FieldFormat::List && self.possible_values.is_empty() {
            errors.push(ValidationError::Blank {
                field: "Possible values".to_string(),
            });
        }
        ValidationErrors(errors).into_result()
    }
}

impl CustomField {
    /// `user_role_ids` are the roles the user holds on the contact's project.
    pub fn visible_to(&self, user: &User, user_role_ids: &[i64]) -> bool {
        self.visible || user.admin || self.role_ids.iter().any(|r| user_role_ids.contains(r))
    }

    pub fn validate_value(&self, value: &str) -> Result<(), ValidationError> {
        let invalid = || ValidationError::InvalidFormat {
            field: self.name.clone(),
        };
        match self.format {
            FieldFormat::Int => value.parse::<i64>().map(|_| ()).map_err(|_| {
                ValidationError::NotANumber {
                    field: self.name.clone(),
                }
            }),
            FieldFormat::Float => value.parse::<f64>().map(|_| ()).map_err(|_| {
                ValidationError::NotANumber {
                    field: self.name.clone(),
                }
            }),
            FieldFormat::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(|_| ())
                .map_err(|_| invalid()),
            FieldFormat::Bool => match value {
                "0" | "1" => Ok(()),
                _ => Err(invalid()),
            },
            FieldFormat::List => {
                if self.possible_values.iter().any(|v| v == value) {
                    Ok(())
                } else {
                    Err(ValidationError::NotIncluded {
                        field: self.name.clone(),
                        value: value.to_string(),
                    })
                }
            }
            FieldFormat::String
            | FieldFormat::Text
            | FieldFormat::Link
            | FieldFormat::Attachment => Ok(()),
        }
    }

    pub fn format_value(&self, raw: &str) -> String {
        match (self.format, raw) {
            (FieldFormat::Bool, "1") => "Yes".to_string(),
            (FieldFormat::Bool, "0") => "No".to_string(),
            _ => raw.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(format: FieldFormat) -> CustomField {
        CustomField {
            id: 1,
            name: "Field".to_string(),
            format,
            multiple: false,
            visible: true,
            position: 1,
            role_ids: vec![],
            possible_values: vec!["red".to_string(), "green".to_string()],
        }
    }

    fn user(admin: bool) -> User {
        User {
            id: 5,
            login: "u".to_string(),
            firstname: "U".to_string(),
            lastname: "Ser".to_string(),
            admin,
        }
    }

    #[test]
    fn change_rendering_lookup() {
        assert_eq!(FieldFormat::Text.change_rendering(), ChangeRendering::DiffOnly);
        assert_eq!(
            FieldFormat::Attachment.change_rendering(),
            ChangeRendering::NoDetail
        );
        for format in [FieldFormat::String, FieldFormat::List, FieldFormat::Bool] {
            assert_eq!(format.change_rendering(), ChangeRendering::Plain);
        }
    }

    #[test]
    fn format_names_roundtrip() {
        for format in FieldFormat::ALL {
            assert_eq!(FieldFormat::from_str(format.as_str()), Some(format));
        }
        assert_eq!(FieldFormat::from_str("version"), None);
    }

    #[test]
    fn visibility_by_role() {
        let mut restricted = field(FieldFormat::String);
        restricted.visible = false;
        restricted.role_ids = vec![3];

        assert!(!restricted.visible_to(&user(false), &[1, 2]));
        assert!(restricted.visible_to(&user(false), &[3]));
        assert!(restricted.visible_to(&user(true), &[]));
    }

    #[test]
    fn value_validation_per_format() {
        assert!(field(FieldFormat::Int).validate_value("12").is_ok());
        assert!(field(FieldFormat::Int).validate_value("1.5").is_err());
        assert!(field(FieldFormat::Date).validate_value("2024-02-30").is_err());
        assert!(field(FieldFormat::List).validate_value("green").is_ok());
        assert_eq!(
            field(FieldFormat::List).validate_value("blue"),
            Err(ValidationError::NotIncluded {
                field: "Field".to_string(),
                value: "blue".to_string()
            })
        );
    }

    #[test]
    fn bool_values_display_as_words() {
        let flag = field(FieldFormat::Bool);
        assert_eq!(flag.format_value("1"), "Yes");
        assert_eq!(flag.format_value("0"), "No");
        assert_eq!(field(FieldFormat::String).format_value("1"), "1");
    }

    #[test]
    fn hidden_field_without_roles_is_invalid() {
        let mut new_field = NewCustomField::new("Secret", FieldFormat::String);
        new_field.visible = false;
        assert!(new_field.validate().is_err());
        new_field.role_ids = vec![1];
        assert!(new_field.validate().is_ok());
    }
}
