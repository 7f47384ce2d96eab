//! Validation for contacts and custom field values.
//!
//! Runs before a pending edit is persisted; any failure discards the
//! pending journal.

use super::custom_field::CustomField;
use super::models::{Contact, CustomFieldValues};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"(?i)^([^@\s]+)@((?:[-a-z0-9]+\.)+[a-z]{2,})$").expect("valid email regex");
    static ref URL_REGEX: Regex = Regex::new(
        r"(?i)^(http|https)://[a-z0-9]+([\-.][a-z0-9]+)*\.[a-z]{2,5}(:[0-9]{1,5})?(/.*)?$"
    )
    .expect("valid url regex");
    static ref NUMBER_REGEX: Regex = Regex::new(r"^[+-]?\d+(\.\d+)?$").expect("valid number regex");
}

const PHONE_MIN_LENGTH: usize = 9;
const PHONE_MAX_LENGTH: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Blank { field: String },
    InvalidFormat { field: String },
    NotANumber { field: String },
    WrongLength { field: String, min: usize, max: usize },
    NotIncluded { field: String, value: String },
    UnknownCustomField { id: i64 },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Blank { field } => write!(f, "{} cannot be blank", field),
            ValidationError::InvalidFormat { field } => write!(f, "{} is invalid", field),
            ValidationError::NotANumber { field } => write!(f, "{} is not a number", field),
            ValidationError::WrongLength { field, min, max } => write!(
                f,
                "{} must be between {} and {} characters",
                field, min, max
            ),
            ValidationError::NotIncluded { field, value } => {
                write!(f, "{} is not included in the list ({})", field, value)
            }
            ValidationError::UnknownCustomField { id } => {
                write!(f, "Custom field {} does not exist", id)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Every failure found on one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        f.write_str(&messages.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub fn validate_contact(contact: &Contact) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();

    for (field, value) in [
        ("First name", &contact.first_name),
        ("Last name", &contact.last_name),
        ("Email", &contact.email),
    ] {
        if present(value).is_none() {
            errors.push(ValidationError::Blank {
                field: field.to_string(),
            });
        }
    }

    if let Some(email) = present(&contact.email) {
        if !EMAIL_REGEX.is_match(email) {
            errors.push(ValidationError::InvalidFormat {
                field: "Email".to_string(),
            });
        }
    }

    if let Some(website) = present(&contact.website) {
        if !URL_REGEX.is_match(website) {
            errors.push(ValidationError::InvalidFormat {
                field: "Website".to_string(),
            });
        }
    }

    if let Some(phone) = present(&contact.phone) {
        if !NUMBER_REGEX.is_match(phone) {
            errors.push(ValidationError::NotANumber {
                field: "Phone".to_string(),
            });
        }
        let len = phone.chars().count();
        if !(PHONE_MIN_LENGTH..=PHONE_MAX_LENGTH).contains(&len) {
            errors.push(ValidationError::WrongLength {
                field: "Phone".to_string(),
                min: PHONE_MIN_LENGTH,
                max: PHONE_MAX_LENGTH,
            });
        }
    }

    ValidationErrors(errors).into_result()
}

/// Checks every value against its field's format.
pub fn validate_custom_values(
    values: &CustomFieldValues,
    fields: &[CustomField],
) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();
    for (field_id, field_values) in values {
        let Some(field) = fields.iter().find(|f| f.id == *field_id) else {
            errors.push(ValidationError::UnknownCustomField { id: *field_id });
            continue;
        };
        if !field.multiple && field_values.len() > 1 {
            errors.push(ValidationError::InvalidFormat {
                field: field.name.clone(),
            });
        }
        for value in field_values {
            if let Err(e) = field.validate_value(value) {
                errors.push(e);
            }
        }
    }
    ValidationErrors(errors).into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_valid_contact() -> Contact {
        let mut contact = Contact::new(1, 1);
        contact.first_name = Some("Grace".to_string());
        contact.last_name = Some("Hopper".to_string());
        contact.email = Some("grace@navy.example.com".to_string());
        contact
    }

    #[test]
    fn test_valid_contact() {
        assert!(validate_contact(&make_valid_contact()).is_ok());
    }

    #[test]
    fn test_required_fields() {
        let contact = Contact::new(1, 1);
        let errors = validate_contact(&contact).unwrap_err();
        assert_eq!(errors.0.len(), 3);
        assert!(errors.to_string().contains("First name cannot be blank"));
    }

    #[test]
    fn test_email_format() {
        let mut contact = make_valid_contact();
        contact.email = Some("not-an-email".to_string());
        let errors = validate_contact(&contact).unwrap_err();
        assert_eq!(
            errors.0,
            vec![ValidationError::InvalidFormat {
                field: "Email".to_string()
            }]
        );

        contact.email = Some("UPPER@EXAMPLE.ORG".to_string());
        assert!(validate_contact(&contact).is_ok());
    }

    #[test]
    fn test_website_format() {
        let mut contact = make_valid_contact();
        contact.website = Some("https://www.example.com/about".to_string());
        assert!(validate_contact(&contact).is_ok());

        contact.website = Some("ftp://example.com".to_string());
        assert!(validate_contact(&contact).is_err());
    }

    #[test]
    fn test_phone_numericality_and_length() {
        let mut contact = make_valid_contact();
        contact.phone = Some("0123456789".to_string());
        assert!(validate_contact(&contact).is_ok());

        contact.phone = Some("12345".to_string());
        let errors = validate_contact(&contact).unwrap_err();
        assert!(matches!(errors.0[0], ValidationError::WrongLength { .. }));

        contact.phone = Some("555-CALL-NOW".to_string());
        let errors = validate_contact(&contact).unwrap_err();
        assert!(errors
            .0
            .contains(&ValidationError::NotANumber {
                field: "Phone".to_string()
            }));
    }
}
