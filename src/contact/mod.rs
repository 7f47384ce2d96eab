mod contact_store;
pub mod custom_field;
pub mod models;
pub mod query;
pub mod validation;

pub use contact_store::{ContactQueryStore, ContactStore, CustomFieldStore, SavedEdit};
pub use custom_field::{ChangeRendering, CustomField, FieldFormat, NewCustomField};
pub use models::{
    Address, Attachment, Contact, ContactEvent, ContactField, CustomFieldValues, NewAttachment,
    ReferenceKind,
};
pub use query::{
    ContactQuery, Filter, FilterField, Operator, QueryColumn, SortDirection, DEFAULT_COLUMNS,
};
pub use validation::{validate_contact, validate_custom_values, ValidationError, ValidationErrors};
