use crate::contact::ValidationErrors;
use crate::user::Permission;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContactsError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Statement invalid: {0}")]
    StatementInvalid(String),

    #[error("Invalid query: {}", .0.join(", "))]
    InvalidQuery(Vec<String>),

    #[error("Permission {permission} denied on project {project_id}")]
    PermissionDenied {
        permission: Permission,
        project_id: i64,
    },

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

pub type ContactsResult<T> = std::result::Result<T, ContactsError>;

impl From<rusqlite::Error> for ContactsError {
    fn from(e: rusqlite::Error) -> Self {
        ContactsError::StatementInvalid(e.to_string())
    }
}
