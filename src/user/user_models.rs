//! User and project models

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub firstname: String,
    pub lastname: String,
    pub admin: bool,
}

impl User {
    pub fn name(&self) -> String {
        let name = format!("{} {}", self.firstname, self.lastname);
        let name = name.trim();
        if name.is_empty() {
            self.login.clone()
        } else {
            name.to_string()
        }
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Closed,
    Archived,
}

impl ProjectStatus {
    pub fn to_int(&self) -> i32 {
        match self {
            ProjectStatus::Active => 1,
            ProjectStatus::Closed => 5,
            ProjectStatus::Archived => 9,
        }
    }

    pub fn from_int(value: i32) -> Option<Self> {
        match value {
            1 => Some(ProjectStatus::Active),
            5 => Some(ProjectStatus::Closed),
            9 => Some(ProjectStatus::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub status: ProjectStatus,
}

/// A user's role on one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: i64,
    pub project_id: i64,
    pub role_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(firstname: &str, lastname: &str) -> User {
        User {
            id: 1,
            login: "jdoe".to_string(),
            firstname: firstname.to_string(),
            lastname: lastname.to_string(),
            admin: false,
        }
    }

    #[test]
    fn name_joins_first_and_last() {
        assert_eq!(user("John", "Doe").name(), "John Doe");
    }

    #[test]
    fn name_falls_back_to_login() {
        assert_eq!(user("", "").name(), "jdoe");
    }

    #[test]
    fn project_status_int_roundtrip() {
        for status in [ProjectStatus::Active, ProjectStatus::Closed, ProjectStatus::Archived] {
            assert_eq!(ProjectStatus::from_int(status.to_int()), Some(status));
        }
        assert_eq!(ProjectStatus::from_int(2), None);
    }
}
