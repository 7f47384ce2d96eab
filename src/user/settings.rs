//! User preference types and serialization.
//!
//! Typed per-user settings and their string encoding for the
//! `user_preferences` table.

use serde::{Deserialize, Serialize};

/// All supported user settings with their typed values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "key", content = "value")]
pub enum UserSetting {
    /// Show contact history newest-first.
    #[serde(rename = "comments_in_reverse_order")]
    CommentsInReverseOrder(bool),
}

impl UserSetting {
    pub fn key(&self) -> &'static str {
        match self {
            Self::CommentsInReverseOrder(_) => "comments_in_reverse_order",
        }
    }

    pub fn value_to_string(&self) -> String {
        match self {
            Self::CommentsInReverseOrder(reverse) => reverse.to_string(),
        }
    }

    /// Returns `Err` with a description if the key is unknown or value is invalid.
    pub fn from_key_value(key: &str, value: &str) -> Result<Self, String> {
        match key {
            "comments_in_reverse_order" => {
                let reverse = value
                    .parse::<bool>()
                    .map_err(|_| format!("Invalid boolean value for {}: {}", key, value))?;
                Ok(Self::CommentsInReverseOrder(reverse))
            }
            _ => Err(format!("Unknown setting key: {}", key)),
        }
    }

    pub fn default_for_key(key: &str) -> Option<Self> {
        match key {
            "comments_in_reverse_order" => Some(Self::CommentsInReverseOrder(false)),
            _ => None,
        }
    }
}
