//! Shared constants for integration tests
//!
//! When the seeded users, projects or custom fields change, update only
//! this file and `fixtures.rs`.

// ============================================================================
// Users
// ============================================================================

/// Administrator, allowed everything on non-archived projects
pub const ADMIN_LOGIN: &str = "admin";

/// Manager role on the sales project: may see private notes and the rating
pub const MANAGER_LOGIN: &str = "manager";

/// Editor role on the sales project
pub const EDITOR_LOGIN: &str = "editor";

/// Viewer role on the sales project
pub const VIEWER_LOGIN: &str = "viewer";

/// Member of the partners project only
pub const OUTSIDER_LOGIN: &str = "outsider";

// ============================================================================
// Projects
// ============================================================================

pub const SALES_PROJECT: &str = "Sales";

pub const PARTNERS_PROJECT: &str = "Partners";

// ============================================================================
// Custom fields
// ============================================================================

/// Visible multi-valued list field
pub const SOURCE_FIELD: &str = "Source";

/// Possible values of the source field
pub const SOURCE_VALUES: [&str; 3] = ["web", "fair", "referral"];

/// Int field visible to the Manager role only
pub const RATING_FIELD: &str = "Rating";

/// Visible long text field, journaled as a diff link
pub const BACKGROUND_FIELD: &str = "Background";

/// Email used by contacts created through `TestWorld::create_contact`
pub const DEFAULT_EMAIL_DOMAIN: &str = "example.com";
